//! Delay window resolution.
//!
//! Windows are expressed in the pretrigger-aligned frame: index `j` means a delay of
//! `j - pretrigger` samples. Bounds are half-open `[min, max)`. Microsecond bounds resolve to
//! `floor(usec * 1e-6 * fs) + pretrigger`. Partially out-of-range windows are clipped to the
//! trace; empty or fully out-of-range windows are errors.

use crate::domain::{WindowBounds, WindowSpec};
use crate::error::{OfError, Result};

/// The set of admissible delay indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    mask: Vec<bool>,
    indices: Vec<usize>,
}

impl ResolvedWindow {
    pub fn contains(&self, j: usize) -> bool {
        self.mask.get(j).copied().unwrap_or(false)
    }

    /// Admissible indices in ascending order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Resolve a window spec against a trace of `nbins` samples.
pub fn resolve_window(
    spec: &WindowSpec,
    nbins: usize,
    pretrigger: usize,
    sample_rate: f64,
) -> Result<ResolvedWindow> {
    if nbins == 0 {
        return Err(OfError::window("Trace is empty."));
    }
    let n = nbins as i64;
    let pre = pretrigger as i64;

    let (lo, hi) = match spec.bounds {
        WindowBounds::All => (0, n),
        WindowBounds::Indices { min, max } => (min.unwrap_or(0), max.unwrap_or(n)),
        WindowBounds::FromTrigUsec { min, max } => {
            let to_index = |usec: f64| -> Result<i64> {
                if !usec.is_finite() {
                    return Err(OfError::window(format!("Invalid window bound: {usec} us.")));
                }
                Ok(clamp_offset((usec * 1e-6 * sample_rate).floor(), n) + pre)
            };
            let lo = min.map(to_index).transpose()?.unwrap_or(0);
            let hi = max.map(to_index).transpose()?.unwrap_or(n);
            (lo, hi)
        }
    };

    if hi <= lo {
        return Err(OfError::window(format!("Window [{lo}, {hi}) is empty.")));
    }
    if hi <= 0 || lo >= n {
        return Err(OfError::window(format!(
            "Window [{lo}, {hi}) lies entirely outside the trace [0, {n})."
        )));
    }
    let lo = lo.max(0) as usize;
    let hi = hi.min(n) as usize;

    let mask: Vec<bool> = (0..nbins)
        .map(|j| (lo..hi).contains(&j) != spec.outside)
        .collect();
    let indices: Vec<usize> = (0..nbins).filter(|&j| mask[j]).collect();
    if indices.is_empty() {
        return Err(OfError::window(format!(
            "No delays remain outside window [{lo}, {hi})."
        )));
    }

    Ok(ResolvedWindow { mask, indices })
}

/// Convert a whole sample offset to `i64`, clamped to `[-2n, 2n]`.
///
/// Offsets beyond that range leave the trace for any pretrigger.
pub(crate) fn clamp_offset(samples: f64, n: i64) -> i64 {
    let limit = 2 * n;
    samples.clamp(-limit as f64, limit as f64) as i64
}
