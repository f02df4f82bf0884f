//! Fit inputs and outputs shared by the filter, fit and orchestration layers.
//!
//! Everything here is `serde`-serializable; fit results are plain scalars and vectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OfError, Result};

/// How the zero-frequency PSD bin is treated.
///
/// `Ac` stores an infinite noise level at bin 0 so that it carries no weight in any fit. The raw
/// PSD passed by the caller is never modified; the coupling is applied when the effective PSD is
/// derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coupling {
    #[default]
    Ac,
    Dc,
}

impl FromStr for Coupling {
    type Err = OfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ac" => Ok(Coupling::Ac),
            "dc" => Ok(Coupling::Dc),
            other => Err(OfError::invalid_value(format!(
                "unknown coupling '{other}' (expected 'ac' or 'dc')"
            ))),
        }
    }
}

impl fmt::Display for Coupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coupling::Ac => write!(f, "AC"),
            Coupling::Dc => write!(f, "DC"),
        }
    }
}

/// Sign constraint on a fitted amplitude.
///
/// `Positive` never selects a candidate with a negative amplitude (zero is allowed), and
/// `Negative` is the mirror image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PulseDirection {
    #[default]
    Any,
    Positive,
    Negative,
}

impl PulseDirection {
    /// Whether `amp` is allowed under this constraint.
    pub fn admits(self, amp: f64) -> bool {
        match self {
            PulseDirection::Any => true,
            PulseDirection::Positive => amp >= 0.0,
            PulseDirection::Negative => amp <= 0.0,
        }
    }

    pub fn is_constrained(self) -> bool {
        self != PulseDirection::Any
    }
}

impl TryFrom<i32> for PulseDirection {
    type Error = OfError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(PulseDirection::Any),
            1 => Ok(PulseDirection::Positive),
            -1 => Ok(PulseDirection::Negative),
            other => Err(OfError::invalid_value(format!(
                "pulse direction constraint must be -1, 0 or 1, got {other}"
            ))),
        }
    }
}

/// How the bounds of a delay window are expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowBounds {
    /// Every delay is admissible.
    #[default]
    All,
    /// Sample indices in the pretrigger-aligned frame, half-open `[min, max)`.
    ///
    /// A missing bound means the start (or end) of the trace.
    Indices { min: Option<i64>, max: Option<i64> },
    /// Microsecond offsets from the pretrigger sample (may be negative).
    FromTrigUsec { min: Option<f64>, max: Option<f64> },
}

/// Delay search window.
///
/// With `outside = true` the search runs over the complement of the bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub bounds: WindowBounds,
    pub outside: bool,
}

impl WindowSpec {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn indices(min: i64, max: i64) -> Self {
        Self {
            bounds: WindowBounds::Indices {
                min: Some(min),
                max: Some(max),
            },
            outside: false,
        }
    }

    pub fn from_trig_usec(min: f64, max: f64) -> Self {
        Self {
            bounds: WindowBounds::FromTrigUsec {
                min: Some(min),
                max: Some(max),
            },
            outside: false,
        }
    }

    /// Search outside the bounds instead of inside.
    pub fn outside(mut self) -> Self {
        self.outside = true;
        self
    }
}

/// Amplitude / time / chi-square triple of a single-template fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Best-fit amplitude (template units, or integral units with integral normalization).
    pub amp: f64,
    /// Time shift in seconds relative to the pretrigger sample.
    pub t0: f64,
    /// Chi-square at the optimum (non-negative).
    pub chi2: f64,
}

/// Result of one simultaneous signal + background fit.
///
/// Index 0 of `amps` / `t0s` is the signal template; the rest follow the background order of the
/// request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiFit {
    pub amps: Vec<f64>,
    pub t0s: Vec<f64>,
    pub chi2: f64,
    /// Chi-square restricted to bins with `|f| <= cutoff`.
    pub chi2_lowfreq: f64,
    /// Time-domain residual `signal - model`.
    pub residual: Vec<f64>,
}

/// All products of a multi-template fit call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiFitOutput {
    /// Global minimum over the request window.
    pub global: MultiFit,
    /// Sub-sample refinement of `global` (when interpolation was requested).
    pub global_interpolated: Option<MultiFit>,
    /// Minimum restricted to the constrained window (when one was supplied).
    pub constrained: Option<MultiFit>,
    /// Sub-sample refinement of `constrained`.
    pub constrained_interpolated: Option<MultiFit>,
}
