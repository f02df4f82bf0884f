//! Single-template fits: delay search, fixed-time fit and the low-frequency chi-square.
//!
//! All variants read the same filtered trace and chi-square constant from the signal projection;
//! they only differ in which delays are admissible and whether the discrete optimum is refined.
//!
//! Selection rules:
//! 1. Admissible delays = window (or its complement) ∩ direction constraint
//! 2. Choose the minimum chi-square; ties go to the lowest index
//! 3. Optional parabolic refinement, clipped so it never moves onto an inadmissible neighbour

use tracing::debug;

use crate::domain::{FitResult, PulseDirection, WindowSpec};
use crate::error::{OfError, Result};
use crate::fit::context::FitContext;
use crate::fit::residual::{model_spectrum, residual_chi2};
use crate::fit::window::{ResolvedWindow, clamp_offset, resolve_window};
use crate::math::{fft_freqs, parabola_at, parabola_vertex};

/// Options for the delay search.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DelayOptions {
    pub window: WindowSpec,
    pub direction: PulseDirection,
    /// Refine the discrete optimum with a parabola through its neighbours.
    pub interpolate: bool,
}

/// Index of the minimum of `chi2` over admissible delays, first index on ties.
pub fn argmin_chi2(
    chi2: &[f64],
    amps: &[f64],
    window: &ResolvedWindow,
    direction: PulseDirection,
) -> Option<usize> {
    let mut best: Option<usize> = None;
    for &j in window.indices() {
        if !direction.admits(amps[j]) {
            continue;
        }
        match best {
            Some(b) if chi2[j] >= chi2[b] => {}
            _ => best = Some(j),
        }
    }
    best
}

/// Fit amplitude and delay by minimizing chi-square over the admissible delays.
pub fn fit_with_delay(ctx: &FitContext<'_>, opts: &DelayOptions) -> Result<FitResult> {
    let n = ctx.nbins();
    let window = resolve_window(&opts.window, n, ctx.pretrigger, ctx.sample_rate)?;
    let amps = ctx.projection.rotated(ctx.pretrigger);
    let chi2: Vec<f64> = amps.iter().map(|&a| ctx.projection.chi2_at(a)).collect();

    let best = argmin_chi2(&chi2, &amps, &window, opts.direction).ok_or_else(|| {
        OfError::window(format!(
            "No delay in the window satisfies the {:?} direction constraint.",
            opts.direction
        ))
    })?;

    let result = if opts.interpolate {
        let admissible =
            |j: usize| window.contains(j) && opts.direction.admits(amps[j]);
        interpolate_at(ctx, &amps, &chi2, best, admissible)
    } else {
        FitResult {
            amp: amps[best],
            t0: ctx.t0_of(best as f64),
            chi2: chi2[best],
        }
    };

    debug!(
        index = best,
        amp = result.amp,
        t0 = result.t0,
        chi2 = result.chi2,
        "delay fit selected"
    );
    Ok(result)
}

fn interpolate_at(
    ctx: &FitContext<'_>,
    amps: &[f64],
    chi2: &[f64],
    best: usize,
    admissible: impl Fn(usize) -> bool,
) -> FitResult {
    let n = amps.len();
    let discrete = FitResult {
        amp: amps[best],
        t0: ctx.t0_of(best as f64),
        chi2: chi2[best],
    };
    // The parabola needs both neighbours to exist.
    if best == 0 || best + 1 >= n {
        return discrete;
    }
    let lo = if admissible(best - 1) { -1.0 } else { 0.0 };
    let hi = if admissible(best + 1) { 1.0 } else { 0.0 };
    if lo == 0.0 && hi == 0.0 {
        return discrete;
    }

    let vertex = parabola_vertex(chi2[best - 1], chi2[best], chi2[best + 1]);
    let offset = vertex.offset.clamp(lo, hi);
    let chi2_interp = parabola_at(chi2[best - 1], chi2[best], chi2[best + 1], offset);
    let amp_interp = parabola_at(amps[best - 1], amps[best], amps[best + 1], offset);

    FitResult {
        amp: amp_interp,
        t0: ctx.t0_of(best as f64 + offset),
        chi2: chi2_interp.max(0.0),
    }
}

/// Fit the amplitude at a fixed time: the pretrigger plus an optional shift (microseconds).
///
/// With `use_chisq_alltimes` the chi-square comes from the same constant as the delay search, so
/// a zero shift reproduces a delay fit restricted to the pretrigger index exactly. Otherwise the
/// chi-square is evaluated from the explicit residual at that time.
pub fn fit_no_delay(
    ctx: &FitContext<'_>,
    shift_usec: Option<f64>,
    use_chisq_alltimes: bool,
) -> Result<FitResult> {
    let n = ctx.nbins() as i64;
    let shift = match shift_usec {
        Some(usec) if !usec.is_finite() => {
            return Err(OfError::invalid_value(format!("Invalid shift: {usec} us.")));
        }
        Some(usec) => clamp_offset((usec * 1e-6 * ctx.sample_rate).trunc(), n),
        None => 0,
    };
    let j = ctx.pretrigger as i64 + shift;
    if !(0..n).contains(&j) {
        return Err(OfError::window(format!(
            "Shift of {shift} samples from pretrigger {} leaves the trace.",
            ctx.pretrigger
        )));
    }
    let j = j as usize;

    let amp = ctx.projection.filtered_time()[ctx.lag_of(j)];
    let t0 = ctx.t0_of(j as f64);
    let chi2 = if use_chisq_alltimes {
        ctx.projection.chi2_at(amp)
    } else {
        let freqs = fft_freqs(ctx.nbins(), ctx.sample_rate);
        let model = model_spectrum(&[ctx.template.fft()], &[amp], &[t0], &freqs);
        residual_chi2(ctx.signal_fft, &model, &ctx.psd.weights(), &freqs, ctx.df(), None)
    };

    Ok(FitResult { amp, t0, chi2 })
}

/// Chi-square of a single-template fit restricted to `|f| <= cutoff_hz`.
pub fn chi2_lowfreq(ctx: &FitContext<'_>, fit: &FitResult, cutoff_hz: f64) -> Result<f64> {
    if !(cutoff_hz.is_finite() && cutoff_hz > 0.0) {
        return Err(OfError::invalid_value(format!(
            "Invalid low-frequency cutoff: {cutoff_hz} Hz."
        )));
    }
    let freqs = fft_freqs(ctx.nbins(), ctx.sample_rate);
    let model = model_spectrum(&[ctx.template.fft()], &[fit.amp], &[fit.t0], &freqs);
    Ok(residual_chi2(
        ctx.signal_fft,
        &model,
        &ctx.psd.weights(),
        &freqs,
        ctx.df(),
        Some(cutoff_hz),
    ))
}
