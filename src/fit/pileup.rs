//! Second-pulse (pileup) search with the primary pulse held fixed.
//!
//! With the primary pulse `(a1, t1)` fixed, the best second amplitude at delay `t` and the
//! resulting chi-square are closed-form:
//!
//! - `a2(t) = (q(t) - a1 R(t - t1)) / norm`
//! - `chi2(t) = chisq_amp - 2 a1 q(t1) + a1² norm - norm a2(t)²`
//!
//! where `q = norm * filtered_time` and `R` is the template auto-correlation through the filter.

use tracing::debug;

use crate::domain::FitResult;
use crate::error::{OfError, Result};
use crate::fit::context::FitContext;
use crate::fit::delay::{DelayOptions, argmin_chi2};
use crate::fit::window::resolve_window;

/// Search a second pulse of the same template given a primary fit.
///
/// The returned `t0` is the second pulse's delay; `chi2` is the two-pulse chi-square.
/// `opts.interpolate` is ignored (the search is discrete).
pub fn fit_pileup(ctx: &FitContext<'_>, primary: &FitResult, opts: &DelayOptions) -> Result<FitResult> {
    if !(primary.amp.is_finite() && primary.t0.is_finite()) {
        return Err(OfError::invalid_value("Primary pulse fit is not finite."));
    }
    let n = ctx.nbins();
    let window = resolve_window(&opts.window, n, ctx.pretrigger, ctx.sample_rate)?;

    let norm = ctx.kernel.norm();
    let autocorr = ctx.kernel.autocorr();
    let filtered = ctx.projection.filtered_time();

    let lag1 = (primary.t0 * ctx.sample_rate).round() as i64;
    let lag1 = lag1.rem_euclid(n as i64) as usize;
    let a1 = primary.amp;
    let q1 = norm * filtered[lag1];
    let base = ctx.projection.chisq_amp() - 2.0 * a1 * q1 + a1 * a1 * norm;

    let mut amps = vec![0.0; n];
    let mut chi2 = vec![0.0; n];
    for j in 0..n {
        let lag = ctx.lag_of(j);
        let q = norm * filtered[lag];
        let a2 = (q - a1 * autocorr[(lag + n - lag1) % n]) / norm;
        amps[j] = a2;
        chi2[j] = (base - norm * a2 * a2).max(0.0);
    }

    let best = argmin_chi2(&chi2, &amps, &window, opts.direction).ok_or_else(|| {
        OfError::window(format!(
            "No pileup delay in the window satisfies the {:?} direction constraint.",
            opts.direction
        ))
    })?;

    debug!(index = best, amp = amps[best], chi2 = chi2[best], "pileup fit selected");
    Ok(FitResult {
        amp: amps[best],
        t0: ctx.t0_of(best as f64),
        chi2: chi2[best],
    })
}
