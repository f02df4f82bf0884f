//! Single channel, single template front-end over `OfBase`.

use tracing::debug;

use crate::base::OfBase;
use crate::domain::{FitResult, OfConfig};
use crate::error::{OfError, Result};
use crate::fit::DelayOptions;

/// Tag used when the caller does not name the template.
pub const DEFAULT_TAG: &str = "default";

/// Results kept from the last `calc` / `calc_nodelay` call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Of1x1Results {
    pub with_delay: Option<FitResult>,
    pub no_delay: Option<FitResult>,
}

#[derive(Debug, Clone)]
pub struct Of1x1 {
    base: OfBase,
    tag: String,
    results: Of1x1Results,
}

impl Of1x1 {
    /// Build a fresh orchestrator holding one template and the channel PSD, kernel included.
    pub fn new(config: OfConfig, template: &[f64], psd: &[f64], tag: Option<&str>) -> Result<Self> {
        let tag = tag.unwrap_or(DEFAULT_TAG);
        let mut base = OfBase::new(config)?;
        base.add_template(tag, template, None)?;
        base.set_psd(psd, None)?;
        base.calc_kernel(tag)?;
        Ok(Self {
            base,
            tag: tag.to_string(),
            results: Of1x1Results::default(),
        })
    }

    /// Wrap an existing orchestrator; the kernel for `tag` is built if missing.
    pub fn from_base(mut base: OfBase, tag: &str) -> Result<Self> {
        if !base.has_template(tag) {
            return Err(OfError::not_found(format!("No template with tag '{tag}'.")));
        }
        if base.kernel(tag).is_err() {
            base.calc_kernel(tag)?;
        }
        Ok(Self {
            base,
            tag: tag.to_string(),
            results: Of1x1Results::default(),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn base(&self) -> &OfBase {
        &self.base
    }

    /// Fit `signal` with a delay search; also run the no-delay fit when `with_nodelay` is set.
    pub fn calc(&mut self, signal: &[f64], opts: &DelayOptions, with_nodelay: bool) -> Result<FitResult> {
        self.results = Of1x1Results::default();
        self.base.update_signal(signal, Some(&[self.tag.as_str()][..]))?;

        let fit = self.base.fit_with_delay(&self.tag, opts)?;
        let no_delay = if with_nodelay {
            Some(self.base.fit_no_delay(&self.tag, None, true)?)
        } else {
            None
        };

        debug!(tag = %self.tag, amp = fit.amp, t0 = fit.t0, "1x1 fit done");
        self.results = Of1x1Results {
            with_delay: Some(fit),
            no_delay,
        };
        Ok(fit)
    }

    /// Fit `signal` at the pretrigger (plus an optional shift in microseconds) only.
    pub fn calc_nodelay(&mut self, signal: &[f64], shift_usec: Option<f64>) -> Result<FitResult> {
        self.results = Of1x1Results::default();
        self.base.update_signal(signal, Some(&[self.tag.as_str()][..]))?;
        let fit = self.base.fit_no_delay(&self.tag, shift_usec, true)?;
        self.results.no_delay = Some(fit);
        Ok(fit)
    }

    pub fn results(&self) -> Of1x1Results {
        self.results
    }

    /// Low-frequency chi-square of the last delay fit.
    pub fn chi2_lowfreq(&self, cutoff_hz: Option<f64>) -> Result<f64> {
        let fit = self
            .results
            .with_delay
            .ok_or_else(|| OfError::not_found("No delay fit yet; call calc."))?;
        self.base.chi2_lowfreq(&self.tag, &fit, cutoff_hz)
    }

    pub fn energy_resolution(&self) -> Result<f64> {
        self.base.energy_resolution(&self.tag)
    }

    /// Time resolution at the amplitude of the last delay fit.
    pub fn time_resolution(&self) -> Result<f64> {
        let fit = self
            .results
            .with_delay
            .ok_or_else(|| OfError::not_found("No delay fit yet; call calc."))?;
        self.base.time_resolution(&self.tag, fit.amp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PulseDirection;
    use crate::sim::{make_template, shifted, white_psd};

    const FS: f64 = 625e3;
    const N: usize = 1024;

    fn of() -> (Of1x1, Vec<f64>) {
        let template = make_template(N, FS, 20e-6, 200e-6, 0.0);
        let config = OfConfig::new(FS).with_pretrigger_samples(N / 2);
        let of = Of1x1::new(config, &template, &white_psd(N, FS, 1e-8), None).unwrap();
        (of, template)
    }

    #[test]
    fn calc_recovers_shifted_pulse() {
        let (mut of, template) = of();
        let signal: Vec<f64> = shifted(&template, 7).iter().map(|v| 2.5e-7 * v).collect();
        let fit = of.calc(&signal, &DelayOptions::default(), true).unwrap();
        assert!((fit.amp / 2.5e-7 - 1.0).abs() < 1e-9, "amp {}", fit.amp);
        assert!((fit.t0 - 7.0 / FS).abs() < 1e-12, "t0 {}", fit.t0);
        assert!(fit.chi2 < 1e-6, "chi2 {}", fit.chi2);
        assert!(of.results().no_delay.is_some());
        assert!(of.time_resolution().unwrap() > 0.0);
        assert!(of.chi2_lowfreq(None).unwrap() < 1e-6);
    }

    #[test]
    fn calc_nodelay_clears_delay_result() {
        let (mut of, template) = of();
        of.calc(&template, &DelayOptions::default(), false).unwrap();
        of.calc_nodelay(&template, None).unwrap();
        assert!(of.results().with_delay.is_none());
        assert!(matches!(of.time_resolution(), Err(OfError::NotFound(_))));
    }

    #[test]
    fn direction_constraint_flows_through() {
        let (mut of, template) = of();
        let signal: Vec<f64> = template.iter().map(|v| -1e-7 * v).collect();
        let opts = DelayOptions {
            direction: PulseDirection::Positive,
            ..DelayOptions::default()
        };
        let fit = of.calc(&signal, &opts, false).unwrap();
        assert!(fit.amp >= 0.0);
    }

    #[test]
    fn from_base_requires_template() {
        let base = OfBase::new(OfConfig::new(FS)).unwrap();
        assert!(matches!(Of1x1::from_base(base, "x"), Err(OfError::NotFound(_))));
    }
}
