//! Channel-level configuration for an optimal filter orchestrator.

use serde::{Deserialize, Serialize};

use crate::domain::Coupling;
use crate::error::{OfError, Result};

/// Default cutoff for the low-frequency chi-square diagnostic.
pub const DEFAULT_LOWFREQ_CUTOFF_HZ: f64 = 20_000.0;

/// Settings shared by every fit on one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfConfig {
    /// Sample rate of the traces (Hz).
    pub sample_rate: f64,
    /// Pretrigger position in samples. Takes precedence over `pretrigger_msec`.
    pub pretrigger_samples: Option<usize>,
    /// Pretrigger position in milliseconds.
    pub pretrigger_msec: Option<f64>,
    pub coupling: Coupling,
    /// Normalize templates to unit integral (amplitudes then come out in integral units).
    pub integral_norm: bool,
    pub lowfreq_cutoff_hz: f64,
    pub channel_name: String,
}

impl Default for OfConfig {
    fn default() -> Self {
        Self {
            sample_rate: 625e3,
            pretrigger_samples: None,
            pretrigger_msec: None,
            coupling: Coupling::Ac,
            integral_norm: false,
            lowfreq_cutoff_hz: DEFAULT_LOWFREQ_CUTOFF_HZ,
            channel_name: "unknown".to_string(),
        }
    }
}

impl OfConfig {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn with_pretrigger_samples(mut self, samples: usize) -> Self {
        self.pretrigger_samples = Some(samples);
        self
    }

    pub fn with_coupling(mut self, coupling: Coupling) -> Self {
        self.coupling = coupling;
        self
    }

    /// Load a configuration from the process environment (and `.env`, if present).
    ///
    /// `OF_SAMPLE_RATE` is required; every other key falls back to its default.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let sample_rate = std::env::var("OF_SAMPLE_RATE")
            .map_err(|_| OfError::configuration("Missing OF_SAMPLE_RATE in environment (.env)."))
            .and_then(|raw| parse_env("OF_SAMPLE_RATE", &raw))?;

        let mut config = Self::new(sample_rate);
        if let Ok(raw) = std::env::var("OF_PRETRIGGER_SAMPLES") {
            config.pretrigger_samples = Some(parse_env("OF_PRETRIGGER_SAMPLES", &raw)?);
        }
        if let Ok(raw) = std::env::var("OF_PRETRIGGER_MSEC") {
            config.pretrigger_msec = Some(parse_env("OF_PRETRIGGER_MSEC", &raw)?);
        }
        if let Ok(raw) = std::env::var("OF_COUPLING") {
            config.coupling = raw.parse()?;
        }
        if let Ok(raw) = std::env::var("OF_INTEGRAL_NORM") {
            config.integral_norm = parse_env("OF_INTEGRAL_NORM", &raw)?;
        }
        if let Ok(raw) = std::env::var("OF_LOWFREQ_CUTOFF_HZ") {
            config.lowfreq_cutoff_hz = parse_env("OF_LOWFREQ_CUTOFF_HZ", &raw)?;
        }
        if let Ok(raw) = std::env::var("OF_CHANNEL_NAME") {
            config.channel_name = raw;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(OfError::configuration(format!(
                "Invalid sample rate: {} (must be finite and > 0).",
                self.sample_rate
            )));
        }
        if !(self.lowfreq_cutoff_hz.is_finite() && self.lowfreq_cutoff_hz > 0.0) {
            return Err(OfError::configuration(format!(
                "Invalid low-frequency cutoff: {} Hz.",
                self.lowfreq_cutoff_hz
            )));
        }
        if let Some(msec) = self.pretrigger_msec {
            if !(msec.is_finite() && msec >= 0.0) {
                return Err(OfError::configuration(format!(
                    "Invalid pretrigger: {msec} ms."
                )));
            }
        }
        Ok(())
    }

    /// Resolve the pretrigger sample for traces of `nbins` samples.
    ///
    /// Returns the index and whether the `nbins / 2` default was used.
    pub fn resolve_pretrigger(&self, nbins: usize) -> Result<(usize, bool)> {
        let (index, defaulted) = match (self.pretrigger_samples, self.pretrigger_msec) {
            (Some(samples), _) => (samples, false),
            (None, Some(msec)) => ((msec * 1e-3 * self.sample_rate).floor() as usize, false),
            (None, None) => (nbins / 2, true),
        };
        if index >= nbins {
            return Err(OfError::configuration(format!(
                "Pretrigger sample {index} outside trace of {nbins} samples."
            )));
        }
        Ok((index, defaulted))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| OfError::configuration(format!("Invalid value for {key}: '{raw}'.")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config: OfConfig =
            serde_json::from_str(r#"{ "sample_rate": 1.25e6, "coupling": "dc" }"#).unwrap();
        assert_eq!(config.sample_rate, 1.25e6);
        assert_eq!(config.coupling, Coupling::Dc);
        assert_eq!(config.lowfreq_cutoff_hz, DEFAULT_LOWFREQ_CUTOFF_HZ);
        assert_eq!(config.channel_name, "unknown");
        assert!(!config.integral_norm);
    }

    #[test]
    fn validate_rejects_bad_sample_rate() {
        assert!(OfConfig::new(0.0).validate().is_err());
        assert!(OfConfig::new(f64::NAN).validate().is_err());
        assert!(OfConfig::new(1e6).validate().is_ok());
    }

    #[test]
    fn pretrigger_resolution_order() {
        let mut config = OfConfig::new(1000.0);
        assert_eq!(config.resolve_pretrigger(100).unwrap(), (50, true));

        config.pretrigger_msec = Some(20.0);
        assert_eq!(config.resolve_pretrigger(100).unwrap(), (20, false));

        config.pretrigger_samples = Some(7);
        assert_eq!(config.resolve_pretrigger(100).unwrap(), (7, false));

        config.pretrigger_samples = Some(100);
        assert!(config.resolve_pretrigger(100).is_err());
    }
}
