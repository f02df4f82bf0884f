//! Frequency-domain preparation of templates and noise PSDs.
//!
//! Conventions (used by every consumer in the crate):
//!
//! - `template_fft[k] = FFT(template)[k] / fs`, i.e. the `1/N/df` continuous-amplitude scaling
//! - the PSD is two-sided (power/Hz)
//! - AC coupling stores `+inf` in bin 0 of the effective PSD, so its weight `1/psd` is exactly 0

use num_complex::Complex64;

use crate::domain::Coupling;
use crate::error::{OfError, Result};
use crate::math::Fourier;

/// Noise PSD with the coupling mode applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectivePsd {
    values: Vec<f64>,
    coupling: Coupling,
}

impl EffectivePsd {
    /// Validate a raw two-sided PSD and apply the coupling mode.
    ///
    /// Every bin that takes part in the fit must be finite and strictly positive. With AC coupling
    /// bin 0 is suppressed and its raw value is ignored.
    pub fn new(psd: &[f64], coupling: Coupling) -> Result<Self> {
        if psd.is_empty() {
            return Err(OfError::configuration("PSD is empty."));
        }
        let first_checked = match coupling {
            Coupling::Ac => 1,
            Coupling::Dc => 0,
        };
        if let Some((k, v)) = psd
            .iter()
            .enumerate()
            .skip(first_checked)
            .find(|(_, v)| !(v.is_finite() && **v > 0.0))
        {
            return Err(OfError::configuration(format!(
                "PSD bin {k} is {v}; all fitted bins must be finite and > 0 ({coupling} coupling)."
            )));
        }

        let mut values = psd.to_vec();
        if coupling == Coupling::Ac {
            values[0] = f64::INFINITY;
        }
        Ok(Self { values, coupling })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn coupling(&self) -> Coupling {
        self.coupling
    }

    /// Per-bin weights `1 / psd` (0 for a suppressed bin).
    pub fn weights(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|&v| if v.is_infinite() { 0.0 } else { 1.0 / v })
            .collect()
    }
}

/// A stored template and its transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSpectrum {
    samples: Vec<f64>,
    fft: Vec<Complex64>,
    integral_norm: bool,
}

impl TemplateSpectrum {
    /// Transform a template, optionally rescaling it to unit time integral first.
    pub fn new(
        samples: &[f64],
        sample_rate: f64,
        integral_norm: bool,
        fourier: &Fourier,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(OfError::configuration("Template is empty."));
        }
        if samples.len() != fourier.len() {
            return Err(OfError::configuration(format!(
                "Template length {} does not match trace length {}.",
                samples.len(),
                fourier.len()
            )));
        }
        if samples.iter().any(|v| !v.is_finite()) {
            return Err(OfError::configuration("Template contains non-finite samples."));
        }

        let samples: Vec<f64> = if integral_norm {
            let integral = samples.iter().sum::<f64>() / sample_rate;
            if !(integral.is_finite() && integral != 0.0) {
                return Err(OfError::configuration(
                    "Template integral is zero; cannot normalize to unit integral.",
                ));
            }
            samples.iter().map(|v| v / integral).collect()
        } else {
            samples.to_vec()
        };

        let fft = fourier
            .forward_real(&samples)
            .into_iter()
            .map(|c| c / sample_rate)
            .collect();

        Ok(Self {
            samples,
            fft,
            integral_norm,
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn fft(&self) -> &[Complex64] {
        &self.fft
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn integral_norm(&self) -> bool {
        self.integral_norm
    }
}

/// Transform a signal trace with the same scaling as templates.
pub fn signal_spectrum(samples: &[f64], sample_rate: f64, fourier: &Fourier) -> Result<Vec<Complex64>> {
    if samples.len() != fourier.len() {
        return Err(OfError::configuration(format!(
            "Signal length {} does not match trace length {}.",
            samples.len(),
            fourier.len()
        )));
    }
    if samples.iter().any(|v| !v.is_finite()) {
        return Err(OfError::configuration("Signal contains non-finite samples."));
    }
    Ok(fourier
        .forward_real(samples)
        .into_iter()
        .map(|c| c / sample_rate)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ac_coupling_suppresses_zero_bin_only() {
        let psd = EffectivePsd::new(&[0.0, 2.0, 4.0], Coupling::Ac).unwrap();
        assert!(psd.values()[0].is_infinite());
        assert_eq!(psd.weights(), vec![0.0, 0.5, 0.25]);
    }

    #[test]
    fn dc_coupling_requires_positive_zero_bin() {
        let err = EffectivePsd::new(&[0.0, 2.0, 4.0], Coupling::Dc).unwrap_err();
        assert!(matches!(err, OfError::Configuration(_)));
        assert!(EffectivePsd::new(&[1.0, 2.0, 4.0], Coupling::Dc).is_ok());
    }

    #[test]
    fn non_positive_bins_are_rejected() {
        assert!(EffectivePsd::new(&[1.0, 0.0, 4.0], Coupling::Ac).is_err());
        assert!(EffectivePsd::new(&[1.0, -1.0, 4.0], Coupling::Ac).is_err());
        assert!(EffectivePsd::new(&[1.0, f64::NAN, 4.0], Coupling::Ac).is_err());
    }

    #[test]
    fn integral_norm_gives_unit_integral() {
        let fs = 100.0;
        let fourier = Fourier::new(4);
        let t = TemplateSpectrum::new(&[0.0, 1.0, 2.0, 1.0], fs, true, &fourier).unwrap();
        let integral: f64 = t.samples().iter().sum::<f64>() / fs;
        assert!((integral - 1.0).abs() < 1e-12);
        // DC bin of the scaled transform is the integral itself.
        assert!((t.fft()[0].re - 1.0).abs() < 1e-12);
    }

    #[test]
    fn template_length_must_match() {
        let fourier = Fourier::new(8);
        let err = TemplateSpectrum::new(&[1.0; 4], 1.0, false, &fourier).unwrap_err();
        assert!(matches!(err, OfError::Configuration(_)));
    }
}
