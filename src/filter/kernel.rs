//! The optimal filter kernel ("phi") for one template.

use num_complex::Complex64;

use crate::error::{OfError, Result};
use crate::filter::spectral::{EffectivePsd, TemplateSpectrum};
use crate::filter::weighted_correlation;
use crate::math::Fourier;

/// Frequency-domain matched filter and its normalization.
///
/// - `phi[k] = conj(template_fft[k]) / psd[k]`
/// - `norm = df * Σ Re(phi[k] * template_fft[k])`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterKernel {
    phi: Vec<Complex64>,
    norm: f64,
    df: f64,
    /// Template auto-correlation seen through the filter; `autocorr[0] == norm`.
    autocorr: Vec<f64>,
}

impl FilterKernel {
    pub fn build(
        template: &TemplateSpectrum,
        psd: &EffectivePsd,
        sample_rate: f64,
        fourier: &Fourier,
    ) -> Result<Self> {
        if template.len() != psd.len() {
            return Err(OfError::configuration(format!(
                "Template length {} and PSD length {} differ.",
                template.len(),
                psd.len()
            )));
        }

        let n = template.len();
        let df = sample_rate / n as f64;
        let weights = psd.weights();
        let phi: Vec<Complex64> = template
            .fft()
            .iter()
            .zip(weights.iter())
            .map(|(s, &w)| s.conj() * w)
            .collect();

        let norm = df
            * phi
                .iter()
                .zip(template.fft().iter())
                .map(|(p, s)| (p * s).re)
                .sum::<f64>();
        if !(norm.is_finite() && norm > 0.0) {
            return Err(OfError::configuration(format!(
                "Filter normalization is {norm}; the template carries no weight under this PSD."
            )));
        }

        let autocorr = weighted_correlation(fourier, template.fft(), template.fft(), &weights, df);

        Ok(Self {
            phi,
            norm,
            df,
            autocorr,
        })
    }

    pub fn phi(&self) -> &[Complex64] {
        &self.phi
    }

    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn df(&self) -> f64 {
        self.df
    }

    pub fn len(&self) -> usize {
        self.phi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phi.is_empty()
    }

    pub fn autocorr(&self) -> &[f64] {
        &self.autocorr
    }
}
