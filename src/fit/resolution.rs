//! Closed-form resolution estimates.
//!
//! - energy: `sigma_E = 1 / sqrt(norm)`, a property of the template and PSD only
//! - time: `sigma_t = 1 / sqrt(amp² df Σ (2π f_k)² |s_k|² / psd_k)`, the inverse curvature of
//!   the chi-square surface in time at the optimum; it scales with the fitted amplitude

use std::f64::consts::PI;

use crate::error::{OfError, Result};
use crate::filter::{EffectivePsd, FilterKernel, TemplateSpectrum};
use crate::math::fft_freqs;

pub fn energy_resolution(kernel: &FilterKernel) -> f64 {
    1.0 / kernel.norm().sqrt()
}

pub fn time_resolution(
    template: &TemplateSpectrum,
    psd: &EffectivePsd,
    sample_rate: f64,
    amp: f64,
) -> Result<f64> {
    if !(amp.is_finite() && amp != 0.0) {
        return Err(OfError::invalid_value(format!(
            "Time resolution needs a finite, non-zero amplitude (got {amp})."
        )));
    }
    let n = template.len();
    let df = sample_rate / n as f64;
    let freqs = fft_freqs(n, sample_rate);
    let curvature: f64 = template
        .fft()
        .iter()
        .zip(psd.weights().iter())
        .zip(freqs.iter())
        .map(|((s, &w), &f)| (2.0 * PI * f).powi(2) * s.norm_sqr() * w)
        .sum::<f64>()
        * df;

    let information = amp * amp * curvature;
    if !(information.is_finite() && information > 0.0) {
        return Err(OfError::invalid_value(
            "Chi-square curvature in time is zero; time resolution is undefined.",
        ));
    }
    Ok(1.0 / information.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coupling;
    use crate::math::Fourier;

    fn pulse(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64 - n as f64 / 2.0;
                if t < 0.0 { 0.0 } else { (-t / 20.0).exp() - (-t / 4.0).exp() }
            })
            .collect()
    }

    #[test]
    fn energy_resolution_scales_with_sqrt_psd() {
        let (n, fs) = (256, 625e3);
        let fourier = Fourier::new(n);
        let template = TemplateSpectrum::new(&pulse(n), fs, false, &fourier).unwrap();
        let psd1 = EffectivePsd::new(&vec![1e-22; n], Coupling::Ac).unwrap();
        let psd9 = EffectivePsd::new(&vec![9e-22; n], Coupling::Ac).unwrap();
        let s1 = energy_resolution(&FilterKernel::build(&template, &psd1, fs, &fourier).unwrap());
        let s9 = energy_resolution(&FilterKernel::build(&template, &psd9, fs, &fourier).unwrap());
        assert!(s1 > 0.0);
        assert!((s9 / s1 - 3.0).abs() < 1e-10, "ratio {}", s9 / s1);
    }

    #[test]
    fn time_resolution_halves_when_amplitude_doubles() {
        let (n, fs) = (256, 625e3);
        let fourier = Fourier::new(n);
        let template = TemplateSpectrum::new(&pulse(n), fs, false, &fourier).unwrap();
        let psd = EffectivePsd::new(&vec![1e-22; n], Coupling::Ac).unwrap();
        let t1 = time_resolution(&template, &psd, fs, 1e-7).unwrap();
        let t2 = time_resolution(&template, &psd, fs, -2e-7).unwrap();
        assert!((t1 / t2 - 2.0).abs() < 1e-10);
        assert!(time_resolution(&template, &psd, fs, 0.0).is_err());
    }
}
