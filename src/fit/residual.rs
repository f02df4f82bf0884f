//! Explicit residual evaluation in the frequency domain.
//!
//! The delay search never needs this (it works from the filtered trace), but the fixed-time
//! chi-square variant, the low-frequency diagnostic and the multi-template residual do.

use num_complex::Complex64;

use crate::math::{Fourier, delay_phase};

/// `Σ_j amps[j] * templates[j][k] * e^{-2πi f_k t0s[j]}`.
///
/// Fractional delays are applied as phase ramps; integer-sample delays reduce to circular shifts.
pub fn model_spectrum(
    templates: &[&[Complex64]],
    amps: &[f64],
    t0s: &[f64],
    freqs: &[f64],
) -> Vec<Complex64> {
    let mut model = vec![Complex64::new(0.0, 0.0); freqs.len()];
    for ((template, &amp), &t0) in templates.iter().zip(amps.iter()).zip(t0s.iter()) {
        if amp == 0.0 {
            continue;
        }
        for (k, m) in model.iter_mut().enumerate() {
            *m += template[k] * delay_phase(freqs[k], t0) * amp;
        }
    }
    model
}

/// `df * Σ |v[k] - model[k]|² w[k]` over bins with `|f_k| <= cutoff` (all bins if `None`).
pub fn residual_chi2(
    signal_fft: &[Complex64],
    model: &[Complex64],
    weights: &[f64],
    freqs: &[f64],
    df: f64,
    cutoff_hz: Option<f64>,
) -> f64 {
    let sum: f64 = signal_fft
        .iter()
        .zip(model.iter())
        .zip(weights.iter())
        .zip(freqs.iter())
        .filter(|(_, f)| cutoff_hz.is_none_or(|c| f.abs() <= c))
        .map(|(((v, m), &w), _)| (v - m).norm_sqr() * w)
        .sum();
    df * sum
}

/// Time-domain `signal - model` from their (scaled) transforms.
pub fn residual_trace(
    fourier: &Fourier,
    signal_fft: &[Complex64],
    model: &[Complex64],
    sample_rate: f64,
) -> Vec<f64> {
    let n = fourier.len() as f64;
    let diff: Vec<Complex64> = signal_fft.iter().zip(model.iter()).map(|(v, m)| v - m).collect();
    fourier
        .inverse_real(&diff)
        .into_iter()
        .map(|x| x * sample_rate / n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fft_freqs;

    #[test]
    fn residual_of_exact_model_vanishes() {
        let (n, fs) = (32, 32.0);
        let fourier = Fourier::new(n);
        let freqs = fft_freqs(n, fs);
        let template: Vec<f64> = (0..n).map(|i| (-(i as f64) / 4.0).exp()).collect();
        let s: Vec<Complex64> = fourier.forward_real(&template).iter().map(|c| c / fs).collect();
        let signal: Vec<f64> = (0..n).map(|i| 3.0 * template[(i + n - 2) % n]).collect();
        let v: Vec<Complex64> = fourier.forward_real(&signal).iter().map(|c| c / fs).collect();

        let model = model_spectrum(&[&s], &[3.0], &[2.0 / fs], &freqs);
        let weights = vec![1.0; n];
        assert!(residual_chi2(&v, &model, &weights, &freqs, 1.0, None) < 1e-20);
        let resid = residual_trace(&fourier, &v, &model, fs);
        assert!(resid.iter().all(|r| r.abs() < 1e-12));
    }

    #[test]
    fn cutoff_restricts_bins() {
        let freqs = vec![0.0, 1.0, 2.0, -2.0, -1.0];
        let v = vec![Complex64::new(1.0, 0.0); 5];
        let model = vec![Complex64::new(0.0, 0.0); 5];
        let weights = vec![1.0; 5];
        assert_eq!(residual_chi2(&v, &model, &weights, &freqs, 1.0, None), 5.0);
        assert_eq!(residual_chi2(&v, &model, &weights, &freqs, 1.0, Some(1.0)), 3.0);
    }
}
