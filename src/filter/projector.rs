//! Projection of a signal onto a filter kernel.
//!
//! For a signal transform `v` (same scaling as templates) this computes
//!
//! - `filtered_time[m] = df * Re(Σ_k phi[k] v[k] e^{+2πikm/N}) / norm`, the best-fit amplitude
//!   if the true delay were `m` samples (circular)
//! - `chisq_amp = df * Σ_k |v[k]|² / psd[k]`, the delay-independent part of the chi-square
//!
//! so that `chi2(m) = chisq_amp - norm * filtered_time[m]²`.

use num_complex::Complex64;

use crate::filter::kernel::FilterKernel;
use crate::filter::spectral::EffectivePsd;
use crate::math::Fourier;

/// `C[m] = df * Re Σ_k conj(lhs[k]) rhs[k] w[k] e^{+2πikm/N}` for every lag `m`.
///
/// This is the PSD-weighted inner product of `lhs` delayed by `m` samples with `rhs`.
pub fn weighted_correlation(
    fourier: &Fourier,
    lhs: &[Complex64],
    rhs: &[Complex64],
    weights: &[f64],
    df: f64,
) -> Vec<f64> {
    let product: Vec<Complex64> = lhs
        .iter()
        .zip(rhs.iter())
        .zip(weights.iter())
        .map(|((l, r), &w)| l.conj() * r * w)
        .collect();
    fourier
        .inverse_real(&product)
        .into_iter()
        .map(|v| v * df)
        .collect()
}

/// `df * Σ_k |v[k]|² / psd[k]`.
pub fn chisq_amp(signal_fft: &[Complex64], psd: &EffectivePsd, df: f64) -> f64 {
    df * signal_fft
        .iter()
        .zip(psd.weights().iter())
        .map(|(v, &w)| v.norm_sqr() * w)
        .sum::<f64>()
}

/// Per-tag intermediate results for the current signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalProjection {
    filtered: Vec<f64>,
    chisq_amp: f64,
    norm: f64,
}

impl SignalProjection {
    pub fn compute(
        signal_fft: &[Complex64],
        kernel: &FilterKernel,
        psd: &EffectivePsd,
        fourier: &Fourier,
    ) -> Self {
        let df = kernel.df();
        let norm = kernel.norm();
        let product: Vec<Complex64> = kernel
            .phi()
            .iter()
            .zip(signal_fft.iter())
            .map(|(p, v)| p * v)
            .collect();
        let filtered = fourier
            .inverse_real(&product)
            .into_iter()
            .map(|v| v * df / norm)
            .collect();

        Self {
            filtered,
            chisq_amp: chisq_amp(signal_fft, psd, df),
            norm,
        }
    }

    /// Best-fit amplitude per circular delay (index 0 = no delay).
    pub fn filtered_time(&self) -> &[f64] {
        &self.filtered
    }

    pub fn chisq_amp(&self) -> f64 {
        self.chisq_amp
    }

    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    /// Chi-square of the single-template model with amplitude `amp` at its optimal delay.
    ///
    /// Every fit type reports chi-square through this one function so that values agree exactly.
    pub fn chi2_at(&self, amp: f64) -> f64 {
        (self.chisq_amp - self.norm * amp * amp).max(0.0)
    }

    /// Filtered trace rotated so that index `j` means a delay of `j - pretrigger` samples.
    pub fn rotated(&self, pretrigger: usize) -> Vec<f64> {
        let n = self.filtered.len();
        (0..n)
            .map(|j| self.filtered[(j + n - pretrigger % n) % n])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coupling;
    use crate::filter::spectral::{TemplateSpectrum, signal_spectrum};

    #[test]
    fn shifted_template_peaks_at_its_delay() {
        let (n, fs) = (128, 1e4);
        let fourier = Fourier::new(n);
        let samples: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 - 32.0;
                if t < 0.0 { 0.0 } else { (-t / 10.0).exp() - (-t / 2.0).exp() }
            })
            .collect();
        let template = TemplateSpectrum::new(&samples, fs, false, &fourier).unwrap();
        let psd = EffectivePsd::new(&vec![1e-6; n], Coupling::Ac).unwrap();
        let kernel = FilterKernel::build(&template, &psd, fs, &fourier).unwrap();

        let delay = 7;
        let amp = 2.5;
        let shifted: Vec<f64> = (0..n).map(|i| amp * samples[(i + n - delay) % n]).collect();
        let v = signal_spectrum(&shifted, fs, &fourier).unwrap();
        let projection = SignalProjection::compute(&v, &kernel, &psd, &fourier);

        let filtered = projection.filtered_time();
        let best = (0..n)
            .min_by(|&a, &b| projection.chi2_at(filtered[a]).total_cmp(&projection.chi2_at(filtered[b])))
            .unwrap();
        assert_eq!(best, delay);
        assert!((filtered[delay] - amp).abs() < 1e-10);
        assert!(projection.chi2_at(filtered[delay]) < 1e-9 * projection.chisq_amp());
    }

    #[test]
    fn rotation_moves_zero_delay_to_pretrigger() {
        let projection = SignalProjection {
            filtered: vec![10.0, 11.0, 12.0, 13.0, 14.0],
            chisq_amp: 0.0,
            norm: 1.0,
        };
        let rotated = projection.rotated(2);
        assert_eq!(rotated, vec![13.0, 14.0, 10.0, 11.0, 12.0]);
    }
}
