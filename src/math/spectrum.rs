//! Discrete Fourier transform plumbing.
//!
//! Every trace on a channel has the same length, so forward and inverse plans are built once and
//! shared (plans are `Arc`s, cloning a `Fourier` is cheap).
//!
//! Both directions are unnormalized, matching `rustfft`; callers apply the physical scaling.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

#[derive(Clone)]
pub struct Fourier {
    n: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for Fourier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fourier").field("n", &self.n).finish()
    }
}

impl Fourier {
    pub fn new(n: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n,
            forward: planner.plan_fft_forward(n),
            inverse: planner.plan_fft_inverse(n),
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Forward transform of a real sequence.
    pub fn forward_real(&self, samples: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = samples.iter().map(|&x| Complex64::new(x, 0.0)).collect();
        self.forward.process(&mut buffer);
        buffer
    }

    /// Unnormalized inverse transform.
    pub fn inverse(&self, spectrum: &[Complex64]) -> Vec<Complex64> {
        let mut buffer = spectrum.to_vec();
        self.inverse.process(&mut buffer);
        buffer
    }

    /// Real part of the unnormalized inverse transform.
    pub fn inverse_real(&self, spectrum: &[Complex64]) -> Vec<f64> {
        self.inverse(spectrum).into_iter().map(|c| c.re).collect()
    }
}

/// Signed bin frequencies in the usual FFT ordering (`0, df, ..., -df`).
pub fn fft_freqs(n: usize, sample_rate: f64) -> Vec<f64> {
    let df = sample_rate / n as f64;
    let positive_max = (n.saturating_sub(1)) / 2;
    (0..n)
        .map(|k| {
            if k <= positive_max {
                k as f64 * df
            } else {
                (k as f64 - n as f64) * df
            }
        })
        .collect()
}

/// Phase factor that delays a spectrum component at `freq` by `t0` seconds.
pub fn delay_phase(freq: f64, t0: f64) -> Complex64 {
    Complex64::from_polar(1.0, -2.0 * PI * freq * t0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_freqs_even_and_odd() {
        let even = fft_freqs(8, 8.0);
        assert_eq!(even, vec![0.0, 1.0, 2.0, 3.0, -4.0, -3.0, -2.0, -1.0]);
        let odd = fft_freqs(7, 7.0);
        assert_eq!(odd, vec![0.0, 1.0, 2.0, 3.0, -3.0, -2.0, -1.0]);
    }

    #[test]
    fn inverse_of_forward_scales_by_n() {
        let fourier = Fourier::new(16);
        let x: Vec<f64> = (0..16).map(|i| (i as f64 * 0.3).sin()).collect();
        let back = fourier.inverse_real(&fourier.forward_real(&x));
        for (a, b) in x.iter().zip(back.iter()) {
            assert!((a - b / 16.0).abs() < 1e-12);
        }
    }

    #[test]
    fn integer_delay_phase_is_circular_shift() {
        let n = 32;
        let fs = 32.0;
        let fourier = Fourier::new(n);
        let freqs = fft_freqs(n, fs);
        let x: Vec<f64> = (0..n).map(|i| if i == 3 { 1.0 } else { 0.0 }).collect();
        let spectrum: Vec<Complex64> = fourier
            .forward_real(&x)
            .iter()
            .zip(freqs.iter())
            .map(|(s, &f)| s * delay_phase(f, 5.0 / fs))
            .collect();
        let shifted = fourier.inverse_real(&spectrum);
        assert!((shifted[8] / n as f64 - 1.0).abs() < 1e-12);
        assert!((shifted[3] / n as f64).abs() < 1e-12);
    }
}
