//! White noise traces and their PSD.
//!
//! Noise is drawn from a seeded `StdRng`, so fixtures are reproducible across runs.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::error::{OfError, Result};

/// Two-sided PSD of white noise with per-sample standard deviation `sigma`.
pub fn white_psd(nbins: usize, sample_rate: f64, sigma: f64) -> Vec<f64> {
    vec![sigma * sigma / sample_rate; nbins]
}

#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    rng: StdRng,
    normal: Normal<f64>,
}

impl NoiseGenerator {
    pub fn new(seed: u64, sigma: f64) -> Result<Self> {
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(OfError::invalid_value(format!("Invalid noise sigma: {sigma}.")));
        }
        let normal = Normal::new(0.0, sigma)
            .map_err(|e| OfError::invalid_value(format!("Noise distribution error: {e}")))?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            normal,
        })
    }

    pub fn trace(&mut self, nbins: usize) -> Vec<f64> {
        (0..nbins).map(|_| self.normal.sample(&mut self.rng)).collect()
    }

    /// Add fresh noise on top of `trace`.
    pub fn add_to(&mut self, trace: &mut [f64]) {
        for v in trace.iter_mut() {
            *v += self.normal.sample(&mut self.rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_noise() {
        let a = NoiseGenerator::new(7, 1.0).unwrap().trace(64);
        let b = NoiseGenerator::new(7, 1.0).unwrap().trace(64);
        let c = NoiseGenerator::new(8, 1.0).unwrap().trace(64);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn sample_variance_matches_sigma() {
        let x = NoiseGenerator::new(1, 2.0).unwrap().trace(20_000);
        let mean = x.iter().sum::<f64>() / x.len() as f64;
        let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / x.len() as f64;
        assert!((var / 4.0 - 1.0).abs() < 0.05, "variance {var}");
    }

    #[test]
    fn negative_sigma_is_rejected() {
        for sigma in [-1.0, f64::NAN, f64::INFINITY] {
            let err = NoiseGenerator::new(0, sigma).unwrap_err();
            assert!(matches!(err, OfError::InvalidValue(_)), "sigma {sigma}: {err:?}");
        }
        assert_eq!(NoiseGenerator::new(0, 0.0).unwrap().trace(4), vec![0.0; 4]);
    }
}
