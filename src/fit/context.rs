//! Borrowed view of everything a single-template fit reads.

use num_complex::Complex64;

use crate::filter::{EffectivePsd, FilterKernel, SignalProjection, TemplateSpectrum};
use crate::math::Fourier;

/// Inputs of a fit on one template tag for the current signal.
///
/// Built by the orchestrator; the fitters never mutate it.
#[derive(Debug, Clone, Copy)]
pub struct FitContext<'a> {
    pub template: &'a TemplateSpectrum,
    pub kernel: &'a FilterKernel,
    pub psd: &'a EffectivePsd,
    pub projection: &'a SignalProjection,
    pub signal_fft: &'a [Complex64],
    pub fourier: &'a Fourier,
    pub sample_rate: f64,
    pub pretrigger: usize,
}

impl FitContext<'_> {
    pub fn nbins(&self) -> usize {
        self.projection.len()
    }

    pub fn df(&self) -> f64 {
        self.kernel.df()
    }

    /// Delay in seconds of the pretrigger-aligned index `j` (fractional `j` allowed).
    pub fn t0_of(&self, j: f64) -> f64 {
        (j - self.pretrigger as f64) / self.sample_rate
    }

    /// Circular lag (unrotated filtered-trace index) of the pretrigger-aligned index `j`.
    pub fn lag_of(&self, j: usize) -> usize {
        let n = self.nbins();
        (j + n - self.pretrigger % n) % n
    }
}
