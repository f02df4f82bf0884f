#![allow(dead_code)]

use optimal_filter::base::OfBase;
use optimal_filter::domain::{Coupling, OfConfig};
use optimal_filter::sim::{make_template, white_psd};

pub const FS: f64 = 625e3;
pub const N: usize = 1024;
pub const PRE: usize = N / 2;
pub const SIGMA: f64 = 1e-8;

pub fn pulse() -> Vec<f64> {
    make_template(N, FS, 20e-6, 200e-6, 0.0)
}

pub fn config(coupling: Coupling) -> OfConfig {
    OfConfig::new(FS)
        .with_pretrigger_samples(PRE)
        .with_coupling(coupling)
}

/// Orchestrator with the pulse template under `"signal"`, a white PSD and its kernel.
pub fn base(coupling: Coupling) -> OfBase {
    let mut base = OfBase::new(config(coupling)).unwrap();
    base.add_template("signal", &pulse(), None).unwrap();
    base.set_psd(&white_psd(N, FS, SIGMA), None).unwrap();
    base.calc_kernel("signal").unwrap();
    base
}

pub fn scaled(trace: &[f64], amp: f64) -> Vec<f64> {
    trace.iter().map(|v| amp * v).collect()
}

pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

pub fn rel_err(got: f64, want: f64) -> f64 {
    ((got - want) / want).abs()
}
