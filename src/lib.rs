//! `optimal-filter` library crate.
//!
//! Frequency-domain optimal filter fits of pulse templates to sampled traces:
//!
//! - `filter`: template spectra, PSD coupling, kernels, signal projection
//! - `fit`: delay / no-delay / pileup / multi-template fits and resolutions
//! - `base`: the per-channel orchestrator that owns every cache
//! - `batch`: per-event reduction into flat named quantities
//! - `sim`: synthetic templates and noise for tests and demos

pub mod base;
pub mod batch;
pub mod domain;
pub mod error;
pub mod filter;
pub mod fit;
pub mod math;
pub mod sim;
