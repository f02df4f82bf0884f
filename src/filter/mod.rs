//! Optimal filter precomputation.
//!
//! Responsibilities:
//!
//! - transform templates and apply the PSD coupling mode
//! - build the per-template kernel `phi` and its normalization
//! - project a signal onto a kernel (filtered trace + chi-square constant)

pub mod kernel;
pub mod projector;
pub mod spectral;

pub use kernel::*;
pub use projector::*;
pub use spectral::*;
