//! Fitting on top of a projected signal.
//!
//! Responsibilities:
//!
//! - resolve delay windows in the pretrigger-aligned frame
//! - single-template fits (delay search, fixed time, pileup)
//! - simultaneous signal + background fits
//! - closed-form energy / time resolution

pub mod context;
pub mod delay;
pub mod multi;
pub mod pileup;
pub mod residual;
pub mod resolution;
pub mod window;

pub use context::*;
pub use delay::*;
pub use multi::*;
pub use pileup::*;
pub use residual::*;
pub use resolution::*;
pub use window::*;
