//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - input configuration enums (`Coupling`, `PulseDirection`) and window specs
//! - fit outputs (`FitResult`, `MultiFit`, `MultiFitOutput`)
//! - the per-channel configuration (`OfConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
