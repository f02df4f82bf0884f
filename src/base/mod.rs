//! Orchestration layer.
//!
//! - `OfBase`: per-channel caches and every fit operation
//! - `Of1x1`: one template, one channel convenience wrapper

pub mod of1x1;
pub mod orchestrator;

pub use of1x1::*;
pub use orchestrator::*;
