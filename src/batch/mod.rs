//! Event-level batch processing.
//!
//! - reduce traces to flat named quantities
//! - sum multi-channel events
//! - fan events out over rayon workers, one orchestrator clone each

pub mod reduce;

pub use reduce::*;
