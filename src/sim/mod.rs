//! Synthetic fixtures: pulse / background templates, white-noise PSDs and seeded noise traces.

pub mod noise;
pub mod template;

pub use noise::*;
pub use template::*;
