//! Mathematical utilities: transforms, small linear solves and parabolic interpolation.

pub mod ols;
pub mod parabola;
pub mod spectrum;

pub use ols::*;
pub use parabola::*;
pub use spectrum::*;
