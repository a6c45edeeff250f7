//! Numerical primitives shared by the hidden Markov model crates.

pub mod math;

pub use math::gaussian::*;
pub use math::stable::*;
