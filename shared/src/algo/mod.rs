//! Numerical algorithms shared across the disk kinematics crates
//!
//! This module provides interpolation tables and small FFT sizing helpers.

pub mod lookup_table;
pub mod misc;

pub use lookup_table::{LookupError, LookupTable};
pub use misc::next_fast_len;
