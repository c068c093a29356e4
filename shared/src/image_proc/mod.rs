//! Image processing utilities for model maps.
//!
//! - **resample**: nearest-neighbour shifts and rotations with configurable edge handling

pub mod resample;

pub use resample::{rotate_nearest, sample_pixel, shift_nearest, EdgeMode, ResampleOptions};
