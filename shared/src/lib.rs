//! Shared components and utilities for the disk kinematics workspace.
//!
//! This crate contains generic numeric and image helpers that carry no
//! knowledge of the disk model itself: interpolation tables, FFT sizing,
//! grid shapes and nearest-neighbour resampling.

pub mod algo;
pub mod image_proc;
pub mod image_size;

pub use image_size::Shape2D;
