//! Rotating exponential-disk kinematic models for integral-field datacubes
//!
//! This crate builds the forward model a fitter compares against binned IFU
//! spectra of an emission line: a line-of-sight velocity field for a thin
//! exponential disk, a Gaussian light profile, a synthetic spectral cube,
//! blurring by seeing and instrumental line spread, and summation into the
//! observational bins.

pub mod bessel;
pub mod binning;
pub mod config;
pub mod convolution;
pub mod coordinates;
pub mod cube;
pub mod error;
pub mod gaussians;
pub mod params;
pub mod pipeline;
pub mod velocity_field;

// Re-exports for easier access
pub use bessel::BesselProducts;
pub use binning::{bin_cube, BinMap};
pub use config::ModelSettings;
pub use convolution::{
    convolve1d_same, convolve3d_same, Kernel, Kernel1d, KernelSpectrum, LineSpectrum,
};
pub use cube::{make_deconvolved_model, make_velocity_cube, SpectralAxis};
pub use error::{ErrorKind, ModelError};
pub use gaussians::{line_profile, make_3d_psf, LineWidth};
pub use params::{DiskParameters, GaussianParams};
pub use pipeline::{ModelPipeline, ObservationSetup};
pub use shared::Shape2D;
pub use velocity_field::{velocity_field, VelocityFieldBuilder};
