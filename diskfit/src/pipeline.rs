//! End-to-end model evaluation for a fitter.
//!
//! A [`ModelPipeline`] is built once per observation. It precomputes
//! everything that does not depend on the disk parameters:
//!
//! - the oversampled light profile
//! - the transform of the 3D PSF/LSF kernel
//! - the fit-region mask
//!
//! [`ModelPipeline::evaluate`] then runs
//!
//! ```text
//! velocity field -> velocity cube x light -> convolve -> rebin k x k -> bin
//! ```
//!
//! and returns `(n_lambda, n_bins)` spectra directly comparable with the
//! binned data. Evaluation takes `&self` and touches no shared mutable state,
//! so one pipeline can serve many threads.

use std::time::Instant;

use log::{debug, info};
use ndarray::{Array2, Array3, ArrayView2};
use shared::Shape2D;

use crate::bessel::BesselProducts;
use crate::binning::BinMap;
use crate::config::ModelSettings;
use crate::convolution::{convolve3d_with_spectrum, KernelSpectrum};
use crate::cube::{
    fit_region_mask, make_deconvolved_model, make_light_profile, rebin_spatial, SpectralAxis,
};
use crate::error::ModelError;
use crate::gaussians::make_3d_psf;
use crate::params::{DiskParameters, GaussianParams};
use crate::velocity_field::VelocityFieldBuilder;

/// Everything known about an observation before fitting starts.
///
/// Widths are in data pixels (seeing) and wavelength units (instrumental
/// FWHM). The velocity dispersion is the intrinsic line width in km/s.
#[derive(Debug, Clone)]
pub struct ObservationSetup {
    /// Spatial shape of the datacube
    pub shape: Shape2D,
    /// Wavelength sampling and rest wavelength of the line
    pub axis: SpectralAxis,
    /// Seeing FWHM in data pixels
    pub seeing_fwhm: f64,
    /// Instrumental line-spread FWHM in wavelength units
    pub instrumental_fwhm: f64,
    /// Intrinsic velocity dispersion in km/s
    pub dispersion: f64,
    /// Surface-brightness profile in data pixels
    pub light: GaussianParams,
    /// Bin layout applied to the data
    pub bins: BinMap,
}

/// Precomputed model evaluator for one observation.
#[derive(Debug, Clone)]
pub struct ModelPipeline<'a> {
    setup: ObservationSetup,
    settings: ModelSettings,
    builder: VelocityFieldBuilder<'a>,
    /// Flux per sub-pixel on the oversampled grid
    light_flux: Array2<f64>,
    kernel: KernelSpectrum,
    fit_mask: Array2<bool>,
}

impl ModelPipeline<'static> {
    /// Pipeline using the process-wide Bessel tables.
    pub fn new(setup: ObservationSetup, settings: ModelSettings) -> Result<Self, ModelError> {
        Self::with_bessel(setup, settings, BesselProducts::shared())
    }
}

impl<'a> ModelPipeline<'a> {
    /// Pipeline using an explicit set of Bessel tables.
    pub fn with_bessel(
        setup: ObservationSetup,
        settings: ModelSettings,
        bessel: &'a BesselProducts,
    ) -> Result<Self, ModelError> {
        settings.validate()?;
        if setup.bins.shape() != setup.shape {
            return Err(ModelError::ShapeMismatch(format!(
                "bin map covers {} but the cube is {}",
                setup.bins.shape(),
                setup.shape
            )));
        }
        if !(setup.dispersion.is_finite() && setup.dispersion > 0.0) {
            return Err(ModelError::InvalidValue {
                name: "velocity dispersion",
                value: setup.dispersion,
            });
        }

        let start = Instant::now();
        let k = settings.oversample;
        let fine_shape = setup.shape.scaled(k);

        // Each sub-pixel covers 1/k^2 of a data pixel
        let light_flux = make_light_profile(&setup.light, setup.shape, k)? / (k * k) as f64;

        let psf = make_3d_psf(
            setup.seeing_fwhm * k as f64,
            setup.instrumental_fwhm,
            fine_shape,
            &setup.axis.log_lambda(),
        )?;
        let kernel = KernelSpectrum::new(&psf.view())?;

        let data_light = make_light_profile(&setup.light, setup.shape, 1)?;
        let fit_mask = fit_region_mask(&data_light.view(), settings.fraction_of_peak)?;

        info!(
            "Model pipeline ready: {} spaxels x {} samples, oversample {}, {} bins, {} spaxels in fit region ({:.1} ms)",
            setup.shape,
            setup.axis.len(),
            k,
            setup.bins.n_bins(),
            fit_mask.iter().filter(|&&m| m).count(),
            start.elapsed().as_secs_f64() * 1e3
        );

        Ok(Self {
            builder: VelocityFieldBuilder::from_settings(bessel, &settings),
            setup,
            settings,
            light_flux,
            kernel,
            fit_mask,
        })
    }

    pub fn setup(&self) -> &ObservationSetup {
        &self.setup
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Transform of the oversampled 3D PSF/LSF kernel.
    pub fn kernel_spectrum(&self) -> &KernelSpectrum {
        &self.kernel
    }

    /// Oversampled light profile as flux per sub-pixel.
    pub fn light_flux(&self) -> ArrayView2<'_, f64> {
        self.light_flux.view()
    }

    /// Data-resolution pixels above `fraction_of_peak` of the light peak.
    pub fn fit_mask(&self) -> ArrayView2<'_, bool> {
        self.fit_mask.view()
    }

    /// Oversampled line-of-sight velocity field.
    pub fn velocity_field(&self, params: &DiskParameters) -> Result<Array2<f64>, ModelError> {
        self.builder
            .build(params, self.setup.shape, self.settings.oversample)
    }

    /// Oversampled model before instrumental blurring.
    pub fn deconvolved_model(&self, params: &DiskParameters) -> Result<Array3<f64>, ModelError> {
        make_deconvolved_model(
            &self.builder,
            params,
            self.setup.shape,
            self.settings.oversample,
            self.setup.dispersion,
            &self.setup.axis,
            &self.light_flux.view(),
        )
    }

    /// Blurred model at data resolution, `(n_lambda, height, width)`.
    pub fn convolved_model(&self, params: &DiskParameters) -> Result<Array3<f64>, ModelError> {
        let start = Instant::now();
        let deconvolved = self.deconvolved_model(params)?;
        let built = start.elapsed();

        let convolved = convolve3d_with_spectrum(&deconvolved.view(), &self.kernel)?;
        let blurred = start.elapsed();

        let rebinned = rebin_spatial(&convolved.view(), self.settings.oversample)?;
        debug!(
            "Model for [{}]: build {:.2} ms, convolve {:.2} ms, rebin {:.2} ms",
            params,
            built.as_secs_f64() * 1e3,
            (blurred - built).as_secs_f64() * 1e3,
            (start.elapsed() - blurred).as_secs_f64() * 1e3
        );
        Ok(rebinned)
    }

    /// Binned model spectra, `(n_lambda, n_bins)` in ascending bin id.
    pub fn evaluate(&self, params: &DiskParameters) -> Result<Array2<f64>, ModelError> {
        let convolved = self.convolved_model(params)?;
        self.setup.bins.bin_cube(&convolved.view())
    }

    /// [`Self::evaluate`] for a flat parameter vector in [`DiskParameters::KEYS`] order.
    pub fn evaluate_slice(&self, values: &[f64]) -> Result<Array2<f64>, ModelError> {
        self.evaluate(&DiskParameters::from_slice(values)?)
    }
}
