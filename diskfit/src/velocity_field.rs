//! Line-of-sight velocity fields of an inclined rotating disk.
//!
//! The field is evaluated on an oversampled grid that extends
//! `max_centre_shift` data pixels beyond the requested shape on every side.
//! The disk is first built about the middle of the map, then moved onto
//! `(xc, yc)` by a whole-sub-pixel nearest-neighbour shift and cropped back to
//! the requested shape. A shift larger than the margin would drag in `NaN`
//! from outside the padded grid, so it is rejected before the field is built.
//!
//! # Pixel convention
//!
//! Data pixel `j` has coordinate `x = j`. At oversample `k`, sub-pixel `j` has
//! coordinate `x = (j + 0.5) / k - 0.5`, so the `k` sub-pixels of a data pixel
//! are centred on it.

use std::f64::consts::PI;

use log::debug;
use ndarray::{s, Array2, ArrayView2};
use shared::image_proc::{rotate_nearest, shift_nearest, ResampleOptions};
use shared::Shape2D;

use crate::bessel::BesselProducts;
use crate::config::ModelSettings;
use crate::coordinates::rotate_coordinate_arrays;
use crate::error::ModelError;
use crate::params::{DiskParameters, MIN_SIN_INCLINATION};

/// Gravitational constant in kpc M_sun^-1 (km/s)^2
pub const GRAVITATIONAL_CONSTANT: f64 = 6.67408e-11 * 1.989e30 / 3.0857e19 / 1e6;

/// Padding margin, in data pixels, used when none is configured
pub const DEFAULT_MAX_CENTRE_SHIFT: usize = 5;

/// Circular velocity of an exponential disk (Freeman 1970, eq. 10).
///
/// ```text
/// V^2 = R * pi * G * s0 * (I0K0(u) - I1K1(u)) / R0,   u = R / (2 R0)
/// ```
///
/// `V(0) = 0`. A negative `V^2` is reported as an error, never clipped.
pub fn circular_velocity(
    radius: f64,
    params: &DiskParameters,
    bessel: &BesselProducts,
) -> Result<f64, ModelError> {
    if radius.is_nan() || radius < 0.0 {
        return Err(ModelError::InvalidValue {
            name: "radius",
            value: radius,
        });
    }
    if radius == 0.0 {
        return Ok(0.0);
    }

    let r0 = params.scale_radius();
    let s0 = params.surface_density();
    let (i0k0, i1k1) = bessel.products(0.5 * radius / r0)?;

    let v_squared = radius * (PI * GRAVITATIONAL_CONSTANT * s0) * (i0k0 - i1k1) / r0;
    if v_squared < 0.0 {
        return Err(ModelError::NegativeVelocitySquared {
            radius,
            value: v_squared,
        });
    }
    Ok(v_squared.sqrt())
}

/// Sub-pixel `(row, col)` of the output field that holds exactly `v0`.
///
/// This is the sub-pixel whose centre is nearest to `(xc, yc)`. Centres too
/// far away for `i64` saturate.
pub fn centre_pixel(params: &DiskParameters, oversample: usize) -> (i64, i64) {
    let (row, col) = centre_subpixel(params, oversample);
    (row as i64, col as i64)
}

// Rounded sub-pixel position of (yc, xc), kept in f64 so any finite centre is representable
fn centre_subpixel(params: &DiskParameters, oversample: usize) -> (f64, f64) {
    let k = oversample as f64;
    let to_sub = |c: f64| (k * (c + 0.5) - 0.5).round();
    (to_sub(params.yc), to_sub(params.xc))
}

/// Builds oversampled line-of-sight velocity fields.
///
/// Holds the Bessel product tables it evaluates the rotation curve with and
/// the padding margin. Cheap to copy.
#[derive(Debug, Clone, Copy)]
pub struct VelocityFieldBuilder<'a> {
    bessel: &'a BesselProducts,
    max_centre_shift: usize,
}

impl Default for VelocityFieldBuilder<'static> {
    fn default() -> Self {
        Self::new(BesselProducts::shared(), DEFAULT_MAX_CENTRE_SHIFT)
    }
}

impl<'a> VelocityFieldBuilder<'a> {
    pub fn new(bessel: &'a BesselProducts, max_centre_shift: usize) -> Self {
        Self {
            bessel,
            max_centre_shift,
        }
    }

    pub fn from_settings(bessel: &'a BesselProducts, settings: &ModelSettings) -> Self {
        Self::new(bessel, settings.max_centre_shift)
    }

    /// Padding margin in data pixels.
    pub fn max_centre_shift(&self) -> usize {
        self.max_centre_shift
    }

    /// Velocity field of shape `(oversample * height, oversample * width)` in km/s.
    ///
    /// # Errors
    ///
    /// - [`ModelError::InvalidOversample`] when `oversample == 0`
    /// - [`ModelError::SingularInclination`] when `sin(theta)` vanishes
    /// - [`ModelError::BesselDomain`] when the padded grid reaches radii
    ///   outside the tabulated rotation curve
    /// - [`ModelError::CentreShiftExceedsPadding`] when `(xc, yc)` is too far
    ///   from the map centre for the padding margin
    pub fn build(
        &self,
        params: &DiskParameters,
        shape: Shape2D,
        oversample: usize,
    ) -> Result<Array2<f64>, ModelError> {
        if oversample == 0 {
            return Err(ModelError::InvalidOversample(oversample));
        }
        if shape.is_empty() {
            return Err(ModelError::ShapeMismatch(format!(
                "cannot build a velocity field on an empty {shape} grid"
            )));
        }
        let (sin_i, cos_i) = params.theta.to_radians().sin_cos();
        if sin_i.abs() < MIN_SIN_INCLINATION {
            return Err(ModelError::SingularInclination(params.theta));
        }

        let k = oversample;
        let margin = self.max_centre_shift * k;
        let out_shape = shape.scaled(k);
        let padded = shape.padded(self.max_centre_shift).scaled(k);

        // Model centre in padded sub-pixel indices
        let centre_row = margin + out_shape.height / 2;
        let centre_col = margin + out_shape.width / 2;

        debug!(
            "Velocity field: {} grid, oversample {}, padded to {}",
            shape, k, padded
        );

        // Move the model centre onto the sub-pixel nearest (xc, yc). Beyond the
        // margin the shift would pull in NaN from outside the padded grid.
        let (target_row, target_col) = centre_subpixel(params, k);
        let shift_rows = target_row - (out_shape.height / 2) as f64;
        let shift_cols = target_col - (out_shape.width / 2) as f64;
        let limit = margin as f64;
        if !(shift_rows.abs() <= limit && shift_cols.abs() <= limit) {
            return Err(ModelError::CentreShiftExceedsPadding {
                dy: shift_rows,
                dx: shift_cols,
                margin,
            });
        }

        let kf = k as f64;
        let dx = Array2::from_shape_fn(padded.dim(), |(_, j)| {
            (j as f64 - centre_col as f64) / kf
        });
        let dy = Array2::from_shape_fn(padded.dim(), |(i, _)| {
            (i as f64 - centre_row as f64) / kf
        });
        let (xr, yr) = rotate_coordinate_arrays(&dx, &dy, params.pa.to_radians())?;

        let mut field = Array2::<f64>::zeros(padded.dim());
        for ((v, &x), &y) in field.iter_mut().zip(xr.iter()).zip(yr.iter()) {
            let radius = x.hypot(y / cos_i);
            *v = if radius == 0.0 {
                0.0
            } else {
                circular_velocity(radius, params, self.bessel)? * x / (radius * sin_i)
            };
        }

        let shifted = shift_nearest(
            &field.view(),
            (shift_rows, shift_cols),
            ResampleOptions::default(),
        );

        let mut cropped = shifted
            .slice(s![
                margin..margin + out_shape.height,
                margin..margin + out_shape.width
            ])
            .to_owned();

        cropped += params.v0;
        Ok(cropped)
    }
}

/// [`VelocityFieldBuilder::build`] with the shared Bessel tables and default padding.
pub fn velocity_field(
    params: &DiskParameters,
    shape: Shape2D,
    oversample: usize,
) -> Result<Array2<f64>, ModelError> {
    VelocityFieldBuilder::default().build(params, shape, oversample)
}

/// Shift a field by `(dy, dx)` pixels, then rotate it by `pa_deg` about its centre.
///
/// Both steps use nearest-neighbour sampling so velocities are never blended.
/// The default options fill exposed pixels with `NaN`.
pub fn shift_rotate_velfield(
    field: &ArrayView2<f64>,
    shift: (f64, f64),
    pa_deg: f64,
    options: ResampleOptions,
) -> Array2<f64> {
    let shifted = shift_nearest(field, shift, options);
    rotate_nearest(&shifted.view(), pa_deg, options)
}
