//! Gaussian light profiles, seeing disks and line spread functions.
//!
//! # Line spread function
//!
//! [`line_profile`] defines each line in the frequency domain and transforms
//! it back numerically:
//!
//! ```text
//! G(w) = exp(-(w * sigma)^2 / 2) * exp(-i * w * x0) [* sinc(w / 2pi)]
//! ```
//!
//! with `x0` the line centre and `sigma` its width, both in spectral samples.
//! The optional sinc factor is the exact transform of a unit pixel box. This
//! stays exact for any `sigma`, including zero where a sampled Gaussian would
//! collapse to nothing: with `sigma = 0`, no pixel integration and `x0` on a
//! sample, the profile is a unit impulse.

use std::f64::consts::PI;
use std::fmt;

use ndarray::{Array2, Array3, ArrayView1, Axis};
use rustfft::{num_complex::Complex64, FftPlanner};
use shared::algo::next_fast_len;
use shared::Shape2D;

use crate::error::ModelError;
use crate::params::GaussianParams;

/// Ratio between a Gaussian's standard deviation and its FWHM, `1 / (2 sqrt(2 ln 2))`
pub const FWHM_TO_SIGMA: f64 = 0.424_660_900_144_009_5;

/// Rotated elliptical Gaussian evaluated at `(x, y)`.
///
/// ```text
/// g = offset + A exp(-(a dx^2 + 2 b dx dy + c dy^2))
/// a = cos^2(t) / 2sx^2 + sin^2(t) / 2sy^2
/// b = -sin(2t) / 4sx^2 + sin(2t) / 4sy^2
/// c = sin^2(t) / 2sx^2 + cos^2(t) / 2sy^2
/// ```
pub fn gaussian2d(params: &GaussianParams, x: f64, y: f64) -> f64 {
    let (sin_t, cos_t) = params.rotation.sin_cos();
    let sin_2t = (2.0 * params.rotation).sin();
    let sx2 = params.sigma_x * params.sigma_x;
    let sy2 = params.sigma_y * params.sigma_y;

    let a = cos_t * cos_t / (2.0 * sx2) + sin_t * sin_t / (2.0 * sy2);
    let b = -sin_2t / (4.0 * sx2) + sin_2t / (4.0 * sy2);
    let c = sin_t * sin_t / (2.0 * sx2) + cos_t * cos_t / (2.0 * sy2);

    let dx = x - params.x;
    let dy = y - params.y;
    params.offset + params.amplitude * (-(a * dx * dx + 2.0 * b * dx * dy + c * dy * dy)).exp()
}

/// [`gaussian2d`] on a pixel grid, with `x` the column and `y` the row index.
pub fn gaussian2d_grid(params: &GaussianParams, shape: Shape2D) -> Array2<f64> {
    Array2::from_shape_fn(shape.dim(), |(row, col)| {
        gaussian2d(params, col as f64, row as f64)
    })
}

/// Circular Gaussian seeing disk centred at `(width/2, height/2)`, summing to 1.
pub fn seeing_kernel(fwhm: f64, shape: Shape2D) -> Result<Array2<f64>, ModelError> {
    if !(fwhm.is_finite() && fwhm > 0.0) {
        return Err(ModelError::InvalidValue {
            name: "seeing FWHM",
            value: fwhm,
        });
    }
    if shape.is_empty() {
        return Err(ModelError::ShapeMismatch(format!(
            "cannot build a seeing kernel on an empty {shape} grid"
        )));
    }

    let (cx, cy) = shape.center();
    let params = GaussianParams::circular(cx, cy, fwhm * FWHM_TO_SIGMA);
    let kernel = gaussian2d_grid(&params, shape);

    let total = kernel.sum();
    if !(total.is_normal() && total > 0.0) {
        // Width far below a pixel with the centre between pixels
        return Err(ModelError::InvalidValue {
            name: "seeing FWHM",
            value: fwhm,
        });
    }
    Ok(kernel / total)
}

/// Line width as a function of rest wavelength.
pub enum LineWidth {
    /// The same FWHM for every line
    Constant(f64),
    /// FWHM computed from each line's rest wavelength
    Function(Box<dyn Fn(f64) -> f64 + Send + Sync>),
}

impl LineWidth {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        LineWidth::Function(Box::new(f))
    }

    /// FWHM at rest wavelength `lambda`.
    pub fn resolve(&self, lambda: f64) -> f64 {
        match self {
            LineWidth::Constant(fwhm) => *fwhm,
            LineWidth::Function(f) => f(lambda),
        }
    }
}

impl From<f64> for LineWidth {
    fn from(fwhm: f64) -> Self {
        LineWidth::Constant(fwhm)
    }
}

impl fmt::Debug for LineWidth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LineWidth::Constant(fwhm) => f.debug_tuple("Constant").field(fwhm).finish(),
            LineWidth::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Log-wavelength sampling step, checking the axis is usable.
pub(crate) fn log_lambda_step(log_lambda: &ArrayView1<f64>) -> Result<f64, ModelError> {
    let n = log_lambda.len();
    if n < 2 {
        return Err(ModelError::ShapeMismatch(format!(
            "spectral axis needs at least 2 samples, got {n}"
        )));
    }
    let step = (log_lambda[n - 1] - log_lambda[0]) / (n - 1) as f64;
    if !(step.is_finite() && step > 0.0) {
        return Err(ModelError::InvalidValue {
            name: "log-wavelength step",
            value: step,
        });
    }
    Ok(step)
}

/// Normalised Gaussian line spread functions, one column per line.
///
/// # Arguments
///
/// * `log_lambda` - natural-log wavelengths, uniformly spaced and increasing
/// * `line_waves` - rest wavelengths, same units as `exp(log_lambda)`
/// * `fwhm` - line FWHM in wavelength units
/// * `pixel` - integrate the profile over each sample
///
/// # Returns
///
/// An `(n_samples, n_lines)` array whose columns each sum to 1.
pub fn line_profile(
    log_lambda: &ArrayView1<f64>,
    line_waves: &[f64],
    fwhm: &LineWidth,
    pixel: bool,
) -> Result<Array2<f64>, ModelError> {
    let n = log_lambda.len();
    let dx = log_lambda_step(log_lambda)?;
    let npad = next_fast_len(n);

    let mut planner = FftPlanner::new();
    let inverse_fft = planner.plan_fft_inverse(npad);

    let mut profiles = Array2::<f64>::zeros((n, line_waves.len()));
    for (&lambda, mut column) in line_waves.iter().zip(profiles.axis_iter_mut(Axis(1))) {
        if !(lambda.is_finite() && lambda > 0.0) {
            return Err(ModelError::InvalidValue {
                name: "line wavelength",
                value: lambda,
            });
        }
        let x0 = (lambda.ln() - log_lambda[0]) / dx;
        if x0 < -0.5 || x0 > n as f64 - 0.5 {
            return Err(ModelError::InvalidValue {
                name: "line wavelength outside the spectral axis",
                value: lambda,
            });
        }
        let line_fwhm = fwhm.resolve(lambda);
        if !(line_fwhm.is_finite() && line_fwhm >= 0.0) {
            return Err(ModelError::InvalidValue {
                name: "line FWHM",
                value: line_fwhm,
            });
        }
        let xsig = line_fwhm * FWHM_TO_SIGMA / lambda / dx;

        let mut spectrum = vec![Complex64::new(0.0, 0.0); npad];
        for k in 0..npad / 2 + 1 {
            let w = 2.0 * PI * k as f64 / npad as f64;
            let mut value = Complex64::from_polar((-0.5 * (w * xsig).powi(2)).exp(), -w * x0);
            if pixel && k > 0 {
                let t = PI * k as f64 / npad as f64;
                value *= t.sin() / t;
            }

            if 2 * k == npad {
                // Nyquist bin of a real signal
                spectrum[k] = Complex64::new(value.re, 0.0);
            } else {
                spectrum[k] = value;
                if k > 0 {
                    spectrum[npad - k] = value.conj();
                }
            }
        }

        inverse_fft.process(&mut spectrum);

        let scale = 1.0 / npad as f64;
        for (out, c) in column.iter_mut().zip(spectrum.iter()) {
            *out = c.re * scale;
        }

        // Renormalise what survives truncation to n samples
        let total = column.sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(ModelError::InvalidValue {
                name: "line profile normalisation",
                value: total,
            });
        }
        column /= total;
    }

    Ok(profiles)
}

/// 3D PSF: a seeing disk times a pixel-integrated LSF.
///
/// The LSF is centred on the middle spectral sample `n/2` and the seeing disk
/// on `(width/2, height/2)`, so convolving with this kernel does not move the
/// cube. Output shape is `(n_lambda, height, width)`.
pub fn make_3d_psf(
    seeing_fwhm: f64,
    lsf_fwhm: f64,
    shape: Shape2D,
    log_lambda: &ArrayView1<f64>,
) -> Result<Array3<f64>, ModelError> {
    let image = seeing_kernel(seeing_fwhm, shape)?;
    let n = log_lambda.len();
    if n == 0 {
        return Err(ModelError::ShapeMismatch(
            "spectral axis is empty".to_string(),
        ));
    }
    let centre_wave = log_lambda[n / 2].exp();
    let lsf = line_profile(log_lambda, &[centre_wave], &LineWidth::Constant(lsf_fwhm), true)?;

    let mut psf = Array3::<f64>::zeros((n, shape.height, shape.width));
    for (mut plane, &weight) in psf.axis_iter_mut(Axis(0)).zip(lsf.column(0).iter()) {
        plane.assign(&(&image * weight));
    }
    Ok(psf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::Array1;

    fn log_lambdas(n: usize) -> Array1<f64> {
        Array1::linspace(0.779_999_971_389_771f64.ln(), 1.089_848_666_160_834_2f64.ln(), n)
    }

    fn centroid(image: &Array2<f64>) -> (f64, f64) {
        let total = image.sum();
        let mut xbar = 0.0;
        let mut ybar = 0.0;
        for ((row, col), &v) in image.indexed_iter() {
            xbar += col as f64 * v;
            ybar += row as f64 * v;
        }
        (xbar / total, ybar / total)
    }

    #[test]
    fn test_fwhm_to_sigma() {
        assert_relative_eq!(
            FWHM_TO_SIGMA,
            1.0 / (2.0 * (2.0 * 2f64.ln()).sqrt()),
            max_relative = 1e-15
        );
    }

    #[test]
    fn test_seeing_shape_and_normalisation() {
        for (fwhm, shape) in [(5.0, (30, 30)), (0.8, (17, 12)), (12.0, (40, 25))] {
            let kernel = seeing_kernel(fwhm, shape.into()).unwrap();
            assert_eq!(kernel.dim(), shape);
            assert_relative_eq!(kernel.sum(), 1.0, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_seeing_centroid() {
        let kernel = seeing_kernel(5.0, Shape2D::new(30, 30)).unwrap();
        let (xbar, ybar) = centroid(&kernel);
        assert_abs_diff_eq!(xbar, 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ybar, 15.0, epsilon = 1e-9);

        let kernel = seeing_kernel(3.0, Shape2D::new(24, 32)).unwrap();
        let (xbar, ybar) = centroid(&kernel);
        assert_abs_diff_eq!(xbar, 16.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ybar, 12.0, epsilon = 1e-6);
    }

    #[test]
    fn test_seeing_rejects_bad_width() {
        assert!(seeing_kernel(0.0, Shape2D::new(10, 10)).is_err());
        assert!(seeing_kernel(-1.0, Shape2D::new(10, 10)).is_err());
        assert!(seeing_kernel(f64::NAN, Shape2D::new(10, 10)).is_err());
        assert!(seeing_kernel(1.0, Shape2D::new(0, 10)).is_err());
    }

    #[test]
    fn test_general_gaussian_centroid_and_peak() {
        let params = GaussianParams {
            x: 18.0,
            y: 13.0,
            rotation: PI / 4.0,
            sigma_x: 5.0,
            sigma_y: 1.0,
            offset: 0.0,
            amplitude: 1e-18,
        };
        let profile = gaussian2d_grid(&params, Shape2D::new(30, 30));
        let (xbar, ybar) = centroid(&profile);
        assert!((xbar - 18.0).abs() < 0.05);
        assert!((ybar - 13.0).abs() < 0.05);
        assert_relative_eq!(
            profile.fold(f64::MIN, |m, &v| m.max(v)),
            1e-18,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_gaussian_rotation_swaps_axes() {
        let wide_x = GaussianParams {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            sigma_x: 4.0,
            sigma_y: 1.0,
            offset: 0.5,
            amplitude: 2.0,
        };
        let wide_y = GaussianParams {
            rotation: PI / 2.0,
            ..wide_x
        };
        assert_relative_eq!(gaussian2d(&wide_x, 3.0, 0.0), gaussian2d(&wide_y, 0.0, 3.0), max_relative = 1e-12);
        assert_relative_eq!(gaussian2d(&wide_x, 0.0, 0.0), 2.5);
    }

    #[test]
    fn test_lsf_columns_sum_to_one() {
        let log_lam = log_lambdas(2048);
        let line_wave = log_lam[1024].exp();
        for fwhm in [0.0, 1e-4, 2.51e-4, 5e-3] {
            for pixel in [true, false] {
                let lsf =
                    line_profile(&log_lam.view(), &[line_wave, 0.9], &LineWidth::Constant(fwhm), pixel).unwrap();
                assert_eq!(lsf.dim(), (2048, 2));
                for column in lsf.columns() {
                    assert!(column.iter().all(|v| v.is_finite()));
                    assert_relative_eq!(column.sum(), 1.0, max_relative = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_zero_width_is_unit_impulse() {
        let log_lam = log_lambdas(100);
        let line_wave = log_lam[37].exp();
        let lsf = line_profile(&log_lam.view(), &[line_wave], &LineWidth::Constant(0.0), false).unwrap();
        for (i, &v) in lsf.column(0).iter().enumerate() {
            let expected = if i == 37 { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(v, expected, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_wide_line_matches_sampled_gaussian() {
        let log_lam = log_lambdas(512);
        let dx = log_lam[1] - log_lam[0];
        let line_wave = log_lam[200].exp() * (0.3 * dx).exp();
        let fwhm = 10.0 * dx * line_wave;
        let lsf = line_profile(&log_lam.view(), &[line_wave], &LineWidth::Constant(fwhm), false).unwrap();

        let sigma = 10.0 * FWHM_TO_SIGMA;
        let norm = 1.0 / ((2.0 * PI).sqrt() * sigma);
        for i in [190, 200, 201, 210, 215] {
            let x = i as f64 - 200.3;
            let expected = norm * (-0.5 * (x / sigma).powi(2)).exp();
            assert_abs_diff_eq!(lsf[[i, 0]], expected, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_width_function_resolved_per_line() {
        let log_lam = log_lambdas(256);
        let waves = [log_lam[60].exp(), log_lam[180].exp()];
        let width = LineWidth::from_fn(|lambda| if lambda < 0.9 { 0.0 } else { 1e-2 });
        let lsf = line_profile(&log_lam.view(), &waves, &width, false).unwrap();
        let peak = |c: usize| lsf.column(c).fold(0.0f64, |m, &v| m.max(v));
        assert_abs_diff_eq!(peak(0), 1.0, epsilon = 1e-10);
        assert!(peak(1) < 0.5);
    }

    #[test]
    fn test_lsf_rejects_bad_input() {
        let log_lam = log_lambdas(64);
        let inside = log_lam[10].exp();
        assert!(line_profile(&log_lam.view(), &[inside], &LineWidth::Constant(-1.0), true).is_err());
        assert!(line_profile(&log_lam.view(), &[10.0], &LineWidth::Constant(1e-3), true).is_err());
        assert!(line_profile(&log_lam.slice(ndarray::s![..1]), &[inside], &LineWidth::Constant(1e-3), true).is_err());
        let reversed = log_lam.slice(ndarray::s![..;-1]).to_owned();
        assert!(line_profile(&reversed.view(), &[inside], &LineWidth::Constant(1e-3), true).is_err());
    }

    #[test]
    fn test_3d_psf() {
        let log_lam = log_lambdas(65);
        let psf = make_3d_psf(3.0, 2e-3, Shape2D::new(16, 20), &log_lam.view()).unwrap();
        assert_eq!(psf.dim(), (65, 16, 20));
        assert_relative_eq!(psf.sum(), 1.0, max_relative = 1e-12);

        // Peak at the middle sample and the spatial centre
        let spectrum = psf.slice(ndarray::s![.., 8, 10]);
        let argmax = spectrum
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0;
        assert_eq!(argmax, 32);
    }
}
