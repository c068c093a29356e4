//! Synthesis of 3D model cubes from velocity fields.
//!
//! Cubes are `(n_lambda, rows, cols)` with the wavelength axis first.

use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis, Zip};
use shared::Shape2D;

use crate::error::{ensure_finite, ModelError};
use crate::gaussians::gaussian2d_grid;
use crate::params::{DiskParameters, GaussianParams};
use crate::velocity_field::VelocityFieldBuilder;

/// Speed of light in km/s
pub const SPEED_OF_LIGHT_KMS: f64 = 299_792.458;

/// Natural-log wavelength samples and the rest wavelength of the modelled line.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralAxis {
    log_lambda: Array1<f64>,
    lam0: f64,
}

impl SpectralAxis {
    /// Validate that `log_lambda` is finite and strictly increasing and `lam0` positive.
    pub fn new(log_lambda: Array1<f64>, lam0: f64) -> Result<Self, ModelError> {
        if log_lambda.len() < 2 {
            return Err(ModelError::ShapeMismatch(format!(
                "spectral axis needs at least 2 samples, got {}",
                log_lambda.len()
            )));
        }
        for &l in log_lambda.iter() {
            ensure_finite("log wavelength", l)?;
        }
        if let Some(w) = log_lambda
            .windows(2)
            .into_iter()
            .find(|w| w[1] <= w[0])
        {
            return Err(ModelError::InvalidValue {
                name: "log wavelength (axis must be strictly increasing)",
                value: w[1],
            });
        }
        if !(lam0.is_finite() && lam0 > 0.0) {
            return Err(ModelError::InvalidValue {
                name: "rest wavelength",
                value: lam0,
            });
        }
        Ok(Self { log_lambda, lam0 })
    }

    /// Axis from linear wavelengths.
    pub fn from_wavelengths(lambda: &ArrayView1<f64>, lam0: f64) -> Result<Self, ModelError> {
        Self::new(lambda.mapv(f64::ln), lam0)
    }

    pub fn log_lambda(&self) -> ArrayView1<'_, f64> {
        self.log_lambda.view()
    }

    pub fn lam0(&self) -> f64 {
        self.lam0
    }

    pub fn len(&self) -> usize {
        self.log_lambda.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_lambda.is_empty()
    }

    /// Velocity of each sample relative to `lam0`, `(ln lambda - ln lam0) c` in km/s.
    pub fn velocities(&self) -> Array1<f64> {
        let ln_lam0 = self.lam0.ln();
        self.log_lambda.mapv(|l| (l - ln_lam0) * SPEED_OF_LIGHT_KMS)
    }

    /// Mean velocity step between samples in km/s.
    pub fn velocity_step(&self) -> f64 {
        let n = self.len();
        (self.log_lambda[n - 1] - self.log_lambda[0]) / (n - 1) as f64 * SPEED_OF_LIGHT_KMS
    }
}

/// Extrude a velocity field into a cube of unit-peak Gaussian spectra.
///
/// Spaxel `(i, j)` holds `exp(-(v - field[i, j])^2 / (2 dispersion[i, j]^2))`
/// sampled at the axis velocities `v`.
pub fn make_velocity_cube(
    field: &ArrayView2<f64>,
    dispersion: &ArrayView2<f64>,
    axis: &SpectralAxis,
) -> Result<Array3<f64>, ModelError> {
    if field.dim() != dispersion.dim() {
        return Err(ModelError::ShapeMismatch(format!(
            "velocity field is {:?} but dispersion map is {:?}",
            field.dim(),
            dispersion.dim()
        )));
    }
    for &v in field.iter() {
        ensure_finite("line-of-sight velocity", v)?;
    }
    if let Some(&sigma) = dispersion.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
        return Err(ModelError::InvalidValue {
            name: "velocity dispersion",
            value: sigma,
        });
    }

    let velocities = axis.velocities();
    let (rows, cols) = field.dim();
    let mut cube = Array3::<f64>::zeros((velocities.len(), rows, cols));
    for (mut plane, &v) in cube.axis_iter_mut(Axis(0)).zip(velocities.iter()) {
        Zip::from(&mut plane)
            .and(field)
            .and(dispersion)
            .for_each(|out, &centre, &sigma| {
                let d = (v - centre) / sigma;
                *out = (-0.5 * d * d).exp();
            });
    }
    Ok(cube)
}

/// Gaussian light profile on the `oversample`-times finer grid.
///
/// `params` are given in data pixels; the profile is evaluated at sub-pixel
/// centres, matching the velocity field.
pub fn make_light_profile(
    params: &GaussianParams,
    shape: Shape2D,
    oversample: usize,
) -> Result<Array2<f64>, ModelError> {
    if oversample == 0 {
        return Err(ModelError::InvalidOversample(oversample));
    }
    params.validate()?;
    for (name, value) in [("Amp", params.amplitude), ("OFFSET", params.offset)] {
        if value < 0.0 {
            return Err(ModelError::InvalidValue { name, value });
        }
    }
    Ok(gaussian2d_grid(
        &params.oversampled(oversample),
        shape.scaled(oversample),
    ))
}

/// Velocity cube weighted by the light profile, before instrumental blurring.
///
/// `light_profile` must have the oversampled shape `(k H, k W)`.
pub fn make_deconvolved_model(
    builder: &VelocityFieldBuilder<'_>,
    params: &DiskParameters,
    shape: Shape2D,
    oversample: usize,
    dispersion: f64,
    axis: &SpectralAxis,
    light_profile: &ArrayView2<f64>,
) -> Result<Array3<f64>, ModelError> {
    let expected = shape.scaled(oversample).dim();
    if light_profile.dim() != expected {
        return Err(ModelError::ShapeMismatch(format!(
            "light profile is {:?}, expected {:?} for {} at oversample {}",
            light_profile.dim(),
            expected,
            shape,
            oversample
        )));
    }

    let field = builder.build(params, shape, oversample)?;
    let sigma = Array2::from_elem(field.dim(), dispersion);
    let mut cube = make_velocity_cube(&field.view(), &sigma.view(), axis)?;
    cube *= light_profile;
    Ok(cube)
}

/// Pixels bright enough to take part in the fit.
///
/// True where `light_profile >= fraction_of_peak * max(light_profile)`.
pub fn fit_region_mask(
    light_profile: &ArrayView2<f64>,
    fraction_of_peak: f64,
) -> Result<Array2<bool>, ModelError> {
    if !(0.0..=1.0).contains(&fraction_of_peak) {
        return Err(ModelError::InvalidValue {
            name: "fraction_of_peak",
            value: fraction_of_peak,
        });
    }
    let peak = light_profile.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    if !(peak.is_finite() && peak > 0.0) {
        return Err(ModelError::InvalidValue {
            name: "light profile peak",
            value: peak,
        });
    }
    let threshold = fraction_of_peak * peak;
    Ok(light_profile.mapv(|v| v >= threshold))
}

/// Sum `factor x factor` spatial blocks of a cube.
///
/// Total flux is conserved. Both spatial axes must be multiples of `factor`.
pub fn rebin_spatial(cube: &ArrayView3<f64>, factor: usize) -> Result<Array3<f64>, ModelError> {
    if factor == 0 {
        return Err(ModelError::InvalidOversample(factor));
    }
    let (n, rows, cols) = cube.dim();
    if rows % factor != 0 || cols % factor != 0 {
        return Err(ModelError::ShapeMismatch(format!(
            "cannot rebin {rows}x{cols} spaxels by {factor}"
        )));
    }
    if factor == 1 {
        return Ok(cube.to_owned());
    }

    let mut out = Array3::<f64>::zeros((n, rows / factor, cols / factor));
    for di in 0..factor {
        for dj in 0..factor {
            out += &cube.slice(s![.., di..;factor, dj..;factor]);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn axis(n: usize, lam0: f64) -> SpectralAxis {
        SpectralAxis::new(Array1::linspace(0.78f64.ln(), 0.82f64.ln(), n), lam0).unwrap()
    }

    #[test]
    fn test_axis_validation() {
        assert!(SpectralAxis::new(Array1::from(vec![1.0, 1.0]), 1.0).is_err());
        assert!(SpectralAxis::new(Array1::from(vec![1.0]), 1.0).is_err());
        assert!(SpectralAxis::new(Array1::from(vec![1.0, 2.0]), 0.0).is_err());
        assert!(SpectralAxis::new(Array1::from(vec![1.0, f64::NAN]), 1.0).is_err());

        let from_linear =
            SpectralAxis::from_wavelengths(&Array1::from(vec![0.79, 0.80, 0.81]).view(), 0.8)
                .unwrap();
        assert_relative_eq!(from_linear.log_lambda()[1], 0.8f64.ln());
    }

    #[test]
    fn test_velocities() {
        let ax = axis(101, 0.8);
        let v = ax.velocities();
        assert_relative_eq!(
            v[0],
            (0.78f64.ln() - 0.8f64.ln()) * SPEED_OF_LIGHT_KMS,
            max_relative = 1e-12
        );
        assert_relative_eq!(v[1] - v[0], ax.velocity_step(), max_relative = 1e-9);
    }

    #[test]
    fn test_velocity_cube_peaks_at_field_velocity() {
        let ax = axis(401, 0.8);
        let velocities = ax.velocities();
        let target = 150;
        let field = Array2::from_elem((3, 4), velocities[target]);
        let sigma = Array2::from_elem((3, 4), 60.0);

        let cube = make_velocity_cube(&field.view(), &sigma.view(), &ax).unwrap();
        assert_eq!(cube.dim(), (401, 3, 4));
        for spectrum in cube.lanes(Axis(0)) {
            assert_abs_diff_eq!(spectrum[target], 1.0, epsilon = 1e-12);
            let argmax = spectrum
                .iter()
                .enumerate()
                .fold((0, f64::MIN), |b, (i, &v)| if v > b.1 { (i, v) } else { b })
                .0;
            assert_eq!(argmax, target);
        }
    }

    #[test]
    fn test_velocity_cube_width() {
        let ax = axis(401, 0.8);
        let velocities = ax.velocities();
        let field = Array2::from_elem((1, 1), velocities[200]);
        let sigma = Array2::from_elem((1, 1), 80.0);
        let cube = make_velocity_cube(&field.view(), &sigma.view(), &ax).unwrap();
        let d = (velocities[230] - velocities[200]) / 80.0;
        assert_relative_eq!(cube[[230, 0, 0]], (-0.5 * d * d).exp(), max_relative = 1e-12);
    }

    #[test]
    fn test_velocity_cube_rejects_bad_input() {
        let ax = axis(16, 0.8);
        let field = Array2::zeros((2, 2));
        assert!(make_velocity_cube(&field.view(), &Array2::zeros((2, 2)).view(), &ax).is_err());
        assert!(
            make_velocity_cube(&field.view(), &Array2::from_elem((2, 3), 1.0).view(), &ax)
                .is_err()
        );
        let mut nan_field = Array2::zeros((2, 2));
        nan_field[[0, 1]] = f64::NAN;
        assert!(
            make_velocity_cube(&nan_field.view(), &Array2::from_elem((2, 2), 1.0).view(), &ax)
                .is_err()
        );
    }

    #[test]
    fn test_light_profile_oversampling_conserves_centre() {
        let params = GaussianParams::circular(11.5, 9.5, 2.0);
        let shape = Shape2D::new(20, 24);
        for k in [1, 2, 3] {
            let profile = make_light_profile(&params, shape, k).unwrap();
            assert_eq!(profile.dim(), (20 * k, 24 * k));
            let total = profile.sum();
            let mut xbar = 0.0;
            let mut ybar = 0.0;
            for ((row, col), &v) in profile.indexed_iter() {
                xbar += ((col as f64 + 0.5) / k as f64 - 0.5) * v;
                ybar += ((row as f64 + 0.5) / k as f64 - 0.5) * v;
            }
            assert_abs_diff_eq!(xbar / total, 11.5, epsilon = 1e-9);
            assert_abs_diff_eq!(ybar / total, 9.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_light_profile_rejects_negative() {
        let mut params = GaussianParams::circular(1.0, 1.0, 1.0);
        params.amplitude = -1.0;
        assert!(make_light_profile(&params, Shape2D::new(4, 4), 1).is_err());
        assert!(make_light_profile(&GaussianParams::circular(1.0, 1.0, 1.0), Shape2D::new(4, 4), 0).is_err());
    }

    #[test]
    fn test_deconvolved_model_is_weighted_velocity_cube() {
        let params = DiskParameters::new(30.0, 8.0, 8.0, 0.0, 1.0, 9.0, 50.0).unwrap();
        let shape = Shape2D::new(16, 16);
        let ax = axis(64, 0.8);
        let light = make_light_profile(&GaussianParams::circular(8.0, 8.0, 3.0), shape, 2).unwrap();
        let builder = VelocityFieldBuilder::default();

        let model =
            make_deconvolved_model(&builder, &params, shape, 2, 50.0, &ax, &light.view()).unwrap();
        assert_eq!(model.dim(), (64, 32, 32));

        let field = builder.build(&params, shape, 2).unwrap();
        let sigma = Array2::from_elem(field.dim(), 50.0);
        let plain = make_velocity_cube(&field.view(), &sigma.view(), &ax).unwrap();
        assert_relative_eq!(
            model[[10, 5, 7]],
            plain[[10, 5, 7]] * light[[5, 7]],
            max_relative = 1e-14
        );

        let wrong = Array2::<f64>::ones((16, 16));
        let err = make_deconvolved_model(&builder, &params, shape, 2, 50.0, &ax, &wrong.view())
            .unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch(_)));
    }

    #[test]
    fn test_fit_region_mask() {
        let profile = ndarray::arr2(&[[0.05, 0.2], [1.0, 0.1]]);
        let mask = fit_region_mask(&profile.view(), 0.1).unwrap();
        assert_eq!(mask, ndarray::arr2(&[[false, true], [true, true]]));

        assert!(fit_region_mask(&profile.view(), 0.0).unwrap().iter().all(|&m| m));
        assert!(fit_region_mask(&profile.view(), 1.5).is_err());
        assert!(fit_region_mask(&Array2::zeros((2, 2)).view(), 0.1).is_err());
    }

    #[test]
    fn test_rebin_conserves_flux() {
        let cube = Array3::from_shape_fn((3, 6, 9), |(l, i, j)| (l * 100 + i * 10 + j) as f64);
        let rebinned = rebin_spatial(&cube.view(), 3).unwrap();
        assert_eq!(rebinned.dim(), (3, 2, 3));
        assert_relative_eq!(rebinned.sum(), cube.sum());

        let block: f64 = cube.slice(s![1, 3..6, 6..9]).sum();
        assert_relative_eq!(rebinned[[1, 1, 2]], block);

        assert_eq!(rebin_spatial(&cube.view(), 1).unwrap(), cube);
        assert!(rebin_spatial(&cube.view(), 2).is_err());
        assert!(rebin_spatial(&cube.view(), 0).is_err());
    }
}
