//! FFT convolution of model cubes with a PSF/LSF kernel.
//!
//! Convolution is circular: flux leaving one edge of the cube re-enters at
//! the opposite edge. The model cube is padded well beyond the kernel support
//! in practice, so the wrap is harmless, but callers comparing against data
//! near the edges should keep it in mind.
//!
//! The kernel is expected to be centred at index `n/2` (integer division) on
//! every axis, which is where [`crate::gaussians::make_3d_psf`] puts it. The
//! result is rolled back by that amount so a centred unit impulse is an exact
//! identity for both odd and even axis lengths.
//!
//! # Reusing the kernel transform
//!
//! During a fit the PSF is fixed while the disk parameters change, so the
//! kernel transform should be computed once:
//!
//! ```ignore
//! let spectrum = KernelSpectrum::new(&psf.view())?;
//! for params in candidates {
//!     let model = build_model(params)?;
//!     let convolved = convolve3d_with_spectrum(&model.view(), &spectrum)?;
//! }
//! ```

use log::debug;
use ndarray::{Array1, Array3, ArrayView1, ArrayView3, Axis, Slice};
use rustfft::{num_complex::Complex64, FftPlanner};

use crate::error::ModelError;

/// Frequency-domain transform of a 3D kernel.
///
/// Read-only once built, so one instance may be shared between threads that
/// convolve cubes of the same shape.
#[derive(Debug, Clone)]
pub struct KernelSpectrum {
    data: Array3<Complex64>,
}

impl KernelSpectrum {
    /// Forward 3D FFT of `kernel`.
    pub fn new(kernel: &ArrayView3<f64>) -> Result<Self, ModelError> {
        check_not_empty(kernel.dim())?;
        debug!("Computing kernel transform for {:?} cube", kernel.dim());
        let mut data = kernel.mapv(|v| Complex64::new(v, 0.0));
        fft3(&mut data, &mut FftPlanner::new(), false);
        Ok(Self { data })
    }

    /// Shape of the kernel the spectrum was built from.
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Raw transform coefficients.
    pub fn view(&self) -> ArrayView3<'_, Complex64> {
        self.data.view()
    }
}

/// A convolution kernel, either in real space or already transformed.
#[derive(Debug, Clone, Copy)]
pub enum Kernel<'a> {
    /// Kernel samples, transformed on every call
    Spatial(ArrayView3<'a, f64>),
    /// Precomputed transform
    Spectrum(&'a KernelSpectrum),
}

/// Output of [`convolve3d_same`].
#[derive(Debug, Clone)]
pub struct Convolved {
    /// The convolved cube, same shape as the input
    pub cube: Array3<f64>,
    /// Kernel transform, reusable through [`Kernel::Spectrum`]
    pub kernel_spectrum: KernelSpectrum,
    /// Transform of the input cube
    pub cube_spectrum: Array3<Complex64>,
}

/// Convolve `cube` with `kernel`, returning the transforms alongside the result.
pub fn convolve3d_same(cube: &ArrayView3<f64>, kernel: Kernel<'_>) -> Result<Convolved, ModelError> {
    let kernel_spectrum = match kernel {
        Kernel::Spatial(k) => {
            check_shapes(cube.dim(), k.dim())?;
            KernelSpectrum::new(&k)?
        }
        Kernel::Spectrum(s) => s.clone(),
    };
    let (result, cube_spectrum) = convolve_with(cube, &kernel_spectrum)?;
    Ok(Convolved {
        cube: result,
        kernel_spectrum,
        cube_spectrum,
    })
}

/// Convolve `cube` with a precomputed kernel transform.
pub fn convolve3d_with_spectrum(
    cube: &ArrayView3<f64>,
    spectrum: &KernelSpectrum,
) -> Result<Array3<f64>, ModelError> {
    convolve_with(cube, spectrum).map(|(result, _)| result)
}

fn convolve_with(
    cube: &ArrayView3<f64>,
    spectrum: &KernelSpectrum,
) -> Result<(Array3<f64>, Array3<Complex64>), ModelError> {
    check_not_empty(cube.dim())?;
    check_shapes(cube.dim(), spectrum.dim())?;

    let mut planner = FftPlanner::new();
    let mut cube_spectrum = cube.mapv(|v| Complex64::new(v, 0.0));
    fft3(&mut cube_spectrum, &mut planner, false);

    let mut product = &cube_spectrum * &spectrum.data;
    fft3(&mut product, &mut planner, true);

    let scale = 1.0 / cube.len() as f64;
    let mut result = product.mapv(|c| c.re * scale);
    for axis in 0..3 {
        let n = result.len_of(Axis(axis));
        result = roll_back(&result, Axis(axis), n / 2);
    }
    Ok((result, cube_spectrum))
}

/// Frequency-domain transform of a 1D spectral kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSpectrum {
    data: Array1<Complex64>,
}

impl LineSpectrum {
    /// Forward FFT of `kernel`.
    pub fn new(kernel: &ArrayView1<f64>) -> Result<Self, ModelError> {
        if kernel.is_empty() {
            return Err(ModelError::ShapeMismatch(
                "cannot transform an empty kernel".to_string(),
            ));
        }
        let mut buffer: Vec<Complex64> = kernel.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        FftPlanner::new()
            .plan_fft_forward(buffer.len())
            .process(&mut buffer);
        Ok(Self {
            data: Array1::from(buffer),
        })
    }

    /// Length of the kernel the spectrum was built from.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw transform coefficients.
    pub fn view(&self) -> ArrayView1<'_, Complex64> {
        self.data.view()
    }
}

/// A 1D kernel, either sampled or already transformed.
#[derive(Debug, Clone, Copy)]
pub enum Kernel1d<'a> {
    /// Kernel samples, transformed on every call
    Spatial(ArrayView1<'a, f64>),
    /// Precomputed transform
    Spectrum(&'a LineSpectrum),
}

/// Output of [`convolve1d_same`].
#[derive(Debug, Clone)]
pub struct Convolved1d {
    /// The convolved signal, same length as the input
    pub signal: Array1<f64>,
    /// Kernel transform, reusable through [`Kernel1d::Spectrum`]
    pub kernel_spectrum: LineSpectrum,
    /// Transform of the input signal
    pub signal_spectrum: Array1<Complex64>,
}

/// 1D circular convolution of `signal` with a kernel centred at `n/2`.
///
/// The spectral counterpart of [`convolve3d_same`], with the same centring
/// and the same option to pass a precomputed kernel transform.
pub fn convolve1d_same(
    signal: &ArrayView1<f64>,
    kernel: Kernel1d<'_>,
) -> Result<Convolved1d, ModelError> {
    let n = signal.len();
    if n == 0 {
        return Err(ModelError::ShapeMismatch("cannot convolve an empty spectrum".to_string()));
    }
    let kernel_spectrum = match kernel {
        Kernel1d::Spatial(k) => LineSpectrum::new(&k)?,
        Kernel1d::Spectrum(s) => s.clone(),
    };
    if kernel_spectrum.len() != n {
        return Err(ModelError::ShapeMismatch(format!(
            "spectrum has {} samples but kernel has {}",
            n,
            kernel_spectrum.len()
        )));
    }

    let mut planner = FftPlanner::new();
    let mut buffer: Vec<Complex64> = signal.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut buffer);
    let signal_spectrum = Array1::from(buffer.clone());

    for (s, k) in buffer.iter_mut().zip(kernel_spectrum.data.iter()) {
        *s *= *k;
    }
    planner.plan_fft_inverse(n).process(&mut buffer);

    let scale = 1.0 / n as f64;
    let shift = n / 2;
    Ok(Convolved1d {
        signal: Array1::from_shape_fn(n, |i| buffer[(i + shift) % n].re * scale),
        kernel_spectrum,
        signal_spectrum,
    })
}

// In-place FFT along every axis of a 3D array. Unnormalised in both directions.
fn fft3(data: &mut Array3<Complex64>, planner: &mut FftPlanner<f64>, inverse: bool) {
    for axis in 0..3 {
        let len = data.len_of(Axis(axis));
        if len < 2 {
            continue;
        }
        let fft = if inverse {
            planner.plan_fft_inverse(len)
        } else {
            planner.plan_fft_forward(len)
        };
        let mut buffer = vec![Complex64::new(0.0, 0.0); len];
        for mut lane in data.lanes_mut(Axis(axis)) {
            for (b, v) in buffer.iter_mut().zip(lane.iter()) {
                *b = *v;
            }
            fft.process(&mut buffer);
            for (v, b) in lane.iter_mut().zip(buffer.iter()) {
                *v = *b;
            }
        }
    }
}

// out[i] = input[(i + shift) % n] along `axis`
fn roll_back(input: &Array3<f64>, axis: Axis, shift: usize) -> Array3<f64> {
    let n = input.len_of(axis);
    if shift == 0 || n == 0 {
        return input.clone();
    }
    let mut out = Array3::<f64>::zeros(input.dim());
    out.slice_axis_mut(axis, Slice::from(0..n - shift))
        .assign(&input.slice_axis(axis, Slice::from(shift..n)));
    out.slice_axis_mut(axis, Slice::from(n - shift..n))
        .assign(&input.slice_axis(axis, Slice::from(0..shift)));
    out
}

fn check_not_empty(dim: (usize, usize, usize)) -> Result<(), ModelError> {
    if dim.0 == 0 || dim.1 == 0 || dim.2 == 0 {
        return Err(ModelError::ShapeMismatch(format!(
            "cannot convolve an empty {dim:?} cube"
        )));
    }
    Ok(())
}

fn check_shapes(
    cube: (usize, usize, usize),
    kernel: (usize, usize, usize),
) -> Result<(), ModelError> {
    if cube != kernel {
        return Err(ModelError::ShapeMismatch(format!(
            "cube is {cube:?} but kernel is {kernel:?}"
        )));
    }
    Ok(())
}
