//! Aggregation of model spectra into the observational bin layout.
//!
//! Observed spaxels are grouped into bins before fitting and their spectra
//! summed. The model has to be binned the same way, so this module only ever
//! sums. Averaging would change the comparison with the data.

use std::collections::BTreeMap;

use ndarray::{s, Array2, ArrayView3};
use shared::Shape2D;

use crate::error::ModelError;

/// Assignment of every spaxel of a `height x width` map to a bin.
///
/// Built from three parallel arrays `(x, y, bin_id)` that cover each pixel
/// exactly once. Bins are reported in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinMap {
    shape: Shape2D,
    /// Pixels `(row, col)` of each bin, keyed by bin id
    groups: BTreeMap<i64, Vec<(usize, usize)>>,
}

impl BinMap {
    /// Validate and group a bin assignment for a map of `shape`.
    ///
    /// # Errors
    ///
    /// [`ModelError::ShapeMismatch`] when the arrays differ in length, do not
    /// hold exactly `height * width` entries, or name pixels outside the map;
    /// [`ModelError::DuplicatePixel`] when a pixel is listed twice.
    pub fn new(x: &[usize], y: &[usize], bin_ids: &[i64], shape: Shape2D) -> Result<Self, ModelError> {
        if x.len() != y.len() || x.len() != bin_ids.len() {
            return Err(ModelError::ShapeMismatch(format!(
                "bin map arrays differ in length: x={}, y={}, bins={}",
                x.len(),
                y.len(),
                bin_ids.len()
            )));
        }
        if x.len() != shape.pixel_count() {
            return Err(ModelError::ShapeMismatch(format!(
                "bin map has {} entries but the {} map has {} pixels",
                x.len(),
                shape,
                shape.pixel_count()
            )));
        }

        let mut seen = vec![false; shape.pixel_count()];
        let mut groups: BTreeMap<i64, Vec<(usize, usize)>> = BTreeMap::new();
        for ((&col, &row), &bin) in x.iter().zip(y).zip(bin_ids) {
            if !shape.contains(row, col) {
                return Err(ModelError::ShapeMismatch(format!(
                    "pixel (x={col}, y={row}) lies outside the {shape} map"
                )));
            }
            let flat = row * shape.width + col;
            if seen[flat] {
                return Err(ModelError::DuplicatePixel { x: col, y: row });
            }
            seen[flat] = true;
            groups.entry(bin).or_default().push((row, col));
        }

        Ok(Self { shape, groups })
    }

    /// One bin per pixel, numbered in row-major order.
    pub fn per_pixel(shape: Shape2D) -> Self {
        let groups = (0..shape.height)
            .flat_map(|row| (0..shape.width).map(move |col| (row, col)))
            .enumerate()
            .map(|(id, pixel)| (id as i64, vec![pixel]))
            .collect();
        Self { shape, groups }
    }

    pub fn shape(&self) -> Shape2D {
        self.shape
    }

    /// Number of distinct bins.
    pub fn n_bins(&self) -> usize {
        self.groups.len()
    }

    /// Distinct bin ids in output column order.
    pub fn bin_ids(&self) -> Vec<i64> {
        self.groups.keys().copied().collect()
    }

    /// Pixels `(row, col)` assigned to `bin`.
    pub fn pixels(&self, bin: i64) -> Option<&[(usize, usize)]> {
        self.groups.get(&bin).map(Vec::as_slice)
    }

    /// Sum the spectra of each bin.
    ///
    /// `cube` is `(n_lambda, height, width)`; the result is
    /// `(n_lambda, n_bins)` with columns in ascending bin id.
    pub fn bin_cube(&self, cube: &ArrayView3<f64>) -> Result<Array2<f64>, ModelError> {
        let (n_lambda, rows, cols) = cube.dim();
        if (rows, cols) != self.shape.dim() {
            return Err(ModelError::ShapeMismatch(format!(
                "cube has {}x{} spaxels but the bin map covers {}",
                rows, cols, self.shape
            )));
        }

        let mut spectra = Array2::<f64>::zeros((n_lambda, self.groups.len()));
        for (mut column, pixels) in spectra.columns_mut().into_iter().zip(self.groups.values()) {
            for &(row, col) in pixels {
                column += &cube.slice(s![.., row, col]);
            }
        }
        Ok(spectra)
    }
}

/// Bin `cube` with a bin map given as parallel `(x, y, bin_id)` arrays.
///
/// The map shape is taken from the cube's spatial axes.
pub fn bin_cube(
    x: &[usize],
    y: &[usize],
    bin_ids: &[i64],
    cube: &ArrayView3<f64>,
) -> Result<Array2<f64>, ModelError> {
    let (_, rows, cols) = cube.dim();
    BinMap::new(x, y, bin_ids, Shape2D::new(rows, cols))?.bin_cube(cube)
}
