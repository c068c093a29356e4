//! Rotation of 2D coordinates.

use ndarray::{Array, ArrayBase, Data, Dimension, Zip};

use crate::error::ModelError;

/// Rotate the point `(x, y)` counter-clockwise by `theta` radians.
pub fn rotate_coordinates(x: f64, y: f64, theta: f64) -> (f64, f64) {
    let (sin_t, cos_t) = theta.sin_cos();
    (cos_t * x - sin_t * y, sin_t * x + cos_t * y)
}

/// Element-wise [`rotate_coordinates`] over arrays of any (equal) shape.
///
/// The outputs have the same shape as the inputs.
pub fn rotate_coordinate_arrays<S1, S2, D>(
    x: &ArrayBase<S1, D>,
    y: &ArrayBase<S2, D>,
    theta: f64,
) -> Result<(Array<f64, D>, Array<f64, D>), ModelError>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    if x.shape() != y.shape() {
        return Err(ModelError::ShapeMismatch(format!(
            "cannot rotate coordinate arrays of shapes {:?} and {:?}",
            x.shape(),
            y.shape()
        )));
    }
    let (sin_t, cos_t) = theta.sin_cos();
    let xr = Zip::from(x).and(y).map_collect(|&x, &y| cos_t * x - sin_t * y);
    let yr = Zip::from(x).and(y).map_collect(|&x, &y| sin_t * x + cos_t * y);
    Ok((xr, yr))
}
