//! Nearest-neighbour resampling of 2D arrays
//!
//! Rigid shifts and rotations of maps whose values must not be blended
//! (velocity fields, label maps). Every output pixel takes the value of the
//! input pixel nearest to its back-projected position, and positions that fall
//! outside the input are resolved by an [`EdgeMode`].

use ndarray::{Array2, ArrayView2};

/// Edge handling modes for samples that fall outside the input array
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeMode {
    /// Uses a constant value for pixels outside image bounds
    Constant(f64),

    /// Reflects the image at the edges (`d c b a | a b c d | d c b a`)
    Reflect,

    /// Wraps around to the other side of the image
    Wrap,

    /// Extends the edge pixels outward (nearest edge value)
    Extend,
}

/// Options for shift and rotate operations
#[derive(Debug, Clone, Copy)]
pub struct ResampleOptions {
    /// Controls how samples outside the input are filled
    pub edge_mode: EdgeMode,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            edge_mode: EdgeMode::Constant(f64::NAN),
        }
    }
}

/// Read `input[[row, col]]`, resolving out-of-range indices with `edge_mode`.
pub fn sample_pixel(input: &ArrayView2<f64>, row: isize, col: isize, edge_mode: EdgeMode) -> f64 {
    let (rows, cols) = input.dim();
    if rows == 0 || cols == 0 {
        return match edge_mode {
            EdgeMode::Constant(value) => value,
            _ => f64::NAN,
        };
    }

    if row >= 0 && row < rows as isize && col >= 0 && col < cols as isize {
        return input[[row as usize, col as usize]];
    }

    match edge_mode {
        EdgeMode::Constant(value) => value,
        EdgeMode::Reflect => {
            input[[reflect_index(row, rows as isize), reflect_index(col, cols as isize)]]
        }
        EdgeMode::Wrap => input[[wrap_index(row, rows as isize), wrap_index(col, cols as isize)]],
        EdgeMode::Extend => input[[
            row.clamp(0, rows as isize - 1) as usize,
            col.clamp(0, cols as isize - 1) as usize,
        ]],
    }
}

// Half-sample symmetric reflection, valid for any distance outside the array
fn reflect_index(idx: isize, size: isize) -> usize {
    let period = 2 * size;
    let m = idx.rem_euclid(period);
    if m < size {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

fn wrap_index(idx: isize, size: isize) -> usize {
    idx.rem_euclid(size) as usize
}

/// Shift an array by `(dy, dx)` pixels using nearest-neighbour sampling.
///
/// Output pixel `(i, j)` takes the input value at `(i - dy, j - dx)` rounded to
/// the nearest pixel, so positive shifts move content towards larger indices.
pub fn shift_nearest(input: &ArrayView2<f64>, shift: (f64, f64), options: ResampleOptions) -> Array2<f64> {
    let (dy, dx) = shift;
    Array2::from_shape_fn(input.dim(), |(i, j)| {
        let src_row = (i as f64 - dy).round() as isize;
        let src_col = (j as f64 - dx).round() as isize;
        sample_pixel(input, src_row, src_col, options.edge_mode)
    })
}

/// Rotate an array about its centre by `angle_deg` using nearest-neighbour sampling.
///
/// The rotation centre is `((rows - 1)/2, (cols - 1)/2)` and the output keeps
/// the input shape. With `x` along columns and `y` along rows, content at
/// offset `(x, y)` from the centre moves to `(x cos a - y sin a, x sin a + y cos a)`.
pub fn rotate_nearest(input: &ArrayView2<f64>, angle_deg: f64, options: ResampleOptions) -> Array2<f64> {
    let (rows, cols) = input.dim();
    let cy = (rows as f64 - 1.0) / 2.0;
    let cx = (cols as f64 - 1.0) / 2.0;
    let (sin_a, cos_a) = angle_deg.to_radians().sin_cos();

    Array2::from_shape_fn((rows, cols), |(i, j)| {
        let x = j as f64 - cx;
        let y = i as f64 - cy;
        // Back-project through the inverse rotation
        let src_x = cos_a * x + sin_a * y + cx;
        let src_y = -sin_a * x + cos_a * y + cy;
        sample_pixel(
            input,
            src_y.round() as isize,
            src_x.round() as isize,
            options.edge_mode,
        )
    })
}
