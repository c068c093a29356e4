//! Grid dimensions and size utilities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Spatial grid dimensions in pixels.
///
/// Stored in `(height, width)` order so that conversions to and from tuples
/// line up with ndarray's `(rows, cols)` indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape2D {
    /// Number of rows (Y axis)
    pub height: usize,
    /// Number of columns (X axis)
    pub width: usize,
}

impl Shape2D {
    /// Create a new Shape2D from `(height, width)`
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Convert to ndarray-style `(rows, cols)` tuple
    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Grid centre as `(x, y)` in pixel-index coordinates, i.e. `(width/2, height/2)`
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Shape after scaling both axes by an integer factor
    pub fn scaled(&self, factor: usize) -> Self {
        Self::new(self.height * factor, self.width * factor)
    }

    /// Shape after adding `margin` pixels on every side
    pub fn padded(&self, margin: usize) -> Self {
        Self::new(self.height + 2 * margin, self.width + 2 * margin)
    }

    /// Check if a `(row, col)` index is within bounds
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.height && col < self.width
    }

    /// True when either axis has zero length
    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }
}

impl From<(usize, usize)> for Shape2D {
    fn from(dim: (usize, usize)) -> Self {
        Self::new(dim.0, dim.1)
    }
}

impl From<Shape2D> for (usize, usize) {
    fn from(shape: Shape2D) -> Self {
        shape.dim()
    }
}

impl fmt::Display for Shape2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}
