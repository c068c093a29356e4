//! Lookup table with quadratic interpolation for fast function evaluation.
//!
//! This module provides a lookup table that precomputes function values on a
//! grid uniform in `ln(x)` and uses quadratic (second-order) interpolation for
//! intermediate values. Log spacing is what makes functions spanning many
//! decades (special function products, power laws) cheap to tabulate to near
//! machine precision.
//!
//! # Features
//!
//! - Precomputed function values at regular intervals of `ln(x)`
//! - Quadratic interpolation for smooth approximation
//! - Strict domain checking: queries outside the table are errors, never
//!   extrapolated
//!
//! # Example
//!
//! ```
//! use shared::algo::lookup_table::LookupTable;
//!
//! // Tabulate 1/x over six decades with a log-spaced grid
//! let table = LookupTable::new_log(1e-3, 1e3, 10_000, |x| 1.0 / x);
//!
//! let approx_value = table.eval(2.5).unwrap();
//! assert!((approx_value - 0.4).abs() < 1e-9);
//!
//! // Outside the domain is an error
//! assert!(table.eval(1e4).is_err());
//! ```

use thiserror::Error;

/// Error type for lookup table operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    /// Value is outside the domain bounds
    #[error("Value {value} is outside domain bounds ({min}, {max})")]
    OutOfBounds { value: f64, min: f64, max: f64 },
}

/// A lookup table with quadratic interpolation for fast function evaluation.
///
/// The table stores precomputed function values at regular intervals of
/// `ln x` and uses three-point Lagrange interpolation to approximate values
/// between grid points.
#[derive(Debug, Clone)]
pub struct LookupTable {
    /// Domain bounds (min, max) in `x`
    domain: (f64, f64),
    /// `ln` of the first node
    t_min: f64,
    /// Step size between grid points in `ln x`
    dt: f64,
    /// Precomputed function values
    values: Vec<f64>,
}

impl LookupTable {
    /// Create a lookup table with nodes equally spaced in `ln(x)`.
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - `x_min <= 0`
    /// - `x_min >= x_max`
    /// - `n_points < 3`
    pub fn new_log<F>(x_min: f64, x_max: f64, n_points: usize, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        assert!(x_min > 0.0, "Logarithmic spacing requires x_min > 0");
        assert!(x_min < x_max, "x_min must be less than x_max");
        assert!(
            n_points >= 3,
            "Need at least 3 points for quadratic interpolation"
        );

        let (t_min, t_max) = (x_min.ln(), x_max.ln());
        let dt = (t_max - t_min) / (n_points - 1) as f64;

        let values = (0..n_points)
            .map(|i| {
                // Pin the end nodes to the exact bounds so rounding in exp/ln
                // cannot push them outside the function's own domain.
                let x = if i == 0 {
                    x_min
                } else if i == n_points - 1 {
                    x_max
                } else {
                    (t_min + i as f64 * dt).exp()
                };
                f(x)
            })
            .collect();

        Self {
            domain: (x_min, x_max),
            t_min,
            dt,
            values,
        }
    }

    /// Evaluate the function at a given point using quadratic interpolation.
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` - Interpolated function value at x
    /// * `Err(LookupError::OutOfBounds)` - If x is outside the domain (or NaN)
    pub fn eval(&self, x: f64) -> Result<f64, LookupError> {
        if !self.contains(x) {
            return Err(LookupError::OutOfBounds {
                value: x,
                min: self.domain.0,
                max: self.domain.1,
            });
        }

        // Position in grid units
        let s = (x.ln() - self.t_min) / self.dt;
        let n_points = self.values.len();
        let i = (s.floor().max(0.0) as usize).min(n_points - 3);

        // Lagrange basis on nodes i, i+1, i+2 expressed in grid units
        let p = s - i as f64;
        let l0 = 0.5 * (p - 1.0) * (p - 2.0);
        let l1 = -p * (p - 2.0);
        let l2 = 0.5 * p * (p - 1.0);

        Ok(self.values[i] * l0 + self.values[i + 1] * l1 + self.values[i + 2] * l2)
    }

    /// Get the domain bounds of the lookup table.
    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    /// Get the number of points in the lookup table.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Get the step size between grid points in `ln x`.
    pub fn step_size(&self) -> f64 {
        self.dt
    }

    /// Check if a value is within the table's domain.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.domain.0 && x <= self.domain.1
    }
}
