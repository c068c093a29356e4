use shared::algo::LookupError;
use thiserror::Error;

/// Broad classification of a [`ModelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Array lengths or axes are inconsistent with each other.
    ShapeMismatch,
    /// A value is outside the range the physical model is defined on.
    Domain,
    /// Parameter mappings or settings are malformed.
    Configuration,
}

/// Errors produced while building or evaluating a disk model.
///
/// Every error is fatal to the call that raised it. Nothing is retried or
/// replaced by a default inside the model.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Array lengths or axes disagree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Bin map lists the same pixel twice.
    #[error("pixel (x={x}, y={y}) appears more than once in the bin map")]
    DuplicatePixel {
        /// Pixel column.
        x: usize,
        /// Pixel row.
        y: usize,
    },

    /// Oversampling must be an integer of at least one.
    #[error("oversample factor must be a positive integer, got {0}")]
    InvalidOversample(usize),

    /// Inclination where sin(theta) vanishes.
    #[error("inclination {0} deg is singular: the line-of-sight projection divides by sin(theta)")]
    SingularInclination(f64),

    /// Bessel product queried outside its precomputed table.
    #[error("Bessel product table queried outside its domain: {0}")]
    BesselDomain(#[from] LookupError),

    /// Rotation curve produced V^2 < 0.
    #[error("negative V^2 ({value:e}) at radius {radius}")]
    NegativeVelocitySquared {
        /// In-plane radius in pixels.
        radius: f64,
        /// Offending V^2 value.
        value: f64,
    },

    /// Shifting the map centre pulled in pixels from beyond the padded grid.
    #[error(
        "centre shift of ({dy}, {dx}) sub-pixels exceeds the padding margin of {margin} sub-pixels; increase max_centre_shift"
    )]
    CentreShiftExceedsPadding {
        /// Row shift in whole sub-pixels.
        dy: f64,
        /// Column shift in whole sub-pixels.
        dx: f64,
        /// Padding on each side in sub-pixels.
        margin: usize,
    },

    /// A scalar input is non-finite or outside its allowed range.
    #[error("invalid {name}: {value}")]
    InvalidValue {
        /// What the value represents.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// Disk-parameter mapping lacks a required key.
    #[error("missing disk parameter '{0}'")]
    MissingParameter(String),

    /// Disk-parameter mapping contains a key the model does not know.
    #[error("unknown disk parameter '{0}'")]
    UnknownParameter(String),

    /// Settings are malformed or fail validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ModelError {
    /// Classify the error as shape, domain or configuration failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::ShapeMismatch(_) | ModelError::DuplicatePixel { .. } => {
                ErrorKind::ShapeMismatch
            }
            ModelError::InvalidOversample(_)
            | ModelError::SingularInclination(_)
            | ModelError::BesselDomain(_)
            | ModelError::NegativeVelocitySquared { .. }
            | ModelError::CentreShiftExceedsPadding { .. }
            | ModelError::InvalidValue { .. } => ErrorKind::Domain,
            ModelError::MissingParameter(_)
            | ModelError::UnknownParameter(_)
            | ModelError::InvalidConfig(_) => ErrorKind::Configuration,
        }
    }
}

/// Reject non-finite values with a named [`ModelError::InvalidValue`].
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<f64, ModelError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::InvalidValue { name, value })
    }
}
