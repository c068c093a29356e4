//! Tunable settings for model evaluation.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings controlling how a disk model is evaluated.
///
/// Loaded from JSON, e.g.
///
/// ```json
/// { "oversample": 5, "max_centre_shift": 5, "fraction_of_peak": 0.1 }
/// ```
///
/// Missing keys take their defaults; unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelSettings {
    /// Spatial oversampling factor for model evaluation. Higher is more
    /// accurate and quadratically slower.
    pub oversample: usize,
    /// Padding margin in data pixels around the map. Bounds how far `xc`/`yc`
    /// may move the centre away from the middle before the model runs out of
    /// support. Larger is safer but slower.
    pub max_centre_shift: usize,
    /// Pixels whose light-profile value is below this fraction of the peak
    /// are excluded from the fit region.
    pub fraction_of_peak: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            oversample: 5,
            max_centre_shift: 5,
            fraction_of_peak: 0.1,
        }
    }
}

impl ModelSettings {
    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.oversample == 0 {
            return Err(ModelError::InvalidOversample(self.oversample));
        }
        if !(0.0..=1.0).contains(&self.fraction_of_peak) {
            return Err(ModelError::InvalidConfig(format!(
                "fraction_of_peak must lie in [0, 1], got {}",
                self.fraction_of_peak
            )));
        }
        Ok(())
    }

    /// Parse and validate settings from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| ModelError::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ModelError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let settings = ModelSettings::default();
        assert_eq!(settings.oversample, 5);
        assert_eq!(settings.max_centre_shift, 5);
        assert_eq!(settings.fraction_of_peak, 0.1);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = ModelSettings::from_json_str(r#"{ "oversample": 3 }"#).unwrap();
        assert_eq!(settings.oversample, 3);
        assert_eq!(settings.max_centre_shift, 5);
    }

    #[test]
    fn test_fractional_oversample_is_rejected() {
        let err = ModelSettings::from_json_str(r#"{ "oversample": 2.0 }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_zero_oversample_is_rejected() {
        let err = ModelSettings::from_json_str(r#"{ "oversample": 0 }"#).unwrap_err();
        assert!(matches!(err, ModelError::InvalidOversample(0)));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(ModelSettings::from_json_str(r#"{ "oversampel": 2 }"#).is_err());
    }

    #[test]
    fn test_fraction_of_peak_range() {
        assert!(ModelSettings::from_json_str(r#"{ "fraction_of_peak": 1.5 }"#).is_err());
        assert!(ModelSettings::from_json_str(r#"{ "fraction_of_peak": 0.0 }"#).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("diskfit_settings_test.json");
        std::fs::write(&path, r#"{ "oversample": 2, "max_centre_shift": 8 }"#).unwrap();
        let settings = ModelSettings::load_from_file(&path).unwrap();
        assert_eq!(settings.oversample, 2);
        assert_eq!(settings.max_centre_shift, 8);
        std::fs::remove_file(&path).ok();

        assert!(ModelSettings::load_from_file(&path).is_err());
    }
}
