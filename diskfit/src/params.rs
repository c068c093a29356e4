//! Typed parameter records for the disk and light-profile models.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ModelError};

/// Below this |sin(theta)| the line-of-sight projection is treated as singular.
pub(crate) const MIN_SIN_INCLINATION: f64 = 1e-6;

/// Parameters of the rotating exponential disk.
///
/// Angles are in degrees at the boundary and converted to radians where used.
/// [`DiskParameters::new`] and the mapping constructors validate their
/// input. The fields are public, so a record assembled by hand or with
/// struct-update syntax skips that check; the model builders re-check the
/// inclination and centre before using them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiskParameters {
    /// Position angle of the projected major axis (degrees)
    #[serde(rename = "PA")]
    pub pa: f64,
    /// Map centre column (data pixels)
    pub xc: f64,
    /// Map centre row (data pixels)
    pub yc: f64,
    /// Systemic velocity offset (km/s)
    pub v0: f64,
    /// log10 of the disk scale radius
    pub log_r0: f64,
    /// log10 of the central surface density
    pub log_s0: f64,
    /// Inclination (degrees); 0 is face-on
    pub theta: f64,
}

impl DiskParameters {
    /// Mapping keys in canonical order; also the layout of [`Self::to_array`].
    pub const KEYS: [&'static str; 7] = ["PA", "xc", "yc", "v0", "log_r0", "log_s0", "theta"];

    /// Build and validate a parameter record.
    pub fn new(
        pa: f64,
        xc: f64,
        yc: f64,
        v0: f64,
        log_r0: f64,
        log_s0: f64,
        theta: f64,
    ) -> Result<Self, ModelError> {
        let params = Self {
            pa: ensure_finite("PA", pa)?,
            xc: ensure_finite("xc", xc)?,
            yc: ensure_finite("yc", yc)?,
            v0: ensure_finite("v0", v0)?,
            log_r0: ensure_finite("log_r0", log_r0)?,
            log_s0: ensure_finite("log_s0", log_s0)?,
            theta: ensure_finite("theta", theta)?,
        };
        if params.theta.to_radians().sin().abs() < MIN_SIN_INCLINATION {
            return Err(ModelError::SingularInclination(theta));
        }
        Ok(params)
    }

    /// Build from a key/value mapping holding exactly [`Self::KEYS`].
    pub fn from_map(map: &BTreeMap<String, f64>) -> Result<Self, ModelError> {
        if let Some(unknown) = map.keys().find(|k| !Self::KEYS.contains(&k.as_str())) {
            return Err(ModelError::UnknownParameter(unknown.clone()));
        }
        let get = |key: &str| {
            map.get(key)
                .copied()
                .ok_or_else(|| ModelError::MissingParameter(key.to_string()))
        };
        Self::new(
            get("PA")?,
            get("xc")?,
            get("yc")?,
            get("v0")?,
            get("log_r0")?,
            get("log_s0")?,
            get("theta")?,
        )
    }

    /// Parse a JSON object holding exactly [`Self::KEYS`].
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let map: BTreeMap<String, f64> =
            serde_json::from_str(json).map_err(|e| ModelError::InvalidConfig(e.to_string()))?;
        Self::from_map(&map)
    }

    /// Build from a flat vector in [`Self::KEYS`] order, as used by optimisers.
    pub fn from_slice(values: &[f64]) -> Result<Self, ModelError> {
        match values {
            &[pa, xc, yc, v0, log_r0, log_s0, theta] => {
                Self::new(pa, xc, yc, v0, log_r0, log_s0, theta)
            }
            _ => Err(ModelError::ShapeMismatch(format!(
                "expected {} disk parameters, got {}",
                Self::KEYS.len(),
                values.len()
            ))),
        }
    }

    /// Flatten into [`Self::KEYS`] order.
    pub fn to_array(&self) -> [f64; 7] {
        [
            self.pa,
            self.xc,
            self.yc,
            self.v0,
            self.log_r0,
            self.log_s0,
            self.theta,
        ]
    }

    /// Key/value mapping with [`Self::KEYS`] as keys.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        Self::KEYS
            .iter()
            .zip(self.to_array())
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Disk scale radius, `10^log_r0`
    pub fn scale_radius(&self) -> f64 {
        10f64.powf(self.log_r0)
    }

    /// Central surface density, `10^log_s0`
    pub fn surface_density(&self) -> f64 {
        10f64.powf(self.log_s0)
    }
}

impl<'de> Deserialize<'de> for DiskParameters {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let map = BTreeMap::<String, f64>::deserialize(deserializer)?;
        Self::from_map(&map).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for DiskParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PA={:.2} xc={:.2} yc={:.2} v0={:.2} log_r0={:.3} log_s0={:.3} theta={:.2}",
            self.pa, self.xc, self.yc, self.v0, self.log_r0, self.log_s0, self.theta
        )
    }
}

/// Parameters of a rotated elliptical Gaussian.
///
/// Centre and widths are in pixels of whatever grid the Gaussian is evaluated
/// on; `rotation` is in radians. Serialised keys follow the short upper-case
/// names used by the light-profile files (`X`, `Y`, `ROTATION`, `XWIDTH`,
/// `YWIDTH`, `OFFSET`, `Amp`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GaussianParams {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "ROTATION")]
    pub rotation: f64,
    #[serde(rename = "XWIDTH")]
    pub sigma_x: f64,
    #[serde(rename = "YWIDTH")]
    pub sigma_y: f64,
    #[serde(rename = "OFFSET")]
    pub offset: f64,
    #[serde(rename = "Amp")]
    pub amplitude: f64,
}

impl GaussianParams {
    /// Unit-amplitude circular Gaussian centred at `(x, y)`.
    pub fn circular(x: f64, y: f64, sigma: f64) -> Self {
        Self {
            x,
            y,
            rotation: 0.0,
            sigma_x: sigma,
            sigma_y: sigma,
            offset: 0.0,
            amplitude: 1.0,
        }
    }

    /// Check that all values are finite and both widths positive.
    pub fn validate(&self) -> Result<(), ModelError> {
        ensure_finite("X", self.x)?;
        ensure_finite("Y", self.y)?;
        ensure_finite("ROTATION", self.rotation)?;
        ensure_finite("OFFSET", self.offset)?;
        ensure_finite("Amp", self.amplitude)?;
        for (name, sigma) in [("XWIDTH", self.sigma_x), ("YWIDTH", self.sigma_y)] {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(ModelError::InvalidValue { name, value: sigma });
            }
        }
        Ok(())
    }

    /// Same Gaussian on a grid `factor` times finer.
    ///
    /// Data pixel `x` maps to sub-pixel `(x + 0.5) * factor - 0.5`, so that
    /// sub-pixel centres of one data pixel average back to its centre.
    pub fn oversampled(&self, factor: usize) -> Self {
        let k = factor as f64;
        Self {
            x: (self.x + 0.5) * k - 0.5,
            y: (self.y + 0.5) * k - 0.5,
            sigma_x: self.sigma_x * k,
            sigma_y: self.sigma_y * k,
            ..*self
        }
    }
}
