//! Per-field tolerances and approximate equality.
//!
//! The table is built once at startup, optionally merged with a TOML
//! override file, and then only read.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance for fields without an explicit entry.
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Built-in maximum absolute differences, keyed by field name.
pub const DEFAULT_TOLERANCES: &[(&str, f64)] = &[
    ("temperature", 0.5),
    ("pressure", 1.0),
    ("humidity", 1.0),
    ("windSpeed", 0.5),
    ("precipitation", 0.1),
    ("deltaPressure1h", 1.0),
    ("deltaPressure3hAvg", 1.0),
    ("deltaTemp1h", 0.5),
    ("rainPrev6h", 0.1),
    ("rainSum24h", 0.1),
    ("windStability3h", 0.05),
    ("waterTempForScoring", 0.2),
    ("confidence", 0.01),
];

/// Tolerance configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read tolerance file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid tolerance file")]
    Parse(#[from] toml::de::Error),

    #[error("tolerance for {field} must be finite and non-negative, got {value}")]
    Invalid { field: String, value: f64 },
}

/// Shape of a tolerance override file.
///
/// ```toml
/// default = 0.1
/// [fields]
/// temperature = 0.3
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToleranceOverrides {
    pub default: Option<f64>,
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
}

/// Maximum allowed absolute difference per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceTable {
    fallback: f64,
    fields: BTreeMap<String, f64>,
}

impl Default for ToleranceTable {
    fn default() -> Self {
        Self {
            fallback: DEFAULT_TOLERANCE,
            fields: DEFAULT_TOLERANCES
                .iter()
                .map(|(name, tol)| (name.to_string(), *tol))
                .collect(),
        }
    }
}

impl ToleranceTable {
    /// Tolerance for `field`, or the fallback when it has no entry.
    pub fn get(&self, field: &str) -> f64 {
        self.fields.get(field).copied().unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> f64 {
        self.fallback
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields.iter().map(|(name, tol)| (name.as_str(), *tol))
    }

    /// Apply overrides on top of this table.
    pub fn with_overrides(mut self, overrides: ToleranceOverrides) -> Result<Self, ConfigError> {
        if let Some(fallback) = overrides.default {
            validate("default", fallback)?;
            self.fallback = fallback;
        }
        for (field, tol) in overrides.fields {
            validate(&field, tol)?;
            self.fields.insert(field, tol);
        }
        Ok(self)
    }

    /// Defaults merged with a TOML override document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let overrides: ToleranceOverrides = toml::from_str(text)?;
        Self::default().with_overrides(overrides)
    }

    /// Defaults merged with a TOML override file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), fallback = table.fallback, "loaded tolerance overrides");
        Ok(table)
    }
}

fn validate(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field: field.to_string(),
            value,
        })
    }
}

/// Compare two optional numbers within `tolerance`.
///
/// Absent equals only absent. Non-finite values skip the subtraction and
/// compare by plain equality, so NaN never matches and equal infinities do.
pub fn approx_equal(a: Option<f64>, b: Option<f64>, tolerance: f64) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) if a.is_finite() && b.is_finite() => (a - b).abs() <= tolerance,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
