//! Raw configuration schema
//!
//! These types mirror the configuration document as written on disk. Numeric
//! fields may be written either as numbers or as strings (`"2"`, `"Inf"`),
//! so they are kept as [`RawNumber`] here and converted during validation.

use crate::error::{Result, RipError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A number that may be encoded as a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    /// Parse into a finite or infinite `f64`; NaN is rejected
    pub fn to_f64(&self, field: &str) -> Result<f64> {
        let value = match self {
            RawNumber::Number(n) => *n,
            RawNumber::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                RipError::config(format!("{field}: '{text}' is not a number"))
            })?,
        };

        if value.is_nan() {
            return Err(RipError::config(format!("{field}: NaN is not allowed")));
        }
        Ok(value)
    }

    /// Parse into a non-negative finite `f64`
    pub fn to_non_negative(&self, field: &str) -> Result<f64> {
        let value = self.to_f64(field)?;
        if !value.is_finite() || value < 0.0 {
            return Err(RipError::config(format!(
                "{field}: expected a finite non-negative number, got {value}"
            )));
        }
        Ok(value)
    }

    /// Parse into an integer within `[min, max]`
    pub fn to_integer(&self, field: &str, min: i64, max: i64) -> Result<i64> {
        let value = self.to_f64(field)?;
        if value.fract() != 0.0 || value < min as f64 || value > max as f64 {
            return Err(RipError::config(format!(
                "{field}: expected an integer in [{min}, {max}], got {value}"
            )));
        }
        Ok(value as i64)
    }
}

impl From<f64> for RawNumber {
    fn from(value: f64) -> Self {
        RawNumber::Number(value)
    }
}

impl From<&str> for RawNumber {
    fn from(value: &str) -> Self {
        RawNumber::Text(value.to_string())
    }
}

/// Top-level configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub server: RawServerSection,
    #[serde(default)]
    pub control: RawControlSection,
}

/// `server` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: RawNumber,
}

impl Default for RawServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> RawNumber {
    RawNumber::Number(8080.0)
}

/// `control` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawControlSection {
    #[serde(default)]
    pub info: RawInfoSection,
}

/// `control.info` section: server identity, sampling catalog and variables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawInfoSection {
    pub name: Option<String>,
    pub description: Option<String>,
    pub authors: Option<String>,
    pub keywords: Option<String>,

    /// Name of the catalog entry used when a variable declares no policy
    pub default_sampling: Option<String>,

    #[serde(default)]
    pub sampling_methods: BTreeMap<String, RawSamplingMethod>,

    /// `None` means "not configured" and selects the built-in readables
    pub readables: Option<Vec<RawVariable>>,

    #[serde(default)]
    pub writables: Vec<RawVariable>,
}

/// One entry of `control.info.sampling_methods`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSamplingMethod {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub first_sampling: Option<RawNumber>,
    pub period: Option<RawNumber>,
    pub delta: Option<RawNumber>,
}

/// One readable or writable variable declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawVariable {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub min: Option<RawNumber>,
    pub max: Option<RawNumber>,
    pub precision: Option<RawNumber>,
    pub sampling: Option<RawSamplingOverride>,
}

/// Per-variable `sampling` override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSamplingOverride {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: BTreeMap<String, RawNumber>,
}
