//! Variable registry
//!
//! Holds the readable and writable variables declared in the configuration
//! together with the sampling-method catalog. The registry is built once by
//! [`Registry::load`] and is immutable afterwards.

use crate::config::schema::{RawInfoSection, RawVariable};
use crate::error::{Result, RipError};
use crate::sampling::policy::{SamplingPolicy, DEFAULT_POLICY_NAME};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Declared value type of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Float,
    Int,
    String,
    Bool,
}

impl VariableType {
    fn parse(owner: &str, kind: &str) -> Result<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "float" | "double" | "number" | "real" => Ok(Self::Float),
            "int" | "integer" | "long" => Ok(Self::Int),
            "string" | "str" | "text" => Ok(Self::String),
            "bool" | "boolean" => Ok(Self::Bool),
            other => Err(RipError::config(format!(
                "{owner}.type: unsupported variable type '{other}'"
            ))),
        }
    }
}

/// Whether a variable may only be fetched or also modified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Readable,
    Writable,
}

/// One declared server variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableSpec {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: VariableType,
    #[serde(serialize_with = "serialize_bound")]
    pub min: f64,
    #[serde(serialize_with = "serialize_bound")]
    pub max: f64,
    pub precision: u32,
    /// Per-variable policy; `None` means the server-wide default applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingPolicy>,
}

impl VariableSpec {
    /// Check that `value` has the declared type and lies within bounds
    pub fn check_value(&self, value: &Value) -> Result<()> {
        let mismatch = || {
            RipError::invalid_input(format!(
                "{}: expected {:?} value, got {value}",
                self.name, self.kind
            ))
        };

        let number = match self.kind {
            VariableType::String => return value.as_str().map(|_| ()).ok_or_else(mismatch),
            VariableType::Bool => return value.as_bool().map(|_| ()).ok_or_else(mismatch),
            VariableType::Int => {
                let number = value.as_f64().ok_or_else(mismatch)?;
                if number.fract() != 0.0 {
                    return Err(mismatch());
                }
                number
            }
            VariableType::Float => value.as_f64().ok_or_else(mismatch)?,
        };

        if number < self.min || number > self.max {
            return Err(RipError::invalid_input(format!(
                "{}: {number} is outside [{}, {}]",
                self.name, self.min, self.max
            )));
        }
        Ok(())
    }

    /// Neutral starting value for simulated devices
    pub fn initial_value(&self) -> Value {
        match self.kind {
            VariableType::String => Value::String(String::new()),
            VariableType::Bool => Value::Bool(false),
            VariableType::Int | VariableType::Float => {
                let start = if self.min.is_finite() {
                    self.min
                } else if self.max.is_finite() && self.max < 0.0 {
                    self.max
                } else {
                    0.0
                };
                if self.kind == VariableType::Int {
                    let whole = if start.ceil() > self.max {
                        start.floor()
                    } else {
                        start.ceil()
                    };
                    Value::from(whole as i64)
                } else {
                    Value::from(start)
                }
            }
        }
    }
}

fn serialize_bound<S: Serializer>(bound: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if bound.is_infinite() {
        serializer.serialize_str(if *bound > 0.0 { "Inf" } else { "-Inf" })
    } else {
        serializer.serialize_f64(*bound)
    }
}

/// Registry of declared variables and sampling policies
#[derive(Debug, Clone)]
pub struct Registry {
    readables: Vec<VariableSpec>,
    writables: Vec<VariableSpec>,
    catalog: BTreeMap<String, SamplingPolicy>,
    default_policy: SamplingPolicy,
    index: HashMap<String, (Access, usize)>,
}

impl Registry {
    /// Parse and validate the `control.info` section
    pub fn load(info: &RawInfoSection) -> Result<Self> {
        let mut catalog = BTreeMap::new();
        for (name, raw) in &info.sampling_methods {
            catalog.insert(name.clone(), SamplingPolicy::from_raw(name, raw)?);
        }

        let default_policy = match &info.default_sampling {
            Some(name) => catalog.get(name).cloned().ok_or_else(|| {
                RipError::config(format!(
                    "default_sampling '{name}' is not declared in sampling_methods"
                ))
            })?,
            None => catalog
                .get(DEFAULT_POLICY_NAME)
                .or_else(|| catalog.values().next())
                .cloned()
                .unwrap_or_default(),
        };

        let readables = match &info.readables {
            Some(list) => list
                .iter()
                .enumerate()
                .map(|(i, raw)| parse_variable(&format!("readables[{i}]"), raw, &catalog))
                .collect::<Result<Vec<_>>>()?,
            None => vec![default_time_variable()],
        };
        let writables = info
            .writables
            .iter()
            .enumerate()
            .map(|(i, raw)| parse_variable(&format!("writables[{i}]"), raw, &catalog))
            .collect::<Result<Vec<_>>>()?;

        let mut index = HashMap::new();
        let tagged = readables
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec, Access::Readable, i))
            .chain(
                writables
                    .iter()
                    .enumerate()
                    .map(|(i, spec)| (spec, Access::Writable, i)),
            );
        for (spec, access, position) in tagged {
            if index.insert(spec.name.clone(), (access, position)).is_some() {
                return Err(RipError::config(format!(
                    "duplicate variable name '{}'",
                    spec.name
                )));
            }
        }

        debug!(
            default_policy = %default_policy.name,
            "Registry loaded with {} readables and {} writables",
            readables.len(),
            writables.len()
        );

        Ok(Self {
            readables,
            writables,
            catalog,
            default_policy,
            index,
        })
    }

    /// Look up any declared variable
    pub fn lookup(&self, name: &str) -> Result<&VariableSpec> {
        match self.index.get(name) {
            Some((Access::Readable, i)) => Ok(&self.readables[*i]),
            Some((Access::Writable, i)) => Ok(&self.writables[*i]),
            None => Err(RipError::unknown_variable(name)),
        }
    }

    /// Look up a variable that must be readable
    pub fn lookup_readable(&self, name: &str) -> Result<&VariableSpec> {
        match self.index.get(name) {
            Some((Access::Readable, i)) => Ok(&self.readables[*i]),
            _ => Err(RipError::unknown_variable(name)),
        }
    }

    /// Look up a variable that must be writable
    pub fn lookup_writable(&self, name: &str) -> Result<&VariableSpec> {
        match self.index.get(name) {
            Some((Access::Writable, i)) => Ok(&self.writables[*i]),
            _ => Err(RipError::unknown_variable(name)),
        }
    }

    /// Access class of a variable, if declared
    pub fn access(&self, name: &str) -> Option<Access> {
        self.index.get(name).map(|(access, _)| *access)
    }

    pub fn readables(&self) -> &[VariableSpec] {
        &self.readables
    }

    pub fn writables(&self) -> &[VariableSpec] {
        &self.writables
    }

    pub fn readable_names(&self) -> Vec<String> {
        self.readables.iter().map(|spec| spec.name.clone()).collect()
    }

    pub fn writable_names(&self) -> Vec<String> {
        self.writables.iter().map(|spec| spec.name.clone()).collect()
    }

    pub fn catalog(&self) -> &BTreeMap<String, SamplingPolicy> {
        &self.catalog
    }

    /// Look up a catalog policy by name
    pub fn policy(&self, name: &str) -> Result<&SamplingPolicy> {
        self.catalog
            .get(name)
            .ok_or_else(|| RipError::unknown_policy(name))
    }

    /// Server-wide policy for variables without an override
    pub fn default_policy(&self) -> &SamplingPolicy {
        &self.default_policy
    }

    /// Policy that governs a given variable
    pub fn effective_policy<'a>(&'a self, spec: &'a VariableSpec) -> &'a SamplingPolicy {
        spec.sampling.as_ref().unwrap_or(&self.default_policy)
    }
}

fn parse_variable(
    owner: &str,
    raw: &RawVariable,
    catalog: &BTreeMap<String, SamplingPolicy>,
) -> Result<VariableSpec> {
    let name = raw
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| RipError::config(format!("{owner}.name is required")))?
        .to_string();
    let owner = format!("{owner} ({name})");

    let kind = match &raw.kind {
        Some(kind) => VariableType::parse(&owner, kind)?,
        None => VariableType::Float,
    };
    let min = match &raw.min {
        Some(min) => min.to_f64(&format!("{owner}.min"))?,
        None => f64::NEG_INFINITY,
    };
    let max = match &raw.max {
        Some(max) => max.to_f64(&format!("{owner}.max"))?,
        None => f64::INFINITY,
    };
    if min > max {
        return Err(RipError::config(format!(
            "{owner}: min ({min}) is greater than max ({max})"
        )));
    }
    let precision = match &raw.precision {
        Some(precision) => precision.to_integer(&format!("{owner}.precision"), 0, 32)? as u32,
        None => 0,
    };

    let sampling = match &raw.sampling {
        Some(requested) => match catalog.get(&requested.kind) {
            Some(base) => Some(base.with_params(&name, &requested.params)?),
            None => {
                warn!(
                    variable = %name,
                    policy = %requested.kind,
                    "Sampling policy not in catalog, falling back to the server default"
                );
                None
            }
        },
        None => None,
    };

    Ok(VariableSpec {
        name,
        description: raw.description.clone().unwrap_or_default(),
        kind,
        min,
        max,
        precision,
        sampling,
    })
}

fn default_time_variable() -> VariableSpec {
    VariableSpec {
        name: "time".to_string(),
        description: "Server time in seconds".to_string(),
        kind: VariableType::Float,
        min: 0.0,
        max: f64::INFINITY,
        precision: 0,
        sampling: None,
    }
}
