//! Sampling policies
//!
//! A policy decides *when* a subscription samples (`first_sampling`, then
//! every `period`) and *whether* a fresh sample is worth reporting. Periodic
//! policies always report; send-on-delta policies only report once a tracked
//! value moved further than `delta` from what was last sent.

use crate::config::schema::{RawNumber, RawSamplingMethod};
use crate::error::{Result, RipError};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::warn;

/// Name of the catalog entry preferred as server-wide default
pub const DEFAULT_POLICY_NAME: &str = "PeriodicSampler";

/// How a policy filters samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolicyKind {
    /// Every tick is reported
    Periodic,
    /// A tick is reported only if some value changed by more than `delta`
    SendOnDelta { delta: f64 },
}

/// A named sampling policy from the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingPolicy {
    pub name: String,
    pub first_sampling: Duration,
    pub period: Duration,
    pub kind: PolicyKind,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self::periodic("Default", Duration::ZERO, Duration::from_secs(1))
    }
}

impl SamplingPolicy {
    /// Create a periodic policy
    pub fn periodic<S: Into<String>>(name: S, first_sampling: Duration, period: Duration) -> Self {
        Self {
            name: name.into(),
            first_sampling,
            period,
            kind: PolicyKind::Periodic,
        }
    }

    /// Create a send-on-delta policy
    pub fn send_on_delta<S: Into<String>>(
        name: S,
        first_sampling: Duration,
        period: Duration,
        delta: f64,
    ) -> Self {
        Self {
            name: name.into(),
            first_sampling,
            period,
            kind: PolicyKind::SendOnDelta { delta },
        }
    }

    /// Build a policy from its catalog declaration.
    ///
    /// The kind is taken from an explicit `type` when present, otherwise a
    /// declared `delta` makes it send-on-delta.
    pub fn from_raw(name: &str, raw: &RawSamplingMethod) -> Result<Self> {
        let field = |key: &str| format!("sampling_methods.{name}.{key}");

        let first_sampling = match &raw.first_sampling {
            Some(value) => value.to_non_negative(&field("first_sampling"))?,
            None => 0.0,
        };
        let period = match &raw.period {
            Some(value) => value.to_non_negative(&field("period"))?,
            None => return Err(RipError::config(format!("{} is required", field("period")))),
        };
        if period <= 0.0 {
            return Err(RipError::config(format!("{} must be > 0", field("period"))));
        }

        let delta = raw
            .delta
            .as_ref()
            .map(|value| value.to_non_negative(&field("delta")))
            .transpose()?;

        let kind = match (raw.kind.as_deref().map(normalize_kind), delta) {
            (Some(KindName::Periodic), None) => PolicyKind::Periodic,
            (Some(KindName::Periodic), Some(_)) => {
                return Err(RipError::config(format!(
                    "{} is not allowed for a periodic policy",
                    field("delta")
                )))
            }
            (Some(KindName::SendOnDelta), delta) => PolicyKind::SendOnDelta {
                delta: delta.unwrap_or(0.0),
            },
            (Some(KindName::Unknown), _) => {
                return Err(RipError::config(format!(
                    "{}: unknown policy type '{}'",
                    field("type"),
                    raw.kind.as_deref().unwrap_or_default()
                )))
            }
            (None, Some(delta)) => PolicyKind::SendOnDelta { delta },
            (None, None) => PolicyKind::Periodic,
        };

        Ok(Self {
            name: name.to_string(),
            first_sampling: Duration::from_secs_f64(first_sampling),
            period: Duration::from_secs_f64(period),
            kind,
        })
    }

    /// Copy of this policy with per-variable parameter overrides applied
    pub fn with_params(&self, owner: &str, params: &BTreeMap<String, RawNumber>) -> Result<Self> {
        let mut policy = self.clone();
        for (key, value) in params {
            let field = format!("{owner}.sampling.params.{key}");
            match key.as_str() {
                "first_sampling" => {
                    policy.first_sampling = Duration::from_secs_f64(value.to_non_negative(&field)?);
                }
                "period" => {
                    let period = value.to_non_negative(&field)?;
                    if period <= 0.0 {
                        return Err(RipError::config(format!("{field} must be > 0")));
                    }
                    policy.period = Duration::from_secs_f64(period);
                }
                "delta" => match policy.kind {
                    PolicyKind::SendOnDelta { .. } => {
                        policy.kind = PolicyKind::SendOnDelta {
                            delta: value.to_non_negative(&field)?,
                        };
                    }
                    PolicyKind::Periodic => {
                        warn!(policy = %policy.name, "{field} ignored: policy is periodic");
                    }
                },
                _ => warn!("{field}: unknown sampling parameter ignored"),
            }
        }
        Ok(policy)
    }

    /// Whether every tick produces an event
    pub fn is_always_periodic(&self) -> bool {
        matches!(self.kind, PolicyKind::Periodic)
    }

    /// Decide whether the values collected this tick should be emitted,
    /// given the values of the last emitted sample
    pub fn should_emit(
        &self,
        last_emitted: &HashMap<String, Value>,
        names: &[String],
        values: &[Value],
    ) -> bool {
        let delta = match self.kind {
            PolicyKind::Periodic => return true,
            PolicyKind::SendOnDelta { delta } => delta,
        };

        names.iter().zip(values).any(|(name, current)| {
            match last_emitted.get(name) {
                Some(previous) => exceeds_delta(previous, current, delta),
                None => true,
            }
        })
    }
}

/// Numeric values compare by absolute difference; anything else changes
/// whenever it is not equal
fn exceeds_delta(previous: &Value, current: &Value, delta: f64) -> bool {
    match (previous.as_f64(), current.as_f64()) {
        (Some(previous), Some(current)) => (current - previous).abs() > delta,
        _ => previous != current,
    }
}

enum KindName {
    Periodic,
    SendOnDelta,
    Unknown,
}

fn normalize_kind(kind: &str) -> KindName {
    match kind.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
        "periodic" | "periodicsampler" => KindName::Periodic,
        "sendondelta" | "periodicsendondelta" | "periodicsod" | "sod" => KindName::SendOnDelta,
        _ => KindName::Unknown,
    }
}

impl Serialize for SamplingPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Params {
            first_sampling: f64,
            period: f64,
            #[serde(skip_serializing_if = "Option::is_none")]
            delta: Option<f64>,
        }

        let params = Params {
            first_sampling: self.first_sampling.as_secs_f64(),
            period: self.period.as_secs_f64(),
            delta: match self.kind {
                PolicyKind::Periodic => None,
                PolicyKind::SendOnDelta { delta } => Some(delta),
            },
        };

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", &self.name)?;
        map.serialize_entry("params", &params)?;
        map.end()
    }
}
