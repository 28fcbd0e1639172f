//! Device driver collaborator
//!
//! The server never touches hardware itself. Reads and writes of variable
//! values go through a [`DeviceDriver`], which a concrete deployment supplies
//! for its physical or simulated plant.

use crate::error::{Result, RipError};
use crate::registry::Registry;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

/// Abstract read/write access to device variables
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Read the current value of a variable
    async fn read(&self, name: &str) -> Result<Value>;

    /// Write a new value to a variable
    async fn write(&self, name: &str, value: Value) -> Result<()>;

    /// Called once per sampling tick before any value is read
    async fn before_sampling(&self) -> Result<()> {
        Ok(())
    }

    /// Called once per sampling tick after the reads end, whether they
    /// succeeded, failed, ran past the period or were cancelled. Runs only
    /// when `before_sampling` succeeded for that tick.
    async fn after_sampling(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory driver used when no hardware is attached.
///
/// `time` reports seconds since the driver was created; every other declared
/// variable holds the last written value, starting from its neutral value.
pub struct SimulatedDriver {
    started: Instant,
    values: RwLock<HashMap<String, Value>>,
}

impl SimulatedDriver {
    /// Create a simulated device exposing every variable of the registry
    pub fn new(registry: &Registry) -> Self {
        let values = registry
            .readables()
            .iter()
            .chain(registry.writables())
            .map(|spec| (spec.name.clone(), spec.initial_value()))
            .collect();

        Self {
            started: Instant::now(),
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl DeviceDriver for SimulatedDriver {
    async fn read(&self, name: &str) -> Result<Value> {
        if name == "time" {
            return Ok(Value::from(self.started.elapsed().as_secs_f64()));
        }

        self.values
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RipError::driver(format!("no simulated value for '{name}'")))
    }

    async fn write(&self, name: &str, value: Value) -> Result<()> {
        let mut values = self.values.write().await;
        match values.get_mut(name) {
            Some(slot) => {
                debug!(variable = %name, value = %value, "Simulated write");
                *slot = value;
                Ok(())
            }
            None => Err(RipError::driver(format!("no simulated value for '{name}'"))),
        }
    }
}
