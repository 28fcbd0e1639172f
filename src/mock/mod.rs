//! Mock implementations for testing
//!
//! [`ScriptedDriver`] plays back a fixed sequence of readings per variable
//! and records every read and write, so tests can assert on cadence and on
//! the absence of partial reads.

use crate::driver::DeviceDriver;
use crate::error::{Result, RipError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted reading: a value or a driver failure message
pub type Reading = std::result::Result<Value, String>;

/// Driver that replays scripted readings.
///
/// Each variable walks through its script one reading per `read`; once the
/// script is exhausted the last reading repeats.
#[derive(Default)]
pub struct ScriptedDriver {
    scripts: Mutex<HashMap<String, (Vec<Reading>, usize)>>,
    reads: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, Value)>>,
    read_delay: Option<Duration>,
}

impl ScriptedDriver {
    /// Create a driver with no scripted variables
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver whose single variable always reads `value`
    pub fn constant(name: &str, value: Value) -> Self {
        Self::new().with_script(name, vec![Ok(value)])
    }

    /// Driver whose single variable replays `readings`
    pub fn sequence(name: &str, readings: Vec<Reading>) -> Self {
        Self::new().with_script(name, readings)
    }

    /// Add a scripted variable
    pub fn with_script(self, name: &str, readings: Vec<Reading>) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(name.to_string(), (readings, 0));
        }
        self
    }

    /// Make every read take `delay`
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Names read so far, in order
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().map(|reads| reads.clone()).unwrap_or_default()
    }

    /// Writes applied so far, in order
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().map(|writes| writes.clone()).unwrap_or_default()
    }

    fn next_reading(&self, name: &str) -> Result<Value> {
        let mut scripts = self
            .scripts
            .lock()
            .map_err(|_| RipError::driver("script lock poisoned"))?;
        let (readings, cursor) = scripts
            .get_mut(name)
            .ok_or_else(|| RipError::driver(format!("no script for '{name}'")))?;

        let reading = readings
            .get(*cursor)
            .or_else(|| readings.last())
            .cloned()
            .ok_or_else(|| RipError::driver(format!("empty script for '{name}'")))?;
        *cursor += 1;

        reading.map_err(RipError::driver)
    }
}

#[async_trait]
impl DeviceDriver for ScriptedDriver {
    async fn read(&self, name: &str) -> Result<Value> {
        if let Ok(mut reads) = self.reads.lock() {
            reads.push(name.to_string());
        }
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.next_reading(name)
    }

    async fn write(&self, name: &str, value: Value) -> Result<()> {
        if let Ok(mut writes) = self.writes.lock() {
            writes.push((name.to_string(), value));
        }
        Ok(())
    }
}
