//! Device driver double for integration tests
//!
//! Each variable replays a list of steps; a step is a value and how long
//! the read takes. The last step repeats once the list is exhausted.

use async_trait::async_trait;
use rip_server::{DeviceDriver, Result, RipError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Step {
    pub value: Value,
    pub delay: Duration,
}

impl Step {
    pub fn now<V: Into<Value>>(value: V) -> Self {
        Self {
            value: value.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn slow<V: Into<Value>>(value: V, delay: Duration) -> Self {
        Self {
            value: value.into(),
            delay,
        }
    }
}

#[derive(Default)]
pub struct SequenceDriver {
    steps: Mutex<HashMap<String, (Vec<Step>, usize)>>,
    reads: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, Value)>>,
    before_hooks: AtomicUsize,
    after_hooks: AtomicUsize,
}

impl SequenceDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<V: Into<Value>>(self, name: &str, values: Vec<V>) -> Self {
        self.with_steps(name, values.into_iter().map(Step::now).collect())
    }

    pub fn with_steps(self, name: &str, steps: Vec<Step>) -> Self {
        self.steps
            .lock()
            .unwrap()
            .insert(name.to_string(), (steps, 0));
        self
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().unwrap().clone()
    }

    /// `(before_sampling, after_sampling)` call counts
    pub fn hook_calls(&self) -> (usize, usize) {
        (
            self.before_hooks.load(Ordering::SeqCst),
            self.after_hooks.load(Ordering::SeqCst),
        )
    }

    fn next_step(&self, name: &str) -> Option<Step> {
        let mut steps = self.steps.lock().unwrap();
        let (list, cursor) = steps.get_mut(name)?;
        let step = list.get(*cursor).or_else(|| list.last()).cloned();
        *cursor += 1;
        step
    }
}

#[async_trait]
impl DeviceDriver for SequenceDriver {
    async fn read(&self, name: &str) -> Result<Value> {
        self.reads.lock().unwrap().push(name.to_string());
        let step = self
            .next_step(name)
            .ok_or_else(|| RipError::driver(format!("no steps for '{name}'")))?;
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        Ok(step.value)
    }

    async fn write(&self, name: &str, value: Value) -> Result<()> {
        self.writes.lock().unwrap().push((name.to_string(), value));
        Ok(())
    }

    async fn before_sampling(&self) -> Result<()> {
        self.before_hooks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn after_sampling(&self) -> Result<()> {
        self.after_hooks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
