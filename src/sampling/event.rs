//! Samples and their server-push framing

use serde_json::{json, Value};
use std::fmt::Write as _;
use std::time::Duration;

/// Event name carried by every periodic update
pub const EVENT_NAME: &str = "periodiclabdata";

/// Payload reported in place of values when a tick fails
pub const ERROR_SENTINEL: &str = "ERROR";

/// Values collected at one tick.
///
/// `names` and `values` are parallel: `values[i]` belongs to `names[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Wall-clock milliseconds, advanced monotonically within a session
    pub timestamp: i64,
    /// Time since the owning session started
    pub elapsed: Duration,
    pub names: Vec<String>,
    pub values: Vec<Value>,
}

impl Sample {
    /// Value reported for `name`, if it is part of this sample
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(|i| &self.values[i])
    }

    /// JSON body of the event: `{"result": [[names...], [values...]]}`
    pub fn payload(&self) -> Value {
        json!({ "result": [self.names, self.values] })
    }
}

/// One item of a subscription stream
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEvent {
    /// Values worth reporting this tick
    Sample(Sample),
    /// Collection failed this tick; the session keeps running
    Error {
        timestamp: i64,
        elapsed: Duration,
        message: String,
    },
}

impl SampleEvent {
    pub fn timestamp(&self) -> i64 {
        match self {
            SampleEvent::Sample(sample) => sample.timestamp,
            SampleEvent::Error { timestamp, .. } => *timestamp,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            SampleEvent::Sample(sample) => sample.elapsed,
            SampleEvent::Error { elapsed, .. } => *elapsed,
        }
    }

    pub fn as_sample(&self) -> Option<&Sample> {
        match self {
            SampleEvent::Sample(sample) => Some(sample),
            SampleEvent::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SampleEvent::Error { .. })
    }

    /// JSON body of the event
    pub fn payload(&self) -> Value {
        match self {
            SampleEvent::Sample(sample) => sample.payload(),
            SampleEvent::Error { .. } => json!({ "result": ERROR_SENTINEL }),
        }
    }

    /// Server-sent-events framing, terminated by a blank line
    pub fn frame(&self) -> String {
        let mut framed = String::new();
        // writing into a String cannot fail
        let _ = write!(
            framed,
            "event: {EVENT_NAME}\nid: {}\ndata: {}\n\n",
            self.timestamp(),
            self.payload()
        );
        framed
    }
}
