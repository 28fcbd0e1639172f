//! Periodic sampling and change notification
//!
//! A subscription runs as an independent task that wakes up according to its
//! [`SamplingPolicy`], reads the tracked variables through the device driver,
//! decides whether the reading is worth reporting and pushes it to the
//! subscriber as a framed server-sent event.

pub mod event;
pub mod policy;
pub mod session;

pub use event::{Sample, SampleEvent, ERROR_SENTINEL, EVENT_NAME};
pub use policy::{PolicyKind, SamplingPolicy};
pub use session::{
    SessionConfig, SessionState, SessionTracker, SubscriptionSession, SubscriptionStream,
};
