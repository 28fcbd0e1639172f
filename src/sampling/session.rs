//! Subscription sessions
//!
//! Each subscribing client owns one [`SubscriptionSession`]: a tokio task
//! with its own timer and its own record of the last emitted values. The
//! client side is a [`SubscriptionStream`]; dropping or stopping it cancels
//! the task at once, whatever state it is in.

use super::event::{Sample, SampleEvent};
use super::policy::SamplingPolicy;
use crate::driver::DeviceDriver;
use crate::error::{Result, RipError};
use futures::Stream;
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Events buffered between the sampling task and a slow consumer
const EVENT_BUFFER: usize = 16;

/// Lifecycle of a subscription session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Waiting,
    Sampling,
    Evaluating,
    Emitting,
    Stopped,
}

/// What a session samples and how
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub policy: SamplingPolicy,
    /// Variables reported by every sample, in this order
    pub variables: Vec<String>,
}

/// Counts live sessions
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    active: Arc<AtomicUsize>,
}

impl SessionTracker {
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn enter(&self) -> SessionGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            active: self.active.clone(),
        }
    }
}

struct SessionGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Worker side of a subscription
pub struct SubscriptionSession {
    id: u64,
    config: SessionConfig,
    driver: Arc<dyn DeviceDriver>,
    last_emitted: HashMap<String, Value>,
    last_collected: Option<Vec<Value>>,
    hooks_open: bool,
    start: Instant,
    epoch_base_ms: i64,
    cancel: CancellationToken,
    events: mpsc::Sender<SampleEvent>,
    state: watch::Sender<SessionState>,
    _guard: SessionGuard,
}

impl SubscriptionSession {
    /// Start a session task and return the client side of it.
    ///
    /// The session is cancelled when `parent` is cancelled, when the stream
    /// is stopped, or when the stream is dropped.
    pub fn spawn(
        id: u64,
        config: SessionConfig,
        driver: Arc<dyn DeviceDriver>,
        parent: &CancellationToken,
        tracker: &SessionTracker,
    ) -> SubscriptionStream {
        let cancel = parent.child_token();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let session = Self {
            id,
            config: config.clone(),
            driver,
            last_emitted: HashMap::new(),
            last_collected: None,
            hooks_open: false,
            start: Instant::now(),
            epoch_base_ms: chrono::Utc::now().timestamp_millis(),
            cancel: cancel.clone(),
            events: events_tx,
            state: state_tx,
            _guard: tracker.enter(),
        };

        info!(
            session = id,
            policy = %config.policy.name,
            variables = ?config.variables,
            "Subscription session started"
        );
        tokio::spawn(session.run());

        SubscriptionStream {
            id,
            config,
            events: events_rx,
            state: state_rx,
            cancel,
        }
    }

    async fn run(mut self) {
        let cancel = self.cancel.clone();
        let policy = self.config.policy.clone();
        let mut ticker = interval_at(self.start + policy.first_sampling, policy.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            self.set_state(SessionState::Waiting);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.set_state(SessionState::Sampling);
            let collected = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                collected = self.collect() => Some(collected),
            };
            let Some(collected) = collected else {
                if let Err(e) = self.close_hooks().await {
                    warn!(session = self.id, error = %e, "after_sampling failed on cancellation");
                }
                break;
            };

            let event = match collected {
                Ok(values) => {
                    self.set_state(SessionState::Evaluating);
                    if !policy.should_emit(&self.last_emitted, &self.config.variables, &values) {
                        continue;
                    }
                    for (name, value) in self.config.variables.iter().zip(&values) {
                        self.last_emitted.insert(name.clone(), value.clone());
                    }
                    let (timestamp, elapsed) = self.now();
                    SampleEvent::Sample(Sample {
                        timestamp,
                        elapsed,
                        names: self.config.variables.clone(),
                        values,
                    })
                }
                Err(e) => {
                    warn!(session = self.id, error = %e, "Sampling failed for this tick");
                    let (timestamp, elapsed) = self.now();
                    SampleEvent::Error {
                        timestamp,
                        elapsed,
                        message: e.to_string(),
                    }
                }
            };

            self.set_state(SessionState::Emitting);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = self.events.send(event) => {
                    if sent.is_err() {
                        debug!(session = self.id, "Subscriber went away");
                        break;
                    }
                }
            }
        }

        self.set_state(SessionState::Stopped);
        info!(session = self.id, "Subscription session stopped");
    }

    /// Read every tracked variable between the driver's sampling hooks.
    /// Reads slower than one period are abandoned and the previous values
    /// are reported instead. `after_sampling` runs whenever
    /// `before_sampling` succeeded.
    async fn collect(&mut self) -> Result<Vec<Value>> {
        let period = self.config.policy.period;
        self.driver
            .before_sampling()
            .await
            .map_err(|e| RipError::sampling(e.to_string()))?;
        self.hooks_open = true;

        let reads = timeout(period, read_all(self.driver.as_ref(), &self.config.variables)).await;
        let closed = self.close_hooks().await;

        let values = match reads {
            Ok(Ok(values)) => values,
            Ok(Err(e)) => return Err(RipError::sampling(e.to_string())),
            Err(_) => {
                return match &self.last_collected {
                    Some(previous) => {
                        warn!(session = self.id, "Driver read exceeded the period, reusing previous values");
                        Ok(previous.clone())
                    }
                    None => Err(RipError::timeout(format!(
                        "driver read exceeded the sampling period of {period:?}"
                    ))),
                }
            }
        };
        closed.map_err(|e| RipError::sampling(e.to_string()))?;
        self.last_collected = Some(values.clone());
        Ok(values)
    }

    /// Run `after_sampling` if a tick's `before_sampling` has not been paired yet
    async fn close_hooks(&mut self) -> Result<()> {
        if !self.hooks_open {
            return Ok(());
        }
        self.hooks_open = false;
        self.driver.after_sampling().await
    }

    fn now(&self) -> (i64, std::time::Duration) {
        let elapsed = self.start.elapsed();
        let timestamp = self.epoch_base_ms + elapsed.as_millis() as i64;
        (timestamp, elapsed)
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}

async fn read_all(driver: &dyn DeviceDriver, names: &[String]) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(names.len());
    for name in names {
        values.push(driver.read(name).await?);
    }
    Ok(values)
}

/// Client side of a subscription: a cancellable stream of events
pub struct SubscriptionStream {
    id: u64,
    config: SessionConfig,
    events: mpsc::Receiver<SampleEvent>,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
}

impl SubscriptionStream {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn policy(&self) -> &SamplingPolicy {
        &self.config.policy
    }

    pub fn variables(&self) -> &[String] {
        &self.config.variables
    }

    /// Current state of the sampling task
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the sampling task reaches `Stopped`
    pub async fn stopped(&mut self) {
        // an error means the task is gone, which is stopped as well
        let _ = self
            .state
            .wait_for(|state| *state == SessionState::Stopped)
            .await;
    }

    /// Stop the session; nothing is yielded after this returns
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stream of pre-framed server-sent events
    pub fn framed(self) -> impl Stream<Item = String> + Send + 'static {
        futures::StreamExt::map(self, |event| event.frame())
    }
}

impl Stream for SubscriptionStream {
    type Item = SampleEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.events.poll_recv(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
