//! Remote Interface Protocol (RIP) server
//!
//! This crate exposes the variables of a laboratory device to remote
//! clients. It provides:
//!
//! - a registry of readable and writable variables loaded from TOML or JSON
//! - a self-describing info document, memoized per server address
//! - JSON-RPC `get` / `set` over the registry
//! - per-client sampling sessions pushed as server-sent events, either
//!   periodically or when a value changes by more than a delta
//!
//! Device access goes through the [`driver::DeviceDriver`] trait; the
//! [`driver::SimulatedDriver`] stands in when no hardware is attached.

// Core modules
pub mod config;
pub mod driver;
pub mod error;
#[cfg(feature = "http-server")]
pub mod http_transport;
pub mod logging;
pub mod metadata;
pub mod registry;
pub mod sampling;
pub mod server;

// Scripted driver for unit tests
#[cfg(test)]
pub(crate) mod mock;

// Re-export main types for convenience
pub use config::ServerConfig;
pub use driver::{DeviceDriver, SimulatedDriver};
pub use error::{RipError, Result};
pub use registry::Registry;
pub use server::{RipServer, SubscribeRequest};
