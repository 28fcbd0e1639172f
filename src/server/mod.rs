//! RIP server facade
//!
//! [`RipServer`] ties the registry, the device driver, the info cache and
//! the subscription sessions together behind the operations exposed to
//! clients: `info`, `get`, `set` and `subscribe`. Transports (JSON-RPC,
//! HTTP) only ever talk to this type.

pub mod models;
pub mod rpc;

pub use models::{ServerStatus, SubscribeRequest};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MethodRegistry, ParamSchema};

use crate::config::{ServerConfig, ServerIdentity, ServerSection};
use crate::driver::DeviceDriver;
use crate::error::{Result, RipError};
use crate::metadata::{InfoCache, RenderedInfo};
use crate::registry::Registry;
use crate::sampling::{SamplingPolicy, SessionConfig, SessionTracker, SubscriptionSession, SubscriptionStream};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A configured RIP server
pub struct RipServer {
    server: ServerSection,
    identity: ServerIdentity,
    registry: Arc<Registry>,
    driver: Arc<dyn DeviceDriver>,
    info_cache: InfoCache,
    running: AtomicBool,
    /// Parent of every session token; replaced on restart
    shutdown: Mutex<CancellationToken>,
    sessions: SessionTracker,
    next_session_id: AtomicU64,
}

impl RipServer {
    /// Create a stopped server
    pub fn new(config: ServerConfig, driver: Arc<dyn DeviceDriver>) -> Self {
        let registry = Arc::new(config.registry);
        let info_cache = InfoCache::new(registry.clone(), config.identity.clone());

        Self {
            server: config.server,
            identity: config.identity,
            registry,
            driver,
            info_cache,
            running: AtomicBool::new(false),
            shutdown: Mutex::new(CancellationToken::new()),
            sessions: SessionTracker::default(),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// Configured `host:port`
    pub fn address(&self) -> String {
        self.server.address()
    }

    pub fn server_section(&self) -> &ServerSection {
        &self.server
    }

    pub fn info_cache(&self) -> &InfoCache {
        &self.info_cache
    }

    /// Allow new subscriptions
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Server already running");
            return;
        }

        let mut shutdown = self.shutdown_token_slot();
        if shutdown.is_cancelled() {
            *shutdown = CancellationToken::new();
        }
        info!(name = %self.identity.name, address = %self.address(), "RIP server started");
    }

    /// Refuse new subscriptions and end every live session
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("Server already stopped");
            return;
        }

        self.shutdown_token_slot().cancel();
        info!(name = %self.identity.name, "RIP server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Live subscription sessions
    pub fn active_sessions(&self) -> usize {
        self.sessions.active()
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            name: self.identity.name.clone(),
            address: self.address(),
            running: self.is_running(),
            active_sessions: self.active_sessions(),
            readables: self.registry.readables().len(),
            writables: self.registry.writables().len(),
        }
    }

    /// Info document for clients reaching the server at `address`
    pub async fn info(&self, address: &str) -> Result<Arc<RenderedInfo>> {
        self.info_cache.get(address).await
    }

    /// Info document for the configured address
    pub async fn default_info(&self) -> Result<Arc<RenderedInfo>> {
        self.info(&self.address()).await
    }

    /// Drop the cached info document of `address`
    pub fn invalidate_info(&self, address: &str) -> bool {
        self.info_cache.invalidate(address)
    }

    /// Current values of `names`, in request order.
    ///
    /// Every name is validated before the driver is touched, so an unknown
    /// name never results in a partial read.
    pub async fn get(&self, exp_id: &str, names: &[String]) -> Result<Vec<Value>> {
        for name in names {
            self.registry.lookup_readable(name)?;
        }
        debug!(exp_id = %exp_id, variables = ?names, "get");

        let mut values = Vec::with_capacity(names.len());
        for name in names {
            values.push(self.driver.read(name).await?);
        }
        Ok(values)
    }

    /// Write `values` to `names`, pairwise and in order.
    ///
    /// Names, arity and value types are validated before the first write.
    pub async fn set(&self, exp_id: &str, names: &[String], values: &[Value]) -> Result<()> {
        if names.len() != values.len() {
            return Err(RipError::invalid_input(format!(
                "{} variables but {} values",
                names.len(),
                values.len()
            )));
        }
        for (name, value) in names.iter().zip(values) {
            self.registry.lookup_writable(name)?.check_value(value)?;
        }
        debug!(exp_id = %exp_id, variables = ?names, "set");

        for (name, value) in names.iter().zip(values) {
            self.driver.write(name, value.clone()).await?;
        }
        Ok(())
    }

    /// Open a new subscription session
    pub fn subscribe(&self, request: SubscribeRequest) -> Result<SubscriptionStream> {
        if !self.is_running() {
            return Err(RipError::server_stopped("subscriptions are not accepted"));
        }

        let config = self.session_config(&request)?;
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        debug!(
            session = id,
            exp_id = ?request.exp_id,
            "Opening subscription"
        );

        let parent = self.shutdown_token_slot().clone();
        Ok(SubscriptionSession::spawn(
            id,
            config,
            self.driver.clone(),
            &parent,
            &self.sessions,
        ))
    }

    /// Resolve the policy and the tracked variables of a subscription
    fn session_config(&self, request: &SubscribeRequest) -> Result<SessionConfig> {
        let requested = match &request.variables {
            Some(names) if !names.is_empty() => {
                let mut unique: Vec<String> = Vec::with_capacity(names.len());
                for name in names {
                    self.registry.lookup_readable(name)?;
                    if !unique.contains(name) {
                        unique.push(name.clone());
                    }
                }
                Some(unique)
            }
            _ => None,
        };

        let policy = match &request.policy {
            Some(name) => self.registry.policy(name)?.clone(),
            None => match &requested {
                Some(names) => self.shared_policy(names),
                None => self.registry.default_policy().clone(),
            },
        };

        let variables = match requested {
            Some(names) => names,
            None => {
                let governed: Vec<String> = self
                    .registry
                    .readables()
                    .iter()
                    .filter(|spec| *self.registry.effective_policy(spec) == policy)
                    .map(|spec| spec.name.clone())
                    .collect();
                if governed.is_empty() {
                    debug!(policy = %policy.name, "No readable bound to policy, reporting all");
                    self.registry.readable_names()
                } else {
                    governed
                }
            }
        };

        Ok(SessionConfig { policy, variables })
    }

    /// Policy shared by every requested variable, else the server default
    fn shared_policy(&self, names: &[String]) -> SamplingPolicy {
        let mut policies = names.iter().filter_map(|name| {
            self.registry
                .lookup_readable(name)
                .ok()
                .map(|spec| self.registry.effective_policy(spec))
        });

        match policies.next() {
            Some(first) if policies.all(|other| other == first) => first.clone(),
            _ => self.registry.default_policy().clone(),
        }
    }

    fn shutdown_token_slot(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.shutdown.lock().unwrap_or_else(|poisoned| {
            warn!("Shutdown token lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// JSON-RPC methods bound to this server: `get` and `set`
    pub fn rpc_methods(self: &Arc<Self>) -> MethodRegistry {
        let mut methods = MethodRegistry::new();

        let server = self.clone();
        methods.register_method(
            "get",
            "Retrieve the value of one or more readable variables",
            vec![
                ParamSchema::new("expId", "string"),
                ParamSchema::new("variables", "[string]"),
            ],
            move |args| {
                let server = server.clone();
                async move {
                    let exp_id = rpc::string_arg(&args, 0, "expId")?;
                    let names = rpc::string_list_arg(&args, 1, "variables")?;
                    let values = server.get(&exp_id, &names).await?;
                    Ok(Value::Array(values))
                }
            },
        );

        let server = self.clone();
        methods.register_method(
            "set",
            "Write the value of one or more writable variables",
            vec![
                ParamSchema::new("expId", "string"),
                ParamSchema::new("variables", "[string]"),
                ParamSchema::new("values", "[mixed]"),
            ],
            move |args| {
                let server = server.clone();
                async move {
                    let exp_id = rpc::string_arg(&args, 0, "expId")?;
                    let names = rpc::string_list_arg(&args, 1, "variables")?;
                    let values = rpc::list_arg(&args, 2, "values")?;
                    server.set(&exp_id, &names, &values).await?;
                    Ok(json!(true))
                }
            },
        );

        methods
    }
}

impl Drop for RipServer {
    fn drop(&mut self) {
        self.shutdown_token_slot().cancel();
    }
}
