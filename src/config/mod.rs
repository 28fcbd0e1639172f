//! Server configuration
//!
//! The configuration document is read from TOML or JSON, deserialized into
//! the raw [`schema`] types and then validated into a [`ServerConfig`]. Any
//! inconsistency is reported as [`RipError::Config`] so the server never
//! starts with a half-valid registry.

pub mod schema;

use crate::error::{Result, RipError};
use crate::registry::Registry;
use schema::RawConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Listening address of the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl ServerSection {
    /// `host:port`, the form used in every advertised URL
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Human-facing identity of the server, advertised by `info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    pub name: String,
    pub description: String,
    pub authors: String,
    pub keywords: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            name: "RIP Generic".to_string(),
            description: "Generic RIP Server Implementation.".to_string(),
            authors: String::new(),
            keywords: String::new(),
        }
    }
}

/// Validated server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub identity: ServerIdentity,
    pub registry: Registry,
}

impl ServerConfig {
    /// Load and validate a configuration file; `.toml` files are read as
    /// TOML, anything else as JSON
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RipError::config(format!("Failed to read config {}: {e}", path.display()))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        info!(path = %path.display(), "Loading configuration");
        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// Parse a TOML configuration document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| RipError::config(format!("Failed to parse TOML config: {e}")))?;
        Self::from_raw(raw)
    }

    /// Parse a JSON configuration document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(content)
            .map_err(|e| RipError::config(format!("Failed to parse JSON config: {e}")))?;
        Self::from_raw(raw)
    }

    /// Validate a raw document
    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        let host = raw.server.host.trim().to_string();
        if host.is_empty() {
            return Err(RipError::config("server.host must not be empty"));
        }
        let port = raw.server.port.to_integer("server.port", 1, 65535)? as u16;

        let info = raw.control.info;
        let defaults = ServerIdentity::default();
        let identity = ServerIdentity {
            name: info.name.clone().unwrap_or(defaults.name),
            description: info.description.clone().unwrap_or(defaults.description),
            authors: info.authors.clone().unwrap_or(defaults.authors),
            keywords: info.keywords.clone().unwrap_or(defaults.keywords),
        };

        let registry = Registry::load(&info)?;
        debug!(
            readables = registry.readables().len(),
            writables = registry.writables().len(),
            policies = registry.catalog().len(),
            "Configuration validated"
        );

        Ok(Self {
            server: ServerSection { host, port },
            identity,
            registry,
        })
    }

    /// Replace the listening address, e.g. from command line overrides
    pub fn with_address(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        // An empty document is always valid: built-in identity and readables
        match Self::from_raw(RawConfig::default()) {
            Ok(config) => config,
            Err(e) => unreachable!("default configuration must validate: {e}"),
        }
    }
}
