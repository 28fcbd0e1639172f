//! Request and status models of the server facade

use serde::{Deserialize, Serialize};

/// Parameters of a new subscription
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Identifier of the client experience; informational only
    #[serde(default, rename = "expId")]
    pub exp_id: Option<String>,
    /// Subset of readables to report; absent means every readable governed
    /// by the active policy
    #[serde(default)]
    pub variables: Option<Vec<String>>,
    /// Catalog policy to use instead of the server default
    #[serde(default)]
    pub policy: Option<String>,
}

impl SubscribeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exp_id<S: Into<String>>(mut self, exp_id: S) -> Self {
        self.exp_id = Some(exp_id.into());
        self
    }

    pub fn with_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_policy<S: Into<String>>(mut self, policy: S) -> Self {
        self.policy = Some(policy.into());
        self
    }
}

/// Snapshot of the server state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub address: String,
    pub running: bool,
    pub active_sessions: usize,
    pub readables: usize,
    pub writables: usize,
}
