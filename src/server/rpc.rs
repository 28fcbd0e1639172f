//! JSON-RPC method registration and dispatch
//!
//! Methods are registered with a name, a description, an ordered parameter
//! schema and an async handler. Requests may pass parameters by position or
//! by name; either way the handler receives them in schema order.

use crate::error::{ErrorCode, Result, RipError};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub const JSONRPC_VERSION: &str = "2.0";

/// Incoming JSON-RPC request
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Absent for notifications
    pub id: Option<Value>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_number(),
            message: message.into(),
            data: None,
        }
    }
}

impl From<&RipError> for JsonRpcError {
    fn from(error: &RipError) -> Self {
        let code = error.to_error_code();
        Self {
            code: code.as_number(),
            message: error.to_string(),
            data: Some(json!({ "category": code.category() })),
        }
    }
}

/// Outgoing JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One declared parameter of a method
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ParamSchema {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

type MethodHandler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

struct RegisteredMethod {
    description: String,
    params: Vec<ParamSchema>,
    handler: MethodHandler,
}

/// Registry of callable JSON-RPC methods
#[derive(Default)]
pub struct MethodRegistry {
    methods: BTreeMap<String, RegisteredMethod>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`; a later registration replaces an
    /// earlier one
    pub fn register_method<F, Fut>(
        &mut self,
        name: &str,
        description: &str,
        params: Vec<ParamSchema>,
        handler: F,
    ) where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let handler: MethodHandler = Arc::new(move |args| handler(args).boxed());
        if self
            .methods
            .insert(
                name.to_string(),
                RegisteredMethod {
                    description: description.to_string(),
                    params,
                    handler,
                },
            )
            .is_some()
        {
            warn!(method = %name, "JSON-RPC method re-registered");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Method listing: name, description and parameter schema
    pub fn describe(&self) -> Value {
        let methods: Map<String, Value> = self
            .methods
            .iter()
            .map(|(name, method)| {
                (
                    name.clone(),
                    json!({ "description": method.description, "params": method.params }),
                )
            })
            .collect();
        Value::Object(methods)
    }

    /// Dispatch a raw request body
    pub async fn dispatch_str(&self, body: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => self.dispatch(value).await,
            Err(e) => Some(JsonRpcResponse::failure(
                Value::Null,
                JsonRpcError::new(ErrorCode::ParseError, format!("Parse error: {e}")),
            )),
        }
    }

    /// Dispatch a parsed request. Notifications (no `id`) yield `None`.
    pub async fn dispatch(&self, request: Value) -> Option<JsonRpcResponse> {
        let raw_id = request.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(request) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    raw_id.unwrap_or(Value::Null),
                    JsonRpcError::new(ErrorCode::InvalidRequest, format!("Invalid request: {e}")),
                ))
            }
        };

        let id = request.id.clone();
        let outcome = self.call(&request).await;
        let id = id?;

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    async fn call(&self, request: &JsonRpcRequest) -> std::result::Result<Value, JsonRpcError> {
        if request.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            return Err(JsonRpcError::new(
                ErrorCode::InvalidRequest,
                "jsonrpc must be \"2.0\"",
            ));
        }

        let method = self.methods.get(&request.method).ok_or_else(|| {
            JsonRpcError::new(
                ErrorCode::MethodNotFound,
                format!("Method not found: {}", request.method),
            )
        })?;

        let args = bind_params(&method.params, &request.params)
            .map_err(|e| JsonRpcError::new(ErrorCode::InvalidParams, e.to_string()))?;

        debug!(method = %request.method, "Dispatching JSON-RPC call");
        (method.handler)(args).await.map_err(|e| {
            debug!(method = %request.method, error = %e, "JSON-RPC call failed");
            JsonRpcError::from(&e)
        })
    }
}

/// Arrange positional or named params in schema order
fn bind_params(schema: &[ParamSchema], params: &Value) -> Result<Vec<Value>> {
    match params {
        Value::Array(args) => {
            if args.len() != schema.len() {
                return Err(RipError::invalid_input(format!(
                    "expected {} params, got {}",
                    schema.len(),
                    args.len()
                )));
            }
            Ok(args.clone())
        }
        Value::Object(named) => schema
            .iter()
            .map(|param| {
                named.get(&param.name).cloned().ok_or_else(|| {
                    RipError::invalid_input(format!("missing param '{}'", param.name))
                })
            })
            .collect(),
        Value::Null if schema.is_empty() => Ok(Vec::new()),
        other => Err(RipError::invalid_input(format!(
            "params must be an array or an object, got {other}"
        ))),
    }
}

/// Extract a string argument
pub fn string_arg(args: &[Value], index: usize, name: &str) -> Result<String> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RipError::invalid_input(format!("'{name}' must be a string")))
}

/// Extract an array-of-strings argument
pub fn string_list_arg(args: &[Value], index: usize, name: &str) -> Result<Vec<String>> {
    let invalid = || RipError::invalid_input(format!("'{name}' must be an array of strings"));
    args.get(index)
        .and_then(Value::as_array)
        .ok_or_else(invalid)?
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

/// Extract an array argument
pub fn list_arg(args: &[Value], index: usize, name: &str) -> Result<Vec<Value>> {
    args.get(index)
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| RipError::invalid_input(format!("'{name}' must be an array")))
}
