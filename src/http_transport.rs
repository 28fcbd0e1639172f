//! HTTP transport for the RIP endpoints
//!
//! - `GET /RIP`: info document, URLs built from the request `Host` header
//! - `GET /RIP/SSE?expId=..&variables=a,b`: sampling stream (`text/event-stream`)
//! - `POST /RIP/POST`: JSON-RPC `get` / `set`
//! - `GET /health`: server status

use crate::error::{Result, RipError};
use crate::metadata::{POST_PATH, SSE_PATH};
use crate::server::{JsonRpcError, MethodRegistry, RipServer, SubscribeRequest};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

/// Path of the info endpoint
pub const INFO_PATH: &str = "/RIP";

/// State shared across all HTTP handlers
#[derive(Clone)]
struct AppState {
    server: Arc<RipServer>,
    methods: Arc<MethodRegistry>,
}

#[derive(Debug, Deserialize)]
struct SseQuery {
    #[serde(rename = "expId")]
    exp_id: Option<String>,
    variables: Option<String>,
    policy: Option<String>,
}

/// HTTP front end of a [`RipServer`]
pub struct HttpTransport {
    state: AppState,
}

impl HttpTransport {
    pub fn new(server: Arc<RipServer>) -> Self {
        let methods = Arc::new(server.rpc_methods());
        Self {
            state: AppState { server, methods },
        }
    }

    /// Router with every RIP endpoint
    pub fn router(&self) -> Router {
        Router::new()
            .route(INFO_PATH, get(info_handler))
            .route(SSE_PATH, get(sse_handler))
            .route(POST_PATH, post(rpc_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        info!("RIP HTTP server listening on {local}");
        info!("Info: http://{local}{INFO_PATH}");
        info!("SSE stream: http://{local}{SSE_PATH}?expId=...");
        info!("JSON-RPC endpoint: http://{local}{POST_PATH}");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn bind_and_serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = self.state.server.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| RipError::config(format!("Failed to bind to {address}: {e}")))?;
        self.serve(listener, shutdown).await
    }
}

impl IntoResponse for RipError {
    fn into_response(self) -> Response {
        let status = match &self {
            RipError::UnknownVariable(_) | RipError::UnknownPolicy(_) | RipError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            RipError::ServerStopped(_) => StatusCode::SERVICE_UNAVAILABLE,
            RipError::Driver(_) | RipError::SamplingFailure(_) | RipError::Timeout(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(JsonRpcError::from(&self))).into_response()
    }
}

async fn info_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let address = headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.server.address());

    match state.server.info(&address).await {
        Ok(rendered) => (
            [(header::CONTENT_TYPE, "application/json")],
            rendered.json.clone(),
        )
            .into_response(),
        Err(e) => {
            warn!(address = %address, error = %e, "Info document unavailable");
            e.into_response()
        }
    }
}

async fn sse_handler(State(state): State<AppState>, Query(query): Query<SseQuery>) -> Response {
    let Some(exp_id) = query.exp_id.filter(|id| !id.is_empty()) else {
        return RipError::invalid_input("expId query parameter is required").into_response();
    };

    let request = SubscribeRequest {
        exp_id: Some(exp_id),
        variables: query.variables.as_deref().map(parse_variable_list),
        policy: query.policy.filter(|policy| !policy.is_empty()),
    };

    let stream = match state.server.subscribe(request) {
        Ok(stream) => stream,
        Err(e) => {
            debug!(error = %e, "Subscription rejected");
            return e.into_response();
        }
    };
    info!(session = stream.id(), variables = ?stream.variables(), "SSE client connected");

    let body = Body::from_stream(stream.framed().map(Ok::<_, Infallible>));
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

async fn rpc_handler(State(state): State<AppState>, body: String) -> Response {
    match state.methods.dispatch_str(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let status = state.server.status();
    let code = if status.running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status)).into_response()
}

/// `a,b` or `["a","b"]`
fn parse_variable_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        if let Ok(names) = serde_json::from_str::<Vec<String>>(raw) {
            return names;
        }
    }
    raw.split(',')
        .map(|name| name.trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
