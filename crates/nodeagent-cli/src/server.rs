//! HTTP surface of the node agent.
//!
//! | Route | Caller | Maps to |
//! |-------|--------|---------|
//! | `GET /node_agent/ping` | agent | [`NodeAgent::ping`] |
//! | `POST /node_agent/handle_rtml` | agent | [`NodeAgent::handle`] |
//! | `POST /node_agent/async_response` | TEA | callback handle bound in the registry |
//!
//! Credentials travel in the `Username` and `Password` headers. A refused
//! login is a 401 carrying the fault text; everything else about
//! `handle_rtml` is answered with an RTML document and a 200.
//!
//! Document bodies are bytes in the encoding their XML declaration names,
//! ISO-8859-1 for everything the node agent writes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use nodeagent_core::{NodeAgent, RequestHeaders};
use nodeagent_rtml::{decode_document, encode_document, RtmlDocument};
use nodeagent_tea::{LocalRegistry, NameRegistry};
use tracing::{error, warn};

use crate::transport::RTML_CONTENT_TYPE;

/// Ping route.
pub const PING_PATH: &str = "/node_agent/ping";

/// Document route.
pub const HANDLE_RTML_PATH: &str = "/node_agent/handle_rtml";

/// Update route used by the TEA.
pub const ASYNC_RESPONSE_PATH: &str = "/node_agent/async_response";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    agent: Arc<NodeAgent>,
    registry: Arc<LocalRegistry>,
    callback_name: String,
}

impl AppState {
    /// Creates the state. Updates are handed to whatever is bound under
    /// `callback_name` in `registry`.
    pub fn new(
        agent: Arc<NodeAgent>,
        registry: Arc<LocalRegistry>,
        callback_name: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            registry,
            callback_name: callback_name.into(),
        }
    }
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(PING_PATH, get(ping))
        .route(HANDLE_RTML_PATH, post(handle_rtml))
        .route(ASYNC_RESPONSE_PATH, post(async_response))
        .with_state(state)
}

/// Converts HTTP headers, dropping values that are not valid text.
pub fn request_headers(headers: &HeaderMap) -> RequestHeaders {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

async fn ping(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match state.agent.ping(&request_headers(&headers)) {
        Ok(reply) => (StatusCode::OK, reply).into_response(),
        Err(err) => (StatusCode::UNAUTHORIZED, err.to_string()).into_response(),
    }
}

async fn handle_rtml(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let input = decode_document(&body);
    match state.agent.handle(&request_headers(&headers), &input).await {
        Ok(xml) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, RTML_CONTENT_TYPE)],
            encode_document(&xml),
        )
            .into_response(),
        Err(err) => (StatusCode::UNAUTHORIZED, err.to_string()).into_response(),
    }
}

async fn async_response(State(state): State<AppState>, body: Bytes) -> Response {
    let document = match RtmlDocument::parse_bytes(&body) {
        Ok(document) => document,
        Err(err) => {
            warn!(error = %err, "unparsable update from TEA");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    let handler = match state.registry.lookup(&state.callback_name).await {
        Ok(binding) => binding.as_response_handler(),
        Err(err) => {
            error!(name = %state.callback_name, error = %err, "callback handle not bound");
            return (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response();
        }
    };
    let Some(handler) = handler else {
        let message = format!("{} is not a callback handle", state.callback_name);
        error!(%message);
        return (StatusCode::SERVICE_UNAVAILABLE, message).into_response();
    };

    match handler.handle_async_response(document).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => (StatusCode::BAD_GATEWAY, err.to_string()).into_response(),
    }
}
