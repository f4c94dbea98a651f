//! HTTP surface for contentmcp.
//!
//! All routes live under a configurable prefix (default `/mcp`):
//!
//! - `GET  {ep}/sse`           - open an event stream (`connected` carries the client id)
//! - `POST {ep}/sse/scrape`    - `{clientID, url, selector}`, streams `scrape_*` events
//! - `POST {ep}/sse/document`  - `{clientID, path}`, streams `document_*` events
//! - `GET  {ep}/sse/clients`   - connected clients
//! - `GET  {ep}/sse/stats`     - dispatcher counters and server version
//! - `GET  {ep}/tools`         - tool descriptors
//! - `POST {ep}/tools/call`    - `{name, arguments}`, runs a tool synchronously

pub mod error;
pub mod sse;
pub mod tools;

use std::net::SocketAddr;

use axum::Router;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use contentmcp_core::ToolService;
use contentmcp_shared::{ContentMcpError, Result};
use contentmcp_stream::{Dispatcher, StreamEvent};

pub use error::ApiError;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub tools: ToolService,
    pub dispatcher: Dispatcher,
    pub version: &'static str,
}

/// Caller-supplied `X-Request-ID`, or a fresh UUID v7.
pub(crate) fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string())
}

/// Build the router with every route nested under `endpoint`.
pub fn router(state: AppState, endpoint: &str) -> Router {
    let routes = Router::new()
        .route("/sse", get(sse::connect))
        .route("/sse/scrape", post(sse::trigger_scrape))
        .route("/sse/document", post(sse::trigger_document))
        .route("/sse/clients", get(sse::clients))
        .route("/sse/stats", get(sse::stats))
        .route("/tools", get(tools::list))
        .route("/tools/call", post(tools::call))
        .with_state(state);

    let endpoint = endpoint.trim_end_matches('/');
    let app = if endpoint.is_empty() {
        routes
    } else {
        Router::new().nest(endpoint, routes)
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.layer(TraceLayer::new_for_http()).layer(cors)
}

/// Bind `0.0.0.0:port` and serve until Ctrl-C.
///
/// On shutdown every connected client is sent a `server_shutdown` event and
/// disconnected so open streams do not hold the server up.
pub async fn serve(state: AppState, port: u16, endpoint: &str) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ContentMcpError::config(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, endpoint, documents = state.tools.has_documents(), "server listening");

    let dispatcher = state.dispatcher.clone();
    axum::serve(listener, router(state, endpoint))
        .with_graceful_shutdown(shutdown_signal(dispatcher))
        .await
        .map_err(|e| ContentMcpError::config(format!("server error: {e}")))?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal(dispatcher: Dispatcher) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
    dispatcher
        .disconnect_all(StreamEvent::server_shutdown())
        .await;
}
