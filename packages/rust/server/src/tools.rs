//! Tool routes over plain JSON.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;

use contentmcp_core::{ToolDescriptor, ToolResult};

use crate::{AppState, request_id};

#[derive(Debug, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// `GET {ep}/tools`
pub(crate) async fn list(State(state): State<AppState>) -> Json<Vec<ToolDescriptor>> {
    Json(state.tools.descriptors())
}

/// `POST {ep}/tools/call`
///
/// Always 200; tool failures are reported in the body with `isError: true`.
pub(crate) async fn call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(call): Json<ToolCall>,
) -> Json<ToolResult> {
    let request_id = request_id(&headers);
    Json(
        state
            .tools
            .call_traced(&call.name, call.arguments, Some(&request_id))
            .await,
    )
}
