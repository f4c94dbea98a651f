//! Streaming routes: connect, trigger operations, introspection.

use std::convert::Infallible;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use contentmcp_core::{DocumentRequest, ScrapeRequest};
use contentmcp_shared::ContentMcpError;
use contentmcp_stream::{ClientId, ClientInfo, DispatcherStats, OperationKind, StreamEvent};

use crate::error::ApiError;
use crate::{AppState, request_id};

/// `POST {ep}/sse/scrape` body.
#[derive(Debug, Deserialize)]
pub struct ScrapeTrigger {
    #[serde(rename = "clientID", default)]
    pub client_id: String,
    #[serde(flatten)]
    pub request: ScrapeRequest,
}

/// `POST {ep}/sse/document` body.
#[derive(Debug, Deserialize)]
pub struct DocumentTrigger {
    #[serde(rename = "clientID", default)]
    pub client_id: String,
    #[serde(flatten)]
    pub request: DocumentRequest,
}

#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    #[serde(rename = "connectedClients")]
    pub connected_clients: usize,
    pub clients: Vec<ClientInfo>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: DispatcherStats,
    #[serde(rename = "serverVersion")]
    pub server_version: &'static str,
}

fn to_sse(event: &StreamEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default().id(&event.id).event(&event.event).data(data)
}

fn client_id(raw: &str) -> Result<ClientId, ContentMcpError> {
    if raw.trim().is_empty() {
        return Err(ContentMcpError::validation("clientID is required"));
    }
    Ok(ClientId::from(raw))
}

fn accepted(client_id: &ClientId, request_id: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::ACCEPTED,
        Json(json!({"status": "accepted", "clientID": client_id, "requestID": request_id})),
    )
}

/// `GET {ep}/sse`
pub(crate) async fn connect(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let connection = state.dispatcher.register().await?;
    let stream = ReceiverStream::new(connection.events).map(|event| Ok(to_sse(&event)));
    Ok(Sse::new(stream))
}

/// `POST {ep}/sse/scrape`
pub(crate) async fn trigger_scrape(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ScrapeTrigger>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let client = client_id(&body.client_id)?;
    body.request.validate()?;
    let request_id = request_id(&headers);

    let start = json!({"url": body.request.url, "selector": body.request.selector});
    let tools = state.tools.clone();
    let request = body.request;
    state.dispatcher.spawn_operation(
        client.clone(),
        OperationKind::Scrape,
        start,
        async move { tools.scrape(&request).await },
    );

    info!(client_id = %client, %request_id, "scrape triggered");
    Ok(accepted(&client, &request_id))
}

/// `POST {ep}/sse/document`
pub(crate) async fn trigger_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DocumentTrigger>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if !state.tools.has_documents() {
        return Err(ContentMcpError::config("document service is not configured").into());
    }
    let client = client_id(&body.client_id)?;
    body.request.validate()?;
    let request_id = request_id(&headers);

    let start = json!({"path": body.request.path});
    let tools = state.tools.clone();
    let request = body.request;
    let id = request_id.clone();
    state.dispatcher.spawn_operation(
        client.clone(),
        OperationKind::Document,
        start,
        async move { tools.get_document(&request, Some(&id)).await },
    );

    info!(client_id = %client, %request_id, "document triggered");
    Ok(accepted(&client, &request_id))
}

/// `GET {ep}/sse/clients`
pub(crate) async fn clients(State(state): State<AppState>) -> Json<ClientsResponse> {
    let clients = state.dispatcher.clients().await;
    Json(ClientsResponse {
        connected_clients: clients.len(),
        clients,
    })
}

/// `GET {ep}/sse/stats`
pub(crate) async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: state.dispatcher.stats().await,
        server_version: state.version,
    })
}
