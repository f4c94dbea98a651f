//! Content-server client: resolve paths to content nodes and list child indices.
//!
//! The content server holds the site tree. We ask it two things:
//! - `getContent`: which item lives at a URI, and what are its ancestors
//! - `getNodes`: the ordered children of a node, filtered by content type
//!
//! Both are JSON `POST`s against `{content_server_url}/{route}` whose replies
//! come wrapped in a `{"reply": ...}` envelope.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use contentmcp_shared::{
    ChildIndex, ContentMcpError, ContentNode, Env, Item, MimeType, Result,
};

/// User-Agent string for content server requests.
const USER_AGENT: &str = concat!("contentmcp/", env!("CARGO_PKG_VERSION"));

const ROUTE_GET_CONTENT: &str = "getContent";
const ROUTE_GET_NODES: &str = "getNodes";

/// Content server status codes carried in `SiteContent.status`.
const STATUS_OK: u16 = 200;
const STATUS_FORBIDDEN: u16 = 403;
const STATUS_NOT_FOUND: u16 = 404;

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Which children to list for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRequest {
    pub id: String,
    #[serde(rename = "mimeTypes")]
    pub mime_types: Vec<MimeType>,
    #[serde(rename = "exposeHiddenNodes")]
    pub expose_hidden_nodes: bool,
}

impl NodeRequest {
    pub fn new(id: impl Into<String>, mime_types: &[MimeType]) -> Self {
        Self {
            id: id.into(),
            mime_types: mime_types.to_vec(),
            expose_hidden_nodes: false,
        }
    }
}

/// Access to the remote content tree.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Resolve `path` to its content node and ancestry.
    async fn get_content(&self, path: &str, env: &Env) -> Result<ContentNode>;

    /// Resolve the ordered child index of each requested node, keyed by the
    /// caller's request name.
    async fn get_nodes(
        &self,
        env: &Env,
        nodes: &BTreeMap<String, NodeRequest>,
    ) -> Result<HashMap<String, ChildIndex>>;

    /// Ordered children of a single node.
    async fn child_index(
        &self,
        env: &Env,
        node_id: &str,
        mime_types: &[MimeType],
    ) -> Result<ChildIndex> {
        let request = BTreeMap::from([(node_id.to_string(), NodeRequest::new(node_id, mime_types))]);
        self.get_nodes(env, &request)
            .await?
            .remove(node_id)
            .ok_or_else(|| ContentMcpError::not_found(format!("node '{node_id}'")))
    }
}

// ---------------------------------------------------------------------------
// Wire model
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ContentRequest<'a> {
    env: &'a Env,
    #[serde(rename = "URI")]
    uri: &'a str,
    nodes: BTreeMap<String, NodeRequest>,
}

#[derive(Serialize)]
struct NodesRequest<'a> {
    env: &'a Env,
    nodes: &'a BTreeMap<String, NodeRequest>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    reply: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SiteContent {
    status: u16,
    #[serde(rename = "mimeType", default)]
    mime_type: MimeType,
    item: Option<Item>,
    #[serde(default)]
    data: Option<serde_json::Value>,
    path: Option<Vec<Item>>,
}

#[derive(Debug, Deserialize)]
struct WireNode {
    item: Option<Item>,
    nodes: Option<HashMap<String, WireNode>>,
    index: Option<Vec<String>>,
}

impl WireNode {
    fn into_child_index(self, parent_id: &str) -> ChildIndex {
        let children = self
            .nodes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(id, node)| node.item.map(|item| (id, item)))
            .collect();
        ChildIndex {
            parent_id: self.item.map(|i| i.id).unwrap_or_else(|| parent_id.to_string()),
            index: self.index.unwrap_or_default(),
            children,
        }
    }
}

fn into_content_node(path: &str, content: SiteContent) -> Result<ContentNode> {
    match content.status {
        STATUS_OK => {}
        STATUS_NOT_FOUND | STATUS_FORBIDDEN => {
            return Err(ContentMcpError::not_found(format!(
                "content for '{path}' (status {})",
                content.status
            )));
        }
        other => {
            return Err(ContentMcpError::upstream(format!(
                "content server returned status {other} for '{path}'"
            )));
        }
    }

    let item = content
        .item
        .ok_or_else(|| ContentMcpError::not_found(format!("item for '{path}'")))?;

    Ok(ContentNode {
        item,
        mime_type: content.mime_type,
        ancestors: content.path.unwrap_or_default(),
        data: content.data,
    })
}

// ---------------------------------------------------------------------------
// HttpContentSource
// ---------------------------------------------------------------------------

/// HTTP transport for the content server.
#[derive(Debug, Clone)]
pub struct HttpContentSource {
    client: Client,
    endpoint: String,
}

impl HttpContentSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ContentMcpError::upstream_with("failed to build HTTP client", e))?;
        Ok(Self::with_client(endpoint, client))
    }

    pub fn with_client(endpoint: &str, client: Client) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    async fn call<B: Serialize + Sync, T: DeserializeOwned>(&self, route: &str, body: &B) -> Result<T> {
        let url = format!("{}/{route}", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ContentMcpError::upstream_with(format!("POST {url}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentMcpError::upstream(format!("POST {url}: HTTP {status}")));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ContentMcpError::upstream_with(format!("POST {url}: invalid reply"), e))?;

        envelope
            .reply
            .ok_or_else(|| ContentMcpError::upstream(format!("POST {url}: empty reply")))
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    #[instrument(skip(self, env), fields(path = %path))]
    async fn get_content(&self, path: &str, env: &Env) -> Result<ContentNode> {
        let request = ContentRequest {
            env,
            uri: path,
            nodes: BTreeMap::new(),
        };
        let content: SiteContent = self.call(ROUTE_GET_CONTENT, &request).await?;
        let node = into_content_node(path, content)?;
        debug!(
            item_id = %node.item.id,
            mime_type = %node.mime_type,
            ancestors = node.ancestors.len(),
            "content resolved"
        );
        Ok(node)
    }

    #[instrument(skip_all, fields(nodes = nodes.len()))]
    async fn get_nodes(
        &self,
        env: &Env,
        nodes: &BTreeMap<String, NodeRequest>,
    ) -> Result<HashMap<String, ChildIndex>> {
        let request = NodesRequest { env, nodes };
        let reply: HashMap<String, WireNode> = self.call(ROUTE_GET_NODES, &request).await?;

        Ok(reply
            .into_iter()
            .map(|(name, node)| {
                let parent_id = nodes.get(&name).map_or(name.as_str(), |r| r.id.as_str()).to_string();
                let index = node.into_child_index(&parent_id);
                (name, index)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> HttpContentSource {
        HttpContentSource::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn env() -> Env {
        Env {
            dimensions: vec!["en".into()],
            groups: vec![],
        }
    }

    #[tokio::test]
    async fn get_content_resolves_item_and_ancestors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getContent"))
            .and(body_partial_json(json!({"URI": "/recipes/italian", "env": {"dimensions": ["en"]}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reply": {
                    "status": 200,
                    "URI": "/recipes/italian",
                    "mimeType": "application/x-category",
                    "item": {"id": "italian", "name": "Italian", "URI": "/recipes/italian", "mimeType": "application/x-category"},
                    "data": {"teaser": "pasta"},
                    "path": [
                        {"id": "recipes", "name": "Recipes", "URI": "/recipes", "mimeType": "text/html"},
                        {"id": "home", "name": "Home", "URI": "/", "mimeType": "text/html"}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let node = source(&server).get_content("/recipes/italian", &env()).await.unwrap();
        assert_eq!(node.item.id, "italian");
        assert_eq!(node.mime_type.as_str(), "application/x-category");
        assert_eq!(node.parent().map(|p| p.id.as_str()), Some("recipes"));
        assert_eq!(node.ancestors.len(), 2);
        assert!(node.data.is_some());
    }

    #[tokio::test]
    async fn get_content_not_found_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reply": {"status": 404, "URI": "/nope", "item": null, "path": null}
            })))
            .mount(&server)
            .await;

        let err = source(&server).get_content("/nope", &env()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn transport_failure_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = source(&server).get_content("/", &env()).await.unwrap_err();
        assert!(matches!(err, ContentMcpError::Upstream { .. }));
    }

    #[tokio::test]
    async fn child_index_keeps_order_and_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getNodes"))
            .and(body_partial_json(json!({
                "nodes": {"recipes": {"id": "recipes", "mimeTypes": ["application/x-category"]}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reply": {
                    "recipes": {
                        "item": {"id": "recipes", "URI": "/recipes"},
                        "index": ["french", "italian", "spanish"],
                        "nodes": {
                            "spanish": {"item": {"id": "spanish", "URI": "/recipes/spanish"}},
                            "french": {"item": {"id": "french", "URI": "/recipes/french"}},
                            "italian": {"item": {"id": "italian", "URI": "/recipes/italian"}}
                        }
                    }
                }
            })))
            .mount(&server)
            .await;

        let index = source(&server)
            .child_index(&env(), "recipes", &["application/x-category".into()])
            .await
            .unwrap();
        assert_eq!(index.parent_id, "recipes");
        assert_eq!(index.index, vec!["french", "italian", "spanish"]);
        assert_eq!(index.get("spanish").map(|i| i.uri.as_str()), Some("/recipes/spanish"));
    }

    #[tokio::test]
    async fn child_index_missing_node_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getNodes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": {}})))
            .mount(&server)
            .await;

        let err = source(&server).child_index(&env(), "recipes", &[]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn missing_reply_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": null})))
            .mount(&server)
            .await;

        let err = source(&server).get_nodes(&env(), &BTreeMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("empty reply"));
    }
}
