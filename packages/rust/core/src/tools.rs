//! Tool surface: `scrape` and `getDocument`.
//!
//! Requests are validated before any downstream call. `call` wraps results
//! in the text-content shape tool hosts expect, with errors reported as
//! `isError: true` rather than as transport failures.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use contentmcp_scrape::ScrapeClient;
use contentmcp_shared::{ContentMcpError, Document, DocumentSummary, Markdown, Result};

use crate::aggregator::DocumentAggregator;

pub const TOOL_SCRAPE: &str = "scrape";
pub const TOOL_GET_DOCUMENT: &str = "getDocument";

// ---------------------------------------------------------------------------
// Requests / responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub selector: String,
}

impl ScrapeRequest {
    pub fn validate(&self) -> Result<()> {
        require("url", &self.url)?;
        require("selector", &self.selector)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequest {
    #[serde(default)]
    pub path: String,
}

impl DocumentRequest {
    pub fn validate(&self) -> Result<()> {
        require("path", &self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeResponse {
    pub summary: DocumentSummary,
    pub markdown: Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentResponse {
    pub document: Document,
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ContentMcpError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Name, description and JSON input schema of one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// Outcome of [`ToolService::call`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    fn text(text: String) -> Self {
        Self {
            content: vec![ToolContent { kind: "text", text }],
            is_error: false,
        }
    }

    fn error(err: &ContentMcpError) -> Self {
        Self {
            content: vec![ToolContent {
                kind: "text",
                text: err.to_string(),
            }],
            is_error: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Validates tool input and routes it to the scrape client or the aggregator.
#[derive(Clone)]
pub struct ToolService {
    scraper: Arc<dyn ScrapeClient>,
    documents: Option<Arc<DocumentAggregator>>,
}

impl ToolService {
    /// `documents` is `None` when no content server is configured.
    pub fn new(scraper: Arc<dyn ScrapeClient>, documents: Option<Arc<DocumentAggregator>>) -> Self {
        Self { scraper, documents }
    }

    pub fn has_documents(&self) -> bool {
        self.documents.is_some()
    }

    #[instrument(skip(self), fields(url = %request.url))]
    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeResponse> {
        request.validate()?;
        let scraped = self.scraper.scrape(&request.url, &request.selector).await?;
        info!(chars = scraped.markdown.len(), "scrape complete");
        Ok(ScrapeResponse {
            summary: scraped.summary,
            markdown: scraped.markdown,
        })
    }

    /// Aggregate a document. `request_id` tags the aggregation span.
    pub async fn get_document(
        &self,
        request: &DocumentRequest,
        request_id: Option<&str>,
    ) -> Result<DocumentResponse> {
        request.validate()?;
        let documents = self
            .documents
            .as_ref()
            .ok_or_else(|| ContentMcpError::config("document service is not configured"))?;

        let document = match request_id {
            Some(id) => documents.get_document_traced(&request.path, id).await?,
            None => documents.get_document(&request.path).await?,
        };
        Ok(DocumentResponse { document })
    }

    /// Descriptors for the registered tools.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut tools = vec![ToolDescriptor {
            name: TOOL_SCRAPE,
            description: "Scrape a web page and return its summary and content as Markdown",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "URL of the page to scrape"},
                    "selector": {
                        "type": "string",
                        "description": "Content selector: #id, .class or a tag name"
                    }
                },
                "required": ["url", "selector"]
            }),
        }];

        if self.has_documents() {
            tools.push(ToolDescriptor {
                name: TOOL_GET_DOCUMENT,
                description: "Get a document with its breadcrumb, siblings and children",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Content path, e.g. /recipes/italian"}
                    },
                    "required": ["path"]
                }),
            });
        }
        tools
    }

    /// Run tool `name` with JSON `arguments`. Never fails; errors become error results.
    pub async fn call(&self, name: &str, arguments: Value) -> ToolResult {
        self.call_traced(name, arguments, None).await
    }

    /// [`call`](Self::call) with a caller-supplied request id for document aggregation.
    #[instrument(skip(self, arguments), fields(tool = %name))]
    pub async fn call_traced(
        &self,
        name: &str,
        arguments: Value,
        request_id: Option<&str>,
    ) -> ToolResult {
        let outcome = match name {
            TOOL_SCRAPE => match parse_args::<ScrapeRequest>(arguments) {
                Ok(request) => self.scrape(&request).await.and_then(|r| to_text(&r)),
                Err(err) => Err(err),
            },
            TOOL_GET_DOCUMENT if self.has_documents() => {
                match parse_args::<DocumentRequest>(arguments) {
                    Ok(request) => self
                        .get_document(&request, request_id)
                        .await
                        .and_then(|r| to_text(&r)),
                    Err(err) => Err(err),
                }
            }
            other => Err(ContentMcpError::not_found(format!("tool '{other}'"))),
        };

        match outcome {
            Ok(text) => ToolResult::text(text),
            Err(err) => {
                warn!(error = %err, "tool call failed");
                ToolResult::error(&err)
            }
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments)
        .map_err(|e| ContentMcpError::validation(format!("invalid arguments: {e}")))
}

fn to_text<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ContentMcpError::Conversion(format!("failed to encode result: {e}")))
}
