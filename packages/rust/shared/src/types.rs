//! Domain and wire types shared across contentmcp crates.
//!
//! JSON field names on [`Document`] and friends are a compatibility surface for
//! deployed consumers and must not change, including the misspelled
//! `breadcrump` field.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// Markdown body text.
pub type Markdown = String;

/// A content-type discriminator as reported by the content server
/// (e.g. `application/x-recipe-category`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MimeType(pub String);

impl MimeType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MimeType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A URI is usable for scraping only when it is non-empty and path-rooted.
pub fn is_valid_uri(uri: &str) -> bool {
    uri.starts_with('/')
}

// ---------------------------------------------------------------------------
// Summaries and documents
// ---------------------------------------------------------------------------

/// Human-facing metadata scraped from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSummary {
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// Short name (from the content tree).
    #[serde(default)]
    pub name: String,
    /// Two or three sentence abstract.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Identity plus summary metadata for one content item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    #[serde(rename = "mimeType", default)]
    pub mime_type: MimeType,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "contentSummary", default)]
    pub content_summary: ContentSummary,
}

impl DocumentSummary {
    /// Replace identity fields with the authoritative content-tree values.
    ///
    /// Scraped title/description/keywords are kept; content-type, id, name and
    /// URL always come from the content server.
    pub fn apply_item(&mut self, item: &Item, base_url: &str) {
        self.mime_type = item.mime_type.clone();
        self.id = item.id.clone();
        self.content_summary.name = item.name.clone();
        self.url = format!("{base_url}{}", item.uri);
    }
}

/// A fully aggregated content document with its navigational context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "documentSummary")]
    pub summary: DocumentSummary,
    /// Full content as Markdown.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub markdown: Markdown,
    /// Ancestors, root first.
    #[serde(rename = "breadcrump", default, skip_serializing_if = "Vec::is_empty")]
    pub breadcrumb: Vec<DocumentSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocumentSummary>,
    #[serde(rename = "prevSiblings", default, skip_serializing_if = "Vec::is_empty")]
    pub prev_siblings: Vec<DocumentSummary>,
    #[serde(rename = "nextSiblings", default, skip_serializing_if = "Vec::is_empty")]
    pub next_siblings: Vec<DocumentSummary>,
}

// ---------------------------------------------------------------------------
// Content tree
// ---------------------------------------------------------------------------

/// One item of the remote content tree, as served by the content server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "URI", default)]
    pub uri: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: MimeType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A resolved content node with its ancestry.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentNode {
    pub item: Item,
    /// Content-type reported for the resolved path.
    pub mime_type: MimeType,
    /// Ancestors, nearest first (`ancestors[0]` is the parent).
    pub ancestors: Vec<Item>,
    /// Raw content data attached by the content server, passed through to renderers.
    pub data: Option<serde_json::Value>,
}

impl ContentNode {
    pub fn parent(&self) -> Option<&Item> {
        self.ancestors.first()
    }
}

/// Ordered children of one node, filtered by content type.
///
/// `index` is authoritative for order; `children` is only a lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildIndex {
    pub parent_id: String,
    pub index: Vec<String>,
    pub children: HashMap<String, Item>,
}

impl ChildIndex {
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.children.get(id)
    }
}
