//! Content selector grammar and page metadata extraction.
//!
//! The grammar is deliberately small:
//! - `#x` matches the first element whose `id` attribute is exactly `x`
//! - `.x` matches the first element whose `class` attribute contains `x`
//! - anything else matches the first element with that tag name
//!
//! "First" means depth-first pre-order over the whole document.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use contentmcp_shared::{ContentMcpError, Result};

/// A parsed content selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSelector {
    Id(String),
    Class(String),
    Tag(String),
}

impl ContentSelector {
    pub fn parse(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        let parsed = if let Some(id) = selector.strip_prefix('#') {
            Self::Id(id.to_string())
        } else if let Some(class) = selector.strip_prefix('.') {
            Self::Class(class.to_string())
        } else {
            Self::Tag(selector.to_ascii_lowercase())
        };

        match &parsed {
            Self::Id(v) | Self::Class(v) | Self::Tag(v) if v.is_empty() => Err(
                ContentMcpError::validation(format!("selector '{selector}' is empty")),
            ),
            _ => Ok(parsed),
        }
    }

    pub fn matches(&self, el: &scraper::node::Element) -> bool {
        match self {
            Self::Id(id) => el.attr("id") == Some(id.as_str()),
            Self::Class(class) => el.attr("class").is_some_and(|c| c.contains(class.as_str())),
            Self::Tag(tag) => el.name() == tag,
        }
    }

    /// First matching element in document order.
    pub fn find<'a>(&self, doc: &'a Html) -> Result<ElementRef<'a>> {
        doc.tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| self.matches(el.value()))
            .ok_or_else(|| ContentMcpError::not_found(self.describe()))
    }

    fn describe(&self) -> String {
        match self {
            Self::Id(v) => format!("element with id '{v}'"),
            Self::Class(v) => format!("element with class '{v}'"),
            Self::Tag(v) => format!("element with tag '{v}'"),
        }
    }
}

impl std::fmt::Display for ContentSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(v) => write!(f, "#{v}"),
            Self::Class(v) => write!(f, ".{v}"),
            Self::Tag(v) => f.write_str(v),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Summary metadata read from `<head>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

/// Read `<title>`, `<meta name="description">` and `<meta name="keywords">`.
pub fn extract_metadata(doc: &Html) -> PageMetadata {
    static TITLE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("title").expect("valid selector"));

    let title = doc
        .select(&TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let keywords = meta_content(doc, "keywords")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    PageMetadata {
        title,
        description: meta_content(doc, "description").unwrap_or_default(),
        keywords,
    }
}

/// Content of the first `<meta name=...>` with a non-empty `content`.
fn meta_content(doc: &Html, name: &str) -> Option<String> {
    static META: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("meta[name][content]").expect("valid selector"));

    doc.select(&META)
        .filter(|el| el.value().attr("name") == Some(name))
        .filter_map(|el| el.value().attr("content"))
        .find(|c| !c.is_empty())
        .map(String::from)
}
