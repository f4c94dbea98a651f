//! Content-type specific body rendering.
//!
//! Some content types need a different extraction than the site-wide content
//! selector (a recipe card, a product sheet). A [`ContentRenderer`] registered
//! for a content type replaces the document body; the summary is left alone.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use contentmcp_scrape::ScrapeClient;
use contentmcp_shared::{ContentNode, Markdown, MimeType, RendererConfig, Result};

/// Produces the Markdown body for one content node.
#[async_trait]
pub trait ContentRenderer: Send + Sync {
    /// `url` is the absolute page URL of `node`.
    async fn render(&self, node: &ContentNode, url: &str) -> Result<Markdown>;
}

/// Explicit content-type to renderer map. Immutable once the aggregator is built.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: HashMap<MimeType, Arc<dyn ContentRenderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build [`SelectorRenderer`]s for every `[[site.renderers]]` entry.
    pub fn from_config(entries: &[RendererConfig], scraper: Arc<dyn ScrapeClient>) -> Self {
        let mut registry = Self::new();
        for entry in entries {
            registry.register(
                MimeType::new(entry.mime_type.as_str()),
                SelectorRenderer::new(Arc::clone(&scraper), &entry.selector),
            );
        }
        registry
    }

    /// Register `renderer` for `mime_type`, replacing any previous one.
    pub fn register(&mut self, mime_type: MimeType, renderer: impl ContentRenderer + 'static) {
        debug!(%mime_type, "renderer registered");
        self.renderers.insert(mime_type, Arc::new(renderer));
    }

    pub fn get(&self, mime_type: &MimeType) -> Option<&Arc<dyn ContentRenderer>> {
        self.renderers.get(mime_type)
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.renderers.keys()).finish()
    }
}

/// Re-scrapes the page with a content-type specific selector.
pub struct SelectorRenderer {
    scraper: Arc<dyn ScrapeClient>,
    selector: String,
}

impl SelectorRenderer {
    pub fn new(scraper: Arc<dyn ScrapeClient>, selector: &str) -> Self {
        Self {
            scraper,
            selector: selector.to_string(),
        }
    }
}

#[async_trait]
impl ContentRenderer for SelectorRenderer {
    async fn render(&self, _node: &ContentNode, url: &str) -> Result<Markdown> {
        Ok(self.scraper.scrape(url, &self.selector).await?.markdown)
    }
}
