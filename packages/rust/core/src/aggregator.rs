//! Document aggregation: one content node plus its navigational context.
//!
//! For a path the aggregator builds:
//! 1. the node itself (summary + Markdown body, optionally re-rendered by a
//!    content-type hook)
//! 2. the breadcrumb, root first
//! 3. previous and next siblings from the parent's ordered child index
//! 4. the node's own children in index order
//!
//! Phases 1-4 run concurrently and every scrape inside a phase goes through an
//! ordered buffered stream, so output order never depends on completion order.
//! The first failure anywhere drops all in-flight work and is returned as is.

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info, instrument};

use contentmcp_scrape::ScrapeClient;
use contentmcp_shared::{
    ChildIndex, ContentMcpError, ContentNode, Document, DocumentSummary, Item, Markdown, Result,
    SiteSettings, is_valid_uri,
};
use contentmcp_source::ContentSource;

use crate::render::RendererRegistry;

/// Builds [`Document`]s from a content source and a scrape client.
pub struct DocumentAggregator {
    settings: SiteSettings,
    source: Arc<dyn ContentSource>,
    scraper: Arc<dyn ScrapeClient>,
    renderers: RendererRegistry,
}

impl DocumentAggregator {
    pub fn new(
        settings: SiteSettings,
        source: Arc<dyn ContentSource>,
        scraper: Arc<dyn ScrapeClient>,
    ) -> Self {
        Self {
            settings,
            source,
            scraper,
            renderers: RendererRegistry::new(),
        }
    }

    pub fn with_renderers(mut self, renderers: RendererRegistry) -> Self {
        self.renderers = renderers;
        self
    }

    pub fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    /// Aggregate the document at `path` under a fresh request id.
    pub async fn get_document(&self, path: &str) -> Result<Document> {
        let request_id = uuid::Uuid::now_v7().to_string();
        self.get_document_traced(path, &request_id).await
    }

    /// Aggregate the document at `path`, tagging every log line with `request_id`.
    #[instrument(skip(self), fields(path = %path, request_id = %request_id))]
    pub async fn get_document_traced(&self, path: &str, request_id: &str) -> Result<Document> {
        if path.is_empty() {
            return Err(ContentMcpError::validation("path is required"));
        }

        let node = self.source.get_content(path, &self.settings.env).await?;
        debug!(item_id = %node.item.id, mime_type = %node.mime_type, "content node resolved");

        let (breadcrumb, (summary, markdown), (prev_siblings, next_siblings), children) = tokio::try_join!(
            self.breadcrumb(&node),
            self.current(&node, path),
            self.siblings(&node),
            self.children(&node),
        )?;

        info!(
            breadcrumb = breadcrumb.len(),
            prev_siblings = prev_siblings.len(),
            next_siblings = next_siblings.len(),
            children = children.len(),
            "document aggregated"
        );

        Ok(Document {
            summary,
            markdown,
            breadcrumb,
            children,
            prev_siblings,
            next_siblings,
        })
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    /// Ancestors with a usable URI, root first.
    async fn breadcrumb(&self, node: &ContentNode) -> Result<Vec<DocumentSummary>> {
        let ancestors = node
            .ancestors
            .iter()
            .rev()
            .filter(|item| {
                let keep = is_valid_uri(&item.uri);
                if !keep {
                    debug!(id = %item.id, uri = %item.uri, "ancestor skipped: invalid URI");
                }
                keep
            })
            .collect();
        self.summarize_all(ancestors).await
    }

    /// Summary and body of the node itself.
    async fn current(&self, node: &ContentNode, path: &str) -> Result<(DocumentSummary, Markdown)> {
        let url = self.url_for(path);
        let scraped = self.scraper.scrape(&url, &self.settings.content_selector).await?;

        let markdown = match self.renderers.get(&node.mime_type) {
            Some(renderer) => {
                debug!(mime_type = %node.mime_type, "applying content renderer");
                renderer.render(node, &url).await?
            }
            None => scraped.markdown,
        };

        let mut summary = scraped.summary;
        summary.apply_item(&node.item, &self.settings.base_url);
        Ok((summary, markdown))
    }

    /// Siblings before and after the node in its parent's index.
    async fn siblings(
        &self,
        node: &ContentNode,
    ) -> Result<(Vec<DocumentSummary>, Vec<DocumentSummary>)> {
        let Some(parent) = node.parent() else {
            return Ok((Vec::new(), Vec::new()));
        };

        let index = self
            .source
            .child_index(&self.settings.env, &parent.id, &self.settings.mime_types)
            .await?;
        let (prev, next) = partition_siblings(&index, &node.item.id)?;

        tokio::try_join!(self.summarize_all(prev), self.summarize_all(next))
    }

    /// The node's own children in index order.
    async fn children(&self, node: &ContentNode) -> Result<Vec<DocumentSummary>> {
        let index = self
            .source
            .child_index(&self.settings.env, &node.item.id, &self.settings.mime_types)
            .await?;

        let children = index
            .index
            .iter()
            .map(|id| lookup(&index, id))
            .collect::<Result<Vec<_>>>()?;
        self.summarize_all(children).await
    }

    // -----------------------------------------------------------------------
    // Scraping
    // -----------------------------------------------------------------------

    /// Summaries for `items`, in the given order.
    ///
    /// The fetch futures are built up front so the stream holds concrete
    /// futures rather than a closure over borrowed items, which keeps the
    /// aggregation future `Send`.
    async fn summarize_all(&self, items: Vec<&Item>) -> Result<Vec<DocumentSummary>> {
        let fetches: Vec<_> = items.into_iter().map(|item| self.summarize(item)).collect();
        stream::iter(fetches)
            .buffered(self.settings.fetch_concurrency.max(1))
            .try_collect()
            .await
    }

    async fn summarize(&self, item: &Item) -> Result<DocumentSummary> {
        let url = self.url_for(&item.uri);
        let mut summary = self
            .scraper
            .scrape(&url, &self.settings.content_selector)
            .await?
            .summary;
        summary.apply_item(item, &self.settings.base_url);
        Ok(summary)
    }

    fn url_for(&self, uri: &str) -> String {
        format!("{}{uri}", self.settings.base_url)
    }
}

fn lookup<'a>(index: &'a ChildIndex, id: &str) -> Result<&'a Item> {
    index.get(id).ok_or_else(|| {
        ContentMcpError::not_found(format!("node '{id}' in index of '{}'", index.parent_id))
    })
}

/// Split a parent's index around `current_id`.
///
/// Entries with an invalid URI are dropped from both halves. When the current
/// node is absent from the index everything lands in the first half.
fn partition_siblings<'a>(
    index: &'a ChildIndex,
    current_id: &str,
) -> Result<(Vec<&'a Item>, Vec<&'a Item>)> {
    let mut prev = Vec::new();
    let mut next = Vec::new();
    let mut after_current = false;

    for id in &index.index {
        if id == current_id {
            after_current = true;
            continue;
        }
        let item = lookup(index, id)?;
        if !is_valid_uri(&item.uri) {
            debug!(id = %id, uri = %item.uri, "sibling skipped: invalid URI");
            continue;
        }
        if after_current {
            next.push(item);
        } else {
            prev.push(item);
        }
    }

    Ok((prev, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ContentRenderer;
    use crate::testing::{FakeScraper, FakeSource, item, recipes_site, settings};
    use async_trait::async_trait;

    fn aggregator(source: FakeSource, scraper: Arc<FakeScraper>) -> DocumentAggregator {
        DocumentAggregator::new(settings(), Arc::new(source), scraper)
    }

    fn ids(summaries: &[DocumentSummary]) -> Vec<&str> {
        summaries.iter().map(|s| s.id.as_str()).collect()
    }

    #[tokio::test]
    async fn italian_recipes_document() {
        let scraper = Arc::new(FakeScraper::default());
        let doc = aggregator(recipes_site(), scraper.clone())
            .get_document("/recipes/italian")
            .await
            .unwrap();

        assert_eq!(doc.summary.id, "italian");
        assert_eq!(doc.summary.url, "https://example.com/recipes/italian");
        assert_eq!(doc.summary.content_summary.name, "Italian");
        assert_eq!(doc.summary.content_summary.title, "Title of /recipes/italian");
        assert_eq!(doc.markdown, "Body of /recipes/italian");

        assert_eq!(ids(&doc.breadcrumb), vec!["home", "recipes"]);
        assert_eq!(ids(&doc.prev_siblings), vec!["french"]);
        assert_eq!(ids(&doc.next_siblings), vec!["spanish"]);
        assert_eq!(ids(&doc.children), vec!["carbonara", "lasagna"]);
    }

    #[tokio::test]
    async fn sibling_partition_preserves_index_order() {
        let mut source = recipes_site();
        source.set_index(
            "recipes",
            &["a", "b", "italian", "c", "d"],
            vec![
                item("a", "/recipes/a"),
                item("b", "/recipes/b"),
                item("italian", "/recipes/italian"),
                item("c", "/recipes/c"),
                item("d", "/recipes/d"),
            ],
        );

        let doc = aggregator(source, Arc::new(FakeScraper::default()))
            .get_document("/recipes/italian")
            .await
            .unwrap();
        assert_eq!(ids(&doc.prev_siblings), vec!["a", "b"]);
        assert_eq!(ids(&doc.next_siblings), vec!["c", "d"]);
    }

    #[tokio::test]
    async fn invalid_uris_are_skipped() {
        let mut source = recipes_site();
        source.set_index(
            "recipes",
            &["french", "hidden", "italian", "external", "spanish"],
            vec![
                item("french", "/recipes/french"),
                item("hidden", ""),
                item("italian", "/recipes/italian"),
                item("external", "https://other.example.com/x"),
                item("spanish", "/recipes/spanish"),
            ],
        );
        source.add_ancestor("/recipes/italian", item("site", ""));

        let scraper = Arc::new(FakeScraper::default());
        let doc = aggregator(source, scraper.clone())
            .get_document("/recipes/italian")
            .await
            .unwrap();

        assert_eq!(ids(&doc.breadcrumb), vec!["home", "recipes"]);
        assert_eq!(ids(&doc.prev_siblings), vec!["french"]);
        assert_eq!(ids(&doc.next_siblings), vec!["spanish"]);
        assert!(!scraper.scraped().iter().any(|u| u.contains("other.example.com")));
    }

    #[tokio::test]
    async fn root_node_has_no_siblings_or_breadcrumb() {
        let doc = aggregator(recipes_site(), Arc::new(FakeScraper::default()))
            .get_document("/")
            .await
            .unwrap();
        assert!(doc.breadcrumb.is_empty());
        assert!(doc.prev_siblings.is_empty());
        assert!(doc.next_siblings.is_empty());
        assert_eq!(ids(&doc.children), vec!["recipes"]);
    }

    #[tokio::test]
    async fn missing_sibling_is_not_found() {
        let mut source = recipes_site();
        source.set_index(
            "recipes",
            &["french", "italian", "ghost"],
            vec![item("french", "/recipes/french"), item("italian", "/recipes/italian")],
        );

        let err = aggregator(source, Arc::new(FakeScraper::default()))
            .get_document("/recipes/italian")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn unknown_path_fails() {
        let err = aggregator(recipes_site(), Arc::new(FakeScraper::default()))
            .get_document("/recipes/thai")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn empty_path_is_rejected() {
        let scraper = Arc::new(FakeScraper::default());
        let err = aggregator(recipes_site(), scraper.clone())
            .get_document("")
            .await
            .unwrap_err();
        assert!(matches!(err, ContentMcpError::Validation { .. }));
        assert!(scraper.scraped().is_empty());
    }

    #[tokio::test]
    async fn any_failed_scrape_fails_the_document() {
        for failing in [
            "/recipes",
            "/recipes/italian",
            "/recipes/spanish",
            "/recipes/italian/lasagna",
        ] {
            let scraper = Arc::new(FakeScraper::failing(&[failing]));
            let result = aggregator(recipes_site(), scraper)
                .get_document("/recipes/italian")
                .await;
            assert!(
                matches!(result, Err(ContentMcpError::Upstream { .. })),
                "expected failure when {failing} fails"
            );
        }
    }

    #[tokio::test]
    async fn failure_cancels_outstanding_fetches() {
        // Children never complete; the failing sibling must still end the request.
        let scraper = Arc::new(
            FakeScraper::failing(&["/recipes/french"]).hanging(&["/recipes/italian/carbonara"]),
        );
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            aggregator(recipes_site(), scraper).get_document("/recipes/italian"),
        )
        .await
        .expect("aggregation did not fail fast");
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_request_stops_pending_scrapes() {
        // One fetch at a time: lasagna is queued behind the hanging carbonara.
        let scraper = Arc::new(FakeScraper::default().hanging(&["/recipes/italian/carbonara"]));
        let aggregator = DocumentAggregator::new(
            SiteSettings {
                fetch_concurrency: 1,
                ..settings()
            },
            Arc::new(recipes_site()),
            scraper.clone(),
        );

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            aggregator.get_document("/recipes/italian"),
        )
        .await;
        assert!(result.is_err(), "aggregation should still be pending");

        let started = scraper.scraped();
        assert!(started.iter().any(|url| url.ends_with("/recipes/italian/carbonara")));

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert_eq!(scraper.scraped(), started);
        assert!(!started.iter().any(|url| url.ends_with("/recipes/italian/lasagna")));
    }

    #[tokio::test]
    async fn content_source_failure_fails_the_document() {
        let mut source = recipes_site();
        source.fail_nodes = true;
        let err = aggregator(source, Arc::new(FakeScraper::default()))
            .get_document("/recipes/italian")
            .await
            .unwrap_err();
        assert!(matches!(err, ContentMcpError::Upstream { .. }));
    }

    struct Shout;

    #[async_trait]
    impl ContentRenderer for Shout {
        async fn render(&self, node: &ContentNode, url: &str) -> Result<Markdown> {
            Ok(format!("RENDERED {} AT {url}", node.item.id))
        }
    }

    #[tokio::test]
    async fn renderer_overrides_body_only() {
        let mut renderers = RendererRegistry::new();
        renderers.register("application/x-category".into(), Shout);

        let doc = aggregator(recipes_site(), Arc::new(FakeScraper::default()))
            .with_renderers(renderers)
            .get_document("/recipes/italian")
            .await
            .unwrap();

        assert_eq!(doc.markdown, "RENDERED italian AT https://example.com/recipes/italian");
        assert_eq!(doc.summary.content_summary.title, "Title of /recipes/italian");
        assert_eq!(doc.summary.id, "italian");
    }

    #[tokio::test]
    async fn identity_comes_from_content_tree() {
        let doc = aggregator(recipes_site(), Arc::new(FakeScraper::default()))
            .get_document("/recipes/italian")
            .await
            .unwrap();

        // The fake scraper reports its own id/mime type; the tree values must win.
        for summary in doc.breadcrumb.iter().chain(&doc.children).chain(&doc.next_siblings) {
            assert_ne!(summary.id, "scraped");
            assert_eq!(summary.mime_type.as_str(), "application/x-category");
            assert!(summary.url.starts_with("https://example.com/"));
        }
        assert_eq!(doc.breadcrumb[0].content_summary.name, "Home");
    }

    #[test]
    fn partition_without_current_puts_all_before() {
        let index = ChildIndex {
            parent_id: "p".into(),
            index: vec!["a".into(), "b".into()],
            children: [("a", "/a"), ("b", "/b")]
                .into_iter()
                .map(|(id, uri)| (id.to_string(), item(id, uri)))
                .collect(),
        };
        let (prev, next) = partition_siblings(&index, "zzz").unwrap();
        assert_eq!(prev.len(), 2);
        assert!(next.is_empty());
    }
}
