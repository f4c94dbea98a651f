//! In-memory collaborators for aggregator and tool tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use contentmcp_scrape::{ScrapeClient, Scraped};
use contentmcp_shared::{
    ChildIndex, ContentMcpError, ContentNode, ContentSummary, DocumentSummary, Env, Item,
    Result, SiteSettings,
};
use contentmcp_source::{ContentSource, NodeRequest};

pub const BASE_URL: &str = "https://example.com";
const MIME: &str = "application/x-category";

pub fn settings() -> SiteSettings {
    SiteSettings {
        base_url: BASE_URL.into(),
        content_server_url: "http://contentserver.local".into(),
        content_selector: "main".into(),
        mime_types: vec![MIME.into()],
        env: Env::default(),
        fetch_concurrency: 2,
    }
}

pub fn item(id: &str, uri: &str) -> Item {
    let mut name = id.to_string();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    Item {
        id: id.into(),
        name,
        uri: uri.into(),
        mime_type: MIME.into(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Content source
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSource {
    contents: HashMap<String, ContentNode>,
    indices: HashMap<String, ChildIndex>,
    pub fail_nodes: bool,
}

impl FakeSource {
    pub fn add_node(&mut self, item: Item, ancestors: Vec<Item>) {
        self.contents.insert(
            item.uri.clone(),
            ContentNode {
                mime_type: item.mime_type.clone(),
                item,
                ancestors,
                data: None,
            },
        );
    }

    pub fn add_ancestor(&mut self, path: &str, ancestor: Item) {
        if let Some(node) = self.contents.get_mut(path) {
            node.ancestors.push(ancestor);
        }
    }

    pub fn set_index(&mut self, parent_id: &str, order: &[&str], items: Vec<Item>) {
        self.indices.insert(
            parent_id.to_string(),
            ChildIndex {
                parent_id: parent_id.to_string(),
                index: order.iter().map(|s| s.to_string()).collect(),
                children: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
            },
        );
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn get_content(&self, path: &str, _env: &Env) -> Result<ContentNode> {
        self.contents
            .get(path)
            .cloned()
            .ok_or_else(|| ContentMcpError::not_found(format!("content for '{path}'")))
    }

    async fn get_nodes(
        &self,
        _env: &Env,
        nodes: &BTreeMap<String, NodeRequest>,
    ) -> Result<HashMap<String, ChildIndex>> {
        if self.fail_nodes {
            return Err(ContentMcpError::upstream("getNodes: HTTP 500"));
        }
        Ok(nodes
            .iter()
            .map(|(name, request)| {
                let index = self.indices.get(&request.id).cloned().unwrap_or_else(|| ChildIndex {
                    parent_id: request.id.clone(),
                    ..Default::default()
                });
                (name.clone(), index)
            })
            .collect())
    }
}

/// `/` > `/recipes` > {french, italian, spanish}; italian has two children.
pub fn recipes_site() -> FakeSource {
    let home = item("home", "/");
    let recipes = item("recipes", "/recipes");

    let mut source = FakeSource::default();
    source.add_node(home.clone(), vec![]);
    source.add_node(recipes.clone(), vec![home.clone()]);
    source.add_node(item("italian", "/recipes/italian"), vec![recipes, home]);

    source.set_index("home", &["recipes"], vec![item("recipes", "/recipes")]);
    source.set_index(
        "recipes",
        &["french", "italian", "spanish"],
        vec![
            item("french", "/recipes/french"),
            item("italian", "/recipes/italian"),
            item("spanish", "/recipes/spanish"),
        ],
    );
    source.set_index(
        "italian",
        &["carbonara", "lasagna"],
        vec![
            item("lasagna", "/recipes/italian/lasagna"),
            item("carbonara", "/recipes/italian/carbonara"),
        ],
    );
    source
}

// ---------------------------------------------------------------------------
// Scrape client
// ---------------------------------------------------------------------------

/// Answers every URL with a summary derived from its path.
///
/// Paths listed in `failing` return an upstream error; paths in `hanging`
/// never complete.
#[derive(Default)]
pub struct FakeScraper {
    failing: HashSet<String>,
    hanging: HashSet<String>,
    scraped: Mutex<Vec<String>>,
}

impl FakeScraper {
    pub fn failing(paths: &[&str]) -> Self {
        Self {
            failing: paths.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn hanging(mut self, paths: &[&str]) -> Self {
        self.hanging = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn scraped(&self) -> Vec<String> {
        self.scraped.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScrapeClient for FakeScraper {
    async fn scrape(&self, url: &str, _selector: &str) -> Result<Scraped> {
        self.scraped.lock().unwrap().push(url.to_string());
        let path = url.strip_prefix(BASE_URL).unwrap_or(url);

        if self.hanging.contains(path) {
            futures::future::pending::<()>().await;
        }
        if self.failing.contains(path) {
            return Err(ContentMcpError::upstream(format!("GET {url}: HTTP 500")));
        }

        Ok(Scraped {
            summary: DocumentSummary {
                mime_type: "text/scraped".into(),
                id: "scraped".into(),
                url: url.to_string(),
                content_summary: ContentSummary {
                    title: format!("Title of {path}"),
                    ..Default::default()
                },
            },
            markdown: format!("Body of {path}"),
        })
    }
}
