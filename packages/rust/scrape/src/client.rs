//! The scrape capability and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::Html;
use tracing::{debug, instrument};

use contentmcp_markdown::{ConvertOptions, convert_fragment};
use contentmcp_shared::{ContentMcpError, ContentSummary, DocumentSummary, Markdown, Result};

use crate::select::{ContentSelector, extract_metadata};

/// User-Agent string for page requests.
const USER_AGENT: &str = concat!("contentmcp/", env!("CARGO_PKG_VERSION"));

/// One scraped page: summary metadata plus the selected fragment as Markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scraped {
    pub summary: DocumentSummary,
    pub markdown: Markdown,
}

/// Fetch a page and extract a content fragment plus summary metadata.
///
/// A selector that matches nothing is a `NotFound` error, never an empty success.
#[async_trait]
pub trait ScrapeClient: Send + Sync {
    async fn scrape(&self, url: &str, selector: &str) -> Result<Scraped>;
}

// ---------------------------------------------------------------------------
// HttpScraper
// ---------------------------------------------------------------------------

/// reqwest-backed [`ScrapeClient`].
#[derive(Debug, Clone)]
pub struct HttpScraper {
    client: Client,
}

impl HttpScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| ContentMcpError::upstream_with("failed to build HTTP client", e))?;
        Ok(Self { client })
    }

    /// Reuse an existing client (shares its connection pool).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ContentMcpError::upstream_with(format!("GET {url}"), e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ContentMcpError::upstream(format!("GET {url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| ContentMcpError::upstream_with(format!("GET {url}: body read failed"), e))
    }
}

#[async_trait]
impl ScrapeClient for HttpScraper {
    #[instrument(skip(self), fields(url = %url, selector = %selector))]
    async fn scrape(&self, url: &str, selector: &str) -> Result<Scraped> {
        let selector = ContentSelector::parse(selector)?;
        let body = self.fetch(url).await?;
        debug!(len = body.len(), "page fetched");
        scrape_html(&body, url, &selector)
    }
}

/// Summarize and convert an already-fetched page.
pub fn scrape_html(html: &str, url: &str, selector: &ContentSelector) -> Result<Scraped> {
    let doc = Html::parse_document(html);
    let meta = extract_metadata(&doc);
    let fragment = selector.find(&doc)?.html();

    let converted = convert_fragment(&fragment, &ConvertOptions::for_url(url))?;

    Ok(Scraped {
        summary: DocumentSummary {
            url: url.to_string(),
            content_summary: ContentSummary {
                title: meta.title,
                description: meta.description,
                keywords: meta.keywords,
                ..Default::default()
            },
            ..Default::default()
        },
        markdown: converted.markdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><head>
        <title>French Recipes</title>
        <meta name="description" content="Classic French cooking.">
        <meta name="keywords" content="butter,wine">
    </head><body>
        <nav>Site menu</nav>
        <main><h1>French</h1><p>Coq au vin.</p></main>
    </body></html>"#;

    fn scraper() -> HttpScraper {
        HttpScraper::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn scrape_summarizes_and_converts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recipes/french"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let url = format!("{}/recipes/french", server.uri());
        let scraped = scraper().scrape(&url, "main").await.unwrap();

        assert_eq!(scraped.summary.url, url);
        assert_eq!(scraped.summary.content_summary.title, "French Recipes");
        assert_eq!(scraped.summary.content_summary.description, "Classic French cooking.");
        assert_eq!(scraped.summary.content_summary.keywords, vec!["butter", "wine"]);
        assert!(scraped.markdown.contains("# French"));
        assert!(scraped.markdown.contains("Coq au vin."));
        assert!(!scraped.markdown.contains("Site menu"));
    }

    #[tokio::test]
    async fn non_200_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = scraper()
            .scrape(&format!("{}/missing", server.uri()), "main")
            .await
            .unwrap_err();
        assert!(matches!(err, ContentMcpError::Upstream { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn unmatched_selector_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let err = scraper()
            .scrape(&format!("{}/", server.uri()), "#recipe")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn empty_selector_rejected_before_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(0)
            .mount(&server)
            .await;

        let err = scraper().scrape(&server.uri(), "").await.unwrap_err();
        assert!(matches!(err, ContentMcpError::Validation { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_upstream_error() {
        // Port 9 (discard) is closed on test hosts.
        let err = scraper().scrape("http://127.0.0.1:9/", "main").await.unwrap_err();
        assert!(matches!(err, ContentMcpError::Upstream { source: Some(_), .. }));
    }

    #[test]
    fn scrape_html_by_class() {
        let selector = ContentSelector::parse(".card").unwrap();
        let scraped = scrape_html(
            r#"<html><body><div class="recipe-card"><p>Tiramisu</p></div></body></html>"#,
            "https://example.com/desserts",
            &selector,
        )
        .unwrap();
        assert!(scraped.markdown.contains("Tiramisu"));
        assert_eq!(scraped.summary.content_summary.title, "");
    }
}
