//! HTML-to-Markdown conversion for scraped content fragments.
//!
//! The scrape client hands us the outer HTML of the element picked by the
//! content selector. We pre-render tables (which `htmd` leaves as HTML),
//! convert with `htmd`, then run the cleanup passes in [`cleanup`].

mod cleanup;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use contentmcp_shared::{ContentMcpError, Result};

/// Tags that never carry body content.
const SKIP_TAGS: &[&str] = &["script", "style", "iframe", "noscript", "svg", "template"];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of converting an HTML fragment to Markdown.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    pub markdown: String,
    /// Approximate word count, code blocks excluded.
    pub word_count: usize,
}

/// Options for the HTML-to-Markdown conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Page URL used to resolve relative links. Links stay untouched when `None`.
    pub source_url: Option<String>,
}

impl ConvertOptions {
    pub fn for_url(url: &str) -> Self {
        Self {
            source_url: Some(url.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert an HTML fragment to clean Markdown.
#[instrument(skip(html), fields(url = opts.source_url.as_deref().unwrap_or("")))]
pub fn convert_fragment(html: &str, opts: &ConvertOptions) -> Result<ConvertResult> {
    let html = render_tables(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build();

    let raw = converter
        .convert(&html)
        .map_err(|e| ContentMcpError::Conversion(format!("htmd conversion failed: {e}")))?;

    let base_url = opts.source_url.as_deref().and_then(|u| Url::parse(u).ok());
    let markdown = cleanup::run_pipeline(&raw, base_url.as_ref());
    let word_count = count_words(&markdown);

    debug!(raw_len = raw.len(), final_len = markdown.len(), word_count, "fragment converted");

    Ok(ConvertResult {
        markdown,
        word_count,
    })
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Replace every `<table>` with a pipe table so it survives `htmd`.
fn render_tables(html: &str) -> String {
    static TABLE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("table").expect("valid selector"));

    let fragment = Html::parse_fragment(html);
    if fragment.select(&TABLE).next().is_none() {
        return html.to_string();
    }

    // Match against the parser's own serialization; the source text may differ
    // (implied <tbody>, attribute quoting).
    let mut out = fragment.root_element().inner_html();
    for table in fragment.select(&TABLE) {
        // Nested tables are flattened into their outer table's cells.
        if table.ancestors().filter_map(ElementRef::wrap).any(|a| a.value().name() == "table") {
            continue;
        }
        out = out.replacen(&table.html(), &pipe_table(&table), 1);
    }
    out
}

fn pipe_table(table: &ElementRef) -> String {
    static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
    static CELL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("th, td").expect("valid selector"));

    let mut header_row = false;
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (i, tr) in table.select(&ROW).enumerate() {
        let cells: Vec<String> = tr
            .select(&CELL)
            .map(|c| {
                if i == 0 && c.value().name() == "th" {
                    header_row = true;
                }
                c.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
            })
            .collect();
        if !cells.is_empty() {
            rows.push(cells);
        }
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }
    for row in &mut rows {
        row.resize(width, String::new());
    }

    let line = |cells: &[String]| format!("| {} |\n", cells.join(" | "));
    let separator = line(&vec!["---".to_string(); width]);

    let mut md = String::from("\n\n");
    if header_row {
        md.push_str(&line(&rows[0]));
        md.push_str(&separator);
        rows[1..].iter().for_each(|r| md.push_str(&line(r)));
    } else {
        // Pipe tables need a header; use a blank one.
        md.push_str(&line(&vec![String::new(); width]));
        md.push_str(&separator);
        rows.iter().for_each(|r| md.push_str(&line(r)));
    }
    md.push('\n');
    md
}

fn count_words(md: &str) -> usize {
    static FENCED: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));

    FENCED
        .replace_all(md, "")
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}
