//! Page scraping: fetch a page, pick a content fragment, summarize it.
//!
//! This crate provides:
//! - [`ScrapeClient`]: the scrape capability used by the aggregator
//! - [`HttpScraper`]: the reqwest-backed implementation
//! - [`ContentSelector`]: the `#id` / `.class` / `tag` selector grammar

pub mod client;
pub mod select;

pub use client::{HttpScraper, ScrapeClient, Scraped};
pub use select::{ContentSelector, PageMetadata, extract_metadata};
