//! Document aggregation and the tool surface for contentmcp.
//!
//! [`DocumentAggregator`] turns a content path into a [`Document`] with its
//! breadcrumb, siblings and children. [`ToolService`] validates tool calls
//! and routes them to the aggregator or the scrape client.
//!
//! [`Document`]: contentmcp_shared::Document

pub mod aggregator;
pub mod render;
pub mod tools;

#[cfg(test)]
mod testing;

pub use aggregator::DocumentAggregator;
pub use render::{ContentRenderer, RendererRegistry, SelectorRenderer};
pub use tools::{
    DocumentRequest, DocumentResponse, ScrapeRequest, ScrapeResponse, TOOL_GET_DOCUMENT,
    TOOL_SCRAPE, ToolContent, ToolDescriptor, ToolResult, ToolService,
};
