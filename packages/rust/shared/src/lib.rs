//! Shared types, error model, and configuration for contentmcp.
//!
//! Every other contentmcp crate depends on this one. It provides:
//! - [`ContentMcpError`]: the unified error type
//! - Wire types ([`Document`], [`DocumentSummary`], [`ContentSummary`]) and the
//!   content-server model ([`Item`], [`ContentNode`], [`ChildIndex`])
//! - Configuration ([`AppConfig`], [`SiteSettings`], [`StreamConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, Env, HttpConfig, RendererConfig, ServerConfig, SiteConfig, SiteSettings,
    StreamConfig, StreamSection, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{ContentMcpError, Result};
pub use types::{
    ChildIndex, ContentNode, ContentSummary, Document, DocumentSummary, Item, Markdown, MimeType,
    is_valid_uri,
};
