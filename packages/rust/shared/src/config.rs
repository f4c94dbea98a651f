//! Application configuration for contentmcp.
//!
//! User config lives at `~/.contentmcp/contentmcp.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ContentMcpError, Result};
use crate::types::MimeType;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contentmcp.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contentmcp";

// ---------------------------------------------------------------------------
// Config structs (matching contentmcp.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub stream: StreamSection,

    #[serde(default)]
    pub server: ServerConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Public site origin prepended to every content URI (no trailing slash).
    #[serde(default)]
    pub base_url: String,

    /// Content server endpoint. Document aggregation is disabled when empty.
    #[serde(default)]
    pub content_server_url: String,

    /// Selector used to extract the page body.
    #[serde(default = "default_content_selector")]
    pub content_selector: String,

    /// Content types allowed in sibling and child listings.
    #[serde(default)]
    pub mime_types: Vec<String>,

    #[serde(default)]
    pub env: Env,

    /// Content-type specific body renderers.
    #[serde(default)]
    pub renderers: Vec<RendererConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            content_server_url: String::new(),
            content_selector: default_content_selector(),
            mime_types: Vec::new(),
            env: Env::default(),
            renderers: Vec::new(),
        }
    }
}

fn default_content_selector() -> String {
    "main".into()
}

/// Content-server request environment (`[site.env]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// `[[site.renderers]]` entry: scrape this content type with its own selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererConfig {
    pub mime_type: String,
    pub selector: String,
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout for content server and page fetches.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum concurrent page scrapes within one aggregation phase.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_fetch_concurrency() -> usize {
    4
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[stream]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSection {
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Capacity of the shared broadcast queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-connection outbound buffer.
    #[serde(default = "default_client_buffer")]
    pub client_buffer: usize,

    /// A client not written to for this long is reported as disconnected.
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive_secs(),
            queue_capacity: default_queue_capacity(),
            client_buffer: default_client_buffer(),
            client_timeout_secs: default_client_timeout_secs(),
        }
    }
}

fn default_keepalive_secs() -> u64 {
    30
}
fn default_queue_capacity() -> usize {
    100
}
fn default_client_buffer() -> usize {
    256
}
fn default_client_timeout_secs() -> u64 {
    60
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path prefix for the tool and streaming routes.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            endpoint: default_endpoint(),
        }
    }
}

fn default_port() -> u16 {
    8080
}
fn default_endpoint() -> String {
    "/mcp".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime site settings used by the aggregator; immutable per service instance.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub base_url: String,
    pub content_server_url: String,
    pub content_selector: String,
    pub mime_types: Vec<MimeType>,
    pub env: Env,
    pub fetch_concurrency: usize,
}

impl SiteSettings {
    /// Whether a content server is configured (required for document aggregation).
    pub fn has_content_server(&self) -> bool {
        !self.content_server_url.is_empty()
    }
}

impl From<&AppConfig> for SiteSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.site.base_url.trim_end_matches('/').to_string(),
            content_server_url: config.site.content_server_url.trim_end_matches('/').to_string(),
            content_selector: config.site.content_selector.clone(),
            mime_types: config
                .site
                .mime_types
                .iter()
                .map(|m| MimeType::new(m.as_str()))
                .collect(),
            env: config.site.env.clone(),
            fetch_concurrency: config.http.fetch_concurrency.max(1),
        }
    }
}

/// Runtime dispatcher configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub keepalive_interval: Duration,
    pub queue_capacity: usize,
    pub client_buffer: usize,
    pub client_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::from(&StreamSection::default())
    }
}

impl From<&StreamSection> for StreamConfig {
    fn from(section: &StreamSection) -> Self {
        Self {
            keepalive_interval: Duration::from_secs(section.keepalive_secs.max(1)),
            queue_capacity: section.queue_capacity.max(1),
            client_buffer: section.client_buffer.max(1),
            client_timeout: Duration::from_secs(section.client_timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contentmcp/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ContentMcpError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contentmcp/contentmcp.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ContentMcpError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ContentMcpError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ContentMcpError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ContentMcpError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ContentMcpError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

fn validate(config: &AppConfig) -> Result<()> {
    for url in [&config.site.base_url, &config.site.content_server_url] {
        if !url.is_empty() {
            url::Url::parse(url)
                .map_err(|e| ContentMcpError::config(format!("invalid URL '{url}': {e}")))?;
        }
    }
    if !config.server.endpoint.starts_with('/') {
        return Err(ContentMcpError::config(format!(
            "server.endpoint must start with '/', got '{}'",
            config.server.endpoint
        )));
    }
    for renderer in &config.site.renderers {
        if renderer.mime_type.is_empty() || renderer.selector.is_empty() {
            return Err(ContentMcpError::config(
                "site.renderers entries need both mime_type and selector",
            ));
        }
    }
    Ok(())
}
