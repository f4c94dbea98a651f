//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use contentmcp_core::{
    DocumentAggregator, DocumentRequest, RendererRegistry, ScrapeRequest, ToolService,
};
use contentmcp_scrape::{HttpScraper, ScrapeClient};
use contentmcp_server::AppState;
use contentmcp_shared::{
    AppConfig, SiteSettings, StreamConfig, init_config, load_config, load_config_from,
};
use contentmcp_source::HttpContentSource;
use contentmcp_stream::Dispatcher;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// contentmcp: content documents with their navigation, on demand or streamed.
#[derive(Parser)]
#[command(
    name = "contentmcp",
    version,
    about = "Aggregate content-server documents with breadcrumb, siblings and children.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.contentmcp/contentmcp.toml).
    #[arg(long, global = true, env = "CONTENTMCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Serve the tool and event-stream endpoints over HTTP.
    Serve {
        /// Port to listen on (overrides server.port).
        #[arg(long)]
        port: Option<u16>,

        /// Route prefix (overrides server.endpoint).
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Scrape one page and print its summary and Markdown as JSON.
    Scrape {
        /// Page URL.
        url: String,

        /// Content selector: #id, .class or tag (defaults to site.content_selector).
        #[arg(short, long)]
        selector: Option<String>,
    },

    /// Aggregate the document at a content path and print it as JSON.
    Document {
        /// Content path, e.g. /recipes/italian.
        path: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "contentmcp=info",
        1 => "contentmcp=debug,tower_http=debug",
        _ => "contentmcp=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Serve { port, endpoint } => cmd_serve(config_path, port, endpoint).await,
        Command::Scrape { url, selector } => cmd_scrape(config_path, url, selector).await,
        Command::Document { path } => cmd_document(config_path, path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Wire the HTTP scrape client, the content-server client and the aggregator.
///
/// Document aggregation is only available when `site.content_server_url` is set.
fn build_tools(config: &AppConfig) -> Result<ToolService> {
    let timeout = config.http.timeout();
    let scraper: Arc<dyn ScrapeClient> = Arc::new(HttpScraper::new(timeout)?);
    let settings = SiteSettings::from(config);

    let documents = if settings.has_content_server() {
        let source = Arc::new(HttpContentSource::new(&settings.content_server_url, timeout)?);
        let renderers = RendererRegistry::from_config(&config.site.renderers, Arc::clone(&scraper));
        info!(
            content_server = %settings.content_server_url,
            renderers = renderers.len(),
            "document service enabled"
        );
        let aggregator = DocumentAggregator::new(settings, source, Arc::clone(&scraper))
            .with_renderers(renderers);
        Some(Arc::new(aggregator))
    } else {
        info!("no content server configured, document service disabled");
        None
    };

    Ok(ToolService::new(scraper, documents))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(
    config_path: Option<&Path>,
    port: Option<u16>,
    endpoint: Option<String>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let port = port.unwrap_or(config.server.port);
    let endpoint = endpoint.unwrap_or_else(|| config.server.endpoint.clone());
    if !endpoint.starts_with('/') {
        return Err(eyre!("endpoint must start with '/', got '{endpoint}'"));
    }

    let state = AppState {
        tools: build_tools(&config)?,
        dispatcher: Dispatcher::start(StreamConfig::from(&config.stream)),
        version: env!("CARGO_PKG_VERSION"),
    };

    contentmcp_server::serve(state, port, &endpoint).await?;
    Ok(())
}

async fn cmd_scrape(
    config_path: Option<&Path>,
    url: String,
    selector: Option<String>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let tools = build_tools(&config)?;
    let request = ScrapeRequest {
        url,
        selector: selector.unwrap_or_else(|| config.site.content_selector.clone()),
    };

    let spinner = spinner(format!("Scraping {}", request.url))?;
    let result = tools.scrape(&request).await;
    spinner.finish_and_clear();

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

async fn cmd_document(config_path: Option<&Path>, path: String) -> Result<()> {
    let config = resolve_config(config_path)?;
    if config.site.content_server_url.is_empty() {
        return Err(eyre!(
            "site.content_server_url is not set; run `contentmcp config init` and edit the config"
        ));
    }
    let tools = build_tools(&config)?;

    let spinner = spinner(format!("Aggregating {path}"))?;
    let result = tools.get_document(&DocumentRequest { path }, None).await;
    spinner.finish_and_clear();

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

fn spinner(message: String) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    Ok(spinner)
}
