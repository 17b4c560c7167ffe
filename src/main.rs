//! Aurora-Crawl main entry point
//!
//! Command-line interface for registering sites and sources, crawling sites,
//! and registering artifacts.

use anyhow::Context;
use aurora_crawl::config::{load_config_with_hash, Config};
use aurora_crawl::storage::{ArtifactKind, NewArtifact};
use aurora_crawl::Services;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Aurora-Crawl: per-site crawler and ingestion dispatcher
#[derive(Parser, Debug)]
#[command(name = "aurora-crawl")]
#[command(version)]
#[command(about = "Crawl registered sites and dispatch ingestion events", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a site by URL (no-op if it already exists)
    Submit {
        url: String,
    },

    /// Crawl a site until its frontier is drained
    Crawl {
        site_id: i64,
    },

    /// List registered sites
    Sites,

    /// Manage ingestion sources
    #[command(subcommand)]
    Source(SourceCommand),

    /// Manage artifacts
    #[command(subcommand)]
    Artifact(ArtifactCommand),
}

#[derive(Subcommand, Debug)]
enum SourceCommand {
    /// Create a source and run its type's handler
    Create {
        #[arg(long = "type", value_name = "TYPE")]
        source_type: String,

        #[arg(long)]
        name: Option<String>,

        /// Type-specific configuration as a JSON object
        #[arg(long = "config-json", value_name = "JSON")]
        config_json: String,
    },

    /// Update a source's name and/or configuration
    Update {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long = "config-json", value_name = "JSON")]
        config_json: Option<String>,
    },

    /// Delete a source and whatever its handler created
    Delete {
        id: i64,
    },

    /// List sources
    List,
}

#[derive(Subcommand, Debug)]
enum ArtifactCommand {
    /// Register an artifact and dispatch it by MIME type
    Add {
        #[arg(long = "source")]
        source_id: i64,

        /// upload, crawl or sync
        #[arg(long, default_value = "upload")]
        kind: String,

        #[arg(long)]
        mime: String,

        #[arg(long)]
        path: String,

        #[arg(long, default_value_t = 0)]
        size: u64,
    },

    /// Dispatch a stored artifact again
    Dispatch {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            Config::default()
        }
    };

    let services = Services::new(&config)
        .with_context(|| format!("failed to open database {}", config.database.path))?;

    let result = run(&services, cli.command).await;

    if let Some(report) = services.shutdown().await? {
        tracing::debug!(
            "Artifact worker: {} processed, {} duplicates, {} failed",
            report.processed,
            report.duplicates,
            report.failed
        );
    }

    result
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("aurora_crawl=info,warn"),
            1 => EnvFilter::new("aurora_crawl=debug,info"),
            2 => EnvFilter::new("aurora_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(services: &Services, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Submit { url } => {
            let site = services.submit_site(&url)?;
            println!("Site {}: {} (max depth {})", site.id, site.url, site.max_depth);
        }
        Command::Crawl { site_id } => {
            let summary = services.crawl_site(site_id).await?;
            println!(
                "Crawled site {}: {} fetched, {} failed, {} new links",
                summary.site_id, summary.fetched, summary.failed, summary.enqueued
            );
        }
        Command::Sites => {
            for site in services.list_sites()? {
                let last = site
                    .last_crawled_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:>4}  {}  [{}]  last crawled: {}",
                    site.id,
                    site.url,
                    site.allowed_domains.join(", "),
                    last
                );
            }
        }
        Command::Source(cmd) => run_source(services, cmd)?,
        Command::Artifact(ArtifactCommand::Add {
            source_id,
            kind,
            mime,
            path,
            size,
        }) => {
            let kind = ArtifactKind::from_db_string(&kind)
                .with_context(|| format!("unknown artifact kind '{}'", kind))?;
            let artifact = services.register_artifact(NewArtifact {
                source_id,
                kind,
                mime_type: mime,
                path,
                size_bytes: size,
            })?;
            println!("Artifact {} registered", artifact.id);
        }
        Command::Artifact(ArtifactCommand::Dispatch { id }) => {
            let artifact = services.dispatch_artifact(id)?;
            println!("Artifact {} dispatched ({})", artifact.id, artifact.mime_type);
        }
    }

    Ok(())
}

fn run_source(services: &Services, command: SourceCommand) -> anyhow::Result<()> {
    match command {
        SourceCommand::Create {
            source_type,
            name,
            config_json,
        } => {
            let config = serde_json::from_str(&config_json).context("--config-json is not valid JSON")?;
            let source = services.create_source(&source_type, name.as_deref(), config)?;
            println!("Source {} created ({})", source.id, source.source_type);
        }
        SourceCommand::Update {
            id,
            name,
            config_json,
        } => {
            let config = config_json
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .context("--config-json is not valid JSON")?;
            let source = services.update_source(id, name.as_deref(), config)?;
            println!("Source {} updated", source.id);
        }
        SourceCommand::Delete { id } => {
            let source = services.delete_source(id)?;
            println!("Source {} deleted", source.id);
        }
        SourceCommand::List => {
            for source in services.list_sources()? {
                println!(
                    "{:>4}  {:<8}  {}",
                    source.id,
                    source.source_type,
                    source.name.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}
