//! larder CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use larder::{
    commands::{
        cmd_discover, cmd_ingest, cmd_init, cmd_show, cmd_status, print_discover_stats,
        print_ingest_stats, print_recipe, print_status, IngestOptions, InitOptions,
    },
    config::Config,
    crawl::HtmlPageReader,
    error::{Error, Result},
    progress::LogWriterFactory,
    store::RecipeStore,
};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "larder")]
#[command(version, about = "Incremental recipe harvester backed by SQLite", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "LARDER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Walk the listing pages and record recipe links
    Discover {
        /// Last listing page to read (defaults to catalog.page_bound)
        #[arg(long)]
        pages: Option<u32>,
    },

    /// Fetch and store every discovered recipe not stored yet
    Ingest {
        /// Drop recipe, genre and tag tables and ingest everything again
        #[arg(long)]
        overwrite: bool,

        /// Only process the first N links
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show store status
    Status,

    /// Show one stored recipe
    Show {
        /// Recipe name
        name: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            let base_dir = base_dir_for(cli.config.as_deref());
            let config = cmd_init(InitOptions { base_dir, force }).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("✓ Config written to {}", config.paths.config_file.display());
                println!("✓ Database created at {}", config.paths.db_file.display());
            }
            return Ok(());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "larder", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(cli.config.as_deref())?;
    let store = open_store(&config).await?;

    let result = dispatch(&config, &store, cli.command, cli.json).await;
    store.close().await;
    result
}

async fn dispatch(config: &Config, store: &RecipeStore, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Discover { pages } => {
            let reader = HtmlPageReader::new(&config.catalog, &config.http)?;
            let stats = cmd_discover(config, store, &reader, pages).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_discover_stats(&stats);
            }
        }

        Commands::Ingest { overwrite, limit } => {
            let reader = HtmlPageReader::new(&config.catalog, &config.http)?;
            let stats = cmd_ingest(config, store, &reader, IngestOptions { overwrite, limit }).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_ingest_stats(&stats);
            }
        }

        Commands::Status => {
            let status = cmd_status(config, store).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::Show { name } => {
            let recipe = cmd_show(store, &name).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&recipe)?);
            } else {
                print_recipe(&recipe);
            }
        }

        Commands::Init { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Base directory for `init`: the parent of a `.toml` path, the path itself
/// otherwise, or `~/.larder`.
fn base_dir_for(path: Option<&Path>) -> PathBuf {
    match path {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir),
        Some(path) => path.to_path_buf(),
        None => Config::default_base_dir(),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => Config::load(path),
        Some(dir) => Config::load_from(Some(dir.to_path_buf())),
        None => Config::load_from(None),
    }
}

async fn open_store(config: &Config) -> Result<RecipeStore> {
    if !config.paths.db_file.exists() {
        return Err(Error::NotInitialized);
    }
    let store = RecipeStore::connect(config).await?;
    if !store.is_initialized().await? {
        store.close().await;
        return Err(Error::NotInitialized);
    }
    Ok(store)
}
