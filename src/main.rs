use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use consolidator::auth::NonceSigner;
use consolidator::cli::{
    AdminCommands, SiteCommands, run_consolidate, run_init, run_nonce, run_site_add,
    run_site_list, run_site_remove,
};
use consolidator::config::{ServerConfig, Settings};
use consolidator::server::{AppState, create_router};
use consolidator::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "consolidator")]
#[command(about = "Consolidates the content of several network sites into one", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Manage the sites of the network
    Site {
        #[command(subcommand)]
        command: SiteCommands,
    },

    /// Move the content of one or more sites into a destination site
    Consolidate {
        /// Data directory for the database, settings and uploads
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Site to consolidate (repeatable)
        #[arg(long = "source", short = 's')]
        sources: Vec<i64>,

        /// Site receiving the content
        #[arg(long, short = 'd')]
        destination: Option<i64>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,

        /// Skip interactive prompts (requires --source and --destination)
        #[arg(long)]
        non_interactive: bool,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for the database, settings and uploads
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Public base URL for external access (e.g., "https://network.example.com").
        /// Sites created over the API without a URL are served under it.
        #[arg(long)]
        public_base_url: Option<String>,
    },
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let secret_file = config.nonce_secret_path();
    if !secret_file.exists() {
        bail!("Network not initialized. Run 'consolidator admin init' first.");
    }

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    let settings = Settings::load(&config.settings_path())?;
    let nonces = NonceSigner::load(&secret_file)?;

    info!(bridge = ?settings.bridge, "Loaded settings from {}", config.settings_path().display());

    let state = Arc::new(AppState::new(
        Arc::new(store),
        config.data_dir.clone(),
        settings,
        nonces,
        config.public_base_url.clone(),
    ));

    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("consolidator=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                url,
                domain,
            } => run_init(data_dir, url, domain)?,
            AdminCommands::Nonce { data_dir } => run_nonce(data_dir)?,
        },
        Commands::Site { command } => match command {
            SiteCommands::Add {
                data_dir,
                domain,
                path,
                url,
                non_interactive,
            } => run_site_add(data_dir, domain, path, url, non_interactive)?,
            SiteCommands::List { data_dir, json } => run_site_list(data_dir, json)?,
            SiteCommands::Remove {
                data_dir,
                site_id,
                non_interactive,
                yes,
            } => run_site_remove(data_dir, site_id, non_interactive, yes)?,
        },
        Commands::Consolidate {
            data_dir,
            sources,
            destination,
            json,
            non_interactive,
        } => run_consolidate(data_dir, sources, destination, json, non_interactive)?,
        Commands::Serve {
            host,
            port,
            data_dir,
            public_base_url,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                public_base_url,
            };
            // The engine's HTTP bridge uses a blocking client, so only the
            // server runs inside the runtime.
            tokio::runtime::Runtime::new()?.block_on(serve(config))?;
        }
    }

    Ok(())
}
