//! ts-fileserver
//!
//! Serve a directory over HTTP on a private overlay network.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fileserver::config::Config;
use fileserver::{network, FileServer};
use tracing_subscriber::EnvFilter;

/// ts-fileserver - expose a folder to your overlay network.
#[derive(Parser, Debug)]
#[command(name = "ts-fileserver")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Which folder to expose
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Allow users to upload files
    #[arg(short, long)]
    pub writable: bool,

    /// Address to listen on, usually the overlay interface address
    #[arg(short, long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Command line flags take precedence over the environment and the file.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(root) = &self.root {
            config.files.root = root.clone();
        }
        if self.writable {
            config.files.writable = true;
        }
        if let Some(listen) = &self.listen {
            config.network.listen = listen.clone();
        }
        if self.verbose {
            config.daemon.log_level = "debug".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config.validate()?;

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.daemon.log_level.to_lowercase()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::debug!("Arguments: {:?}", cli);
    tracing::debug!("Configuration: {:?}", config);

    let server_config = config
        .server_config()
        .context("failed to initialize application")?;
    let server = FileServer::new(server_config);

    tracing::info!("Starting file server on {}", server.root().display());
    if server.config().writable() {
        tracing::info!("Uploads are enabled");
    }

    let listener = network::bind(config.listen_addr()?)
        .await
        .with_context(|| format!("failed to listen on {}", config.network.listen))?;
    tracing::info!("To use it please access: http://{}", listener.local_addr()?);

    network::serve(listener, server, network::shutdown_signal())
        .await
        .context("failed to run app")?;

    tracing::info!("File server stopped");
    Ok(())
}
