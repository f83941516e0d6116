//! Mixer federation gateway server.
//!
//! Parses CLI flags, optionally loads an import-group roster from a TOML
//! config file, wires the dispatcher together, and serves the HTTP facade.

mod roster;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use mixer_api::{ServerConfig, create_app_with_config, init_logging};
use mixer_core::config::RosterConfig;
use mixer_core::dispatcher::Dispatcher;
use mixer_core::existence::ExistenceIndex;
use mixer_core::formula::FormulaRegistry;
use mixer_core::model::VariableGroupGraph;

/// Command-line arguments: the HTTP facade's [`ServerConfig`] plus the
/// backend roster path.
#[derive(Debug, Parser)]
#[command(name = "mixer-server")]
#[command(about = "Mixer federation gateway server")]
struct ServerArgs {
    #[command(flatten)]
    api: ServerConfig,

    /// Path to a TOML file describing the import-group roster. Omit to
    /// boot with an empty roster (every RPC returns empty results).
    #[arg(long, env = "MIXER_ROSTER_CONFIG")]
    roster_config: Option<PathBuf>,
}

/// Starts the Axum HTTP server and runs until a shutdown signal arrives.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "mixer-server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("shutdown signal received, stopping server");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    init_logging(&args.api.log_level);

    if let Err(errors) = args.api.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let (backends, groups) = match &args.roster_config {
        Some(path) => {
            let loaded = roster::load_roster(path)?;
            info!(
                backends = loaded.backends.len(),
                groups = loaded.groups.len(),
                config = %path.display(),
                "loaded import-group roster"
            );
            (loaded.backends, loaded.groups)
        }
        None => {
            info!("no roster config supplied, starting with an empty backend roster");
            (Vec::new(), Vec::new())
        }
    };

    info!(
        port = args.api.port,
        host = %args.api.host,
        backends = backends.len(),
        "starting Mixer federation gateway"
    );

    // The roster is loaded once at startup; a long-running deployment would
    // keep this handle around and call `reload()` from a file-watcher or
    // admin endpoint, bumping view_epoch and invalidating outstanding
    // cursors minted against the prior generation (§6.3).
    let roster = RosterConfig::new(groups);
    let view_epoch = roster.current().view_epoch;

    let dispatcher = Arc::new(Dispatcher::new(
        backends,
        view_epoch,
        ExistenceIndex::new(),
        VariableGroupGraph::default(),
        FormulaRegistry::new(),
        None,
    ));

    let app = create_app_with_config(dispatcher, args.api.clone());
    serve(app, &args.api).await
}
