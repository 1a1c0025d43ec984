use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slimg::api::headers::parse_accepted_types;
use slimg::config::AppConfig;
use slimg::optimize::{self, OptimizeParams, ORIGINAL};
use slimg::server;

#[derive(Parser)]
#[command(name = "slimg")]
#[command(about = "Content-negotiating image optimization proxy")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Serve {
        /// Upstream base url proxied requests are appended to
        #[arg(long, env = "BASE_URL")]
        base_url: String,

        /// Address to listen on
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8888")]
        bind_addr: String,
    },
    /// Optimize a single local file and exit
    Optimize {
        /// Source image (PNG or JPEG)
        input: PathBuf,

        /// Where to write the winning candidate
        #[arg(short, long)]
        output: PathBuf,

        /// Accept list to negotiate against, comma separated
        #[arg(short, long, default_value = "image/webp,image/*,*/*")]
        accept: String,

        /// Treat the source as a 2x retina asset (compare at 1x)
        #[arg(long)]
        hidpi: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            base_url,
            bind_addr,
        } => run_server(base_url, bind_addr).await,
        Commands::Optimize {
            input,
            output,
            accept,
            hidpi,
        } => run_optimize(input, output, &accept, hidpi).await,
    }
}

/// Run the HTTP proxy until Ctrl-C.
async fn run_server(base_url: String, bind_addr: String) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slimg=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(AppConfig::new(base_url, bind_addr)?);
    let state = server::AppState::new(config.clone());
    let shutdown = state.shutdown.clone();
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, upstream = %config.base_url, "slimg listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            // Cancels every in-flight dispatcher, which kills the encoder
            // subprocesses they spawned.
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// Machine-readable result of a one-shot optimization.
#[derive(serde::Serialize)]
struct OptimizeReport {
    optimizer: String,
    mime_type: String,
    size: u64,
    original_size: u64,
}

/// Optimize a single file without the server (CLI mode).
async fn run_optimize(
    input: PathBuf,
    output: PathBuf,
    accept: &str,
    hidpi: bool,
) -> anyhow::Result<()> {
    // Quieter default for CLI use
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slimg=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ctrl_c.cancel();
    });

    let original_size = tokio::fs::metadata(&input).await?.len();
    let params = OptimizeParams {
        accepted_types: parse_accepted_types(accept),
        source_path: input.clone(),
        hidpi,
    };

    let optimizers = optimize::default_optimizers();
    let chosen = optimize::optimize(&optimizers, &params, cancel).await?;

    let report = match chosen {
        Some(chosen) => {
            tokio::fs::copy(&chosen.path, &output).await?;
            if chosen.optimizer != ORIGINAL {
                optimize::remove_quiet(&chosen.path).await;
            }
            OptimizeReport {
                optimizer: chosen.optimizer,
                mime_type: chosen.mime_type,
                size: chosen.size,
                original_size,
            }
        }
        None => {
            // Nothing applicable; the source passes through unchanged.
            tokio::fs::copy(&input, &output).await?;
            OptimizeReport {
                optimizer: ORIGINAL.to_string(),
                mime_type: "application/octet-stream".to_string(),
                size: original_size,
                original_size,
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
