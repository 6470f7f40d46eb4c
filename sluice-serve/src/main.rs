//! Standalone development server: serves a directory, optionally with
//! live reload, until interrupted.

use anyhow::Result;
use clap::Parser;
use sluice_core::ServeSpec;
use tokio::signal;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sluice-serve")]
#[command(about = "Serve a directory with optional live reload")]
struct Cli {
    /// Directory to serve
    #[arg(default_value = ".")]
    root: String,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port number
    #[arg(long, default_value = "8090")]
    port: u16,

    /// Live-reload port (disabled when omitted)
    #[arg(long)]
    livereload: Option<u16>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt().with_max_level(log_level).init();

    let spec = ServeSpec::new(&cli.root)
        .with_host(&cli.bind)
        .with_port(cli.port)
        .with_livereload(cli.livereload);

    let (handle, _hub) = sluice_serve::start(&spec).await?;
    info!("Listening on http://{}", handle.addr);

    shutdown_signal().await;
    handle.shutdown();

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
