use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;

use shelfscan_lib::api::start_api_server;
use shelfscan_lib::config::{AppConfig, APP_NAME, APP_VERSION};
use shelfscan_lib::pipeline::processor::{PipelineProcessor, ProductSeed};
use shelfscan_lib::{build_processor, init_tracing, StartupError};

/// Turn a product photo and/or barcode into a structured catalogue record.
#[derive(Parser, Debug)]
#[command(name = "shelfscan")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve `POST /process` over HTTP
    Serve {
        /// Address to listen on (overrides SHELFSCAN_BIND)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
    /// Run the pipeline once and print the result as JSON
    Run {
        /// Image URL or local path
        #[arg(long)]
        image: Option<String>,

        /// Known barcode
        #[arg(long)]
        barcode: Option<String>,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    tracing::info!("{APP_NAME} starting v{APP_VERSION}");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    config.validate()?;

    // The pipeline owns blocking HTTP clients: build it (and drop the last
    // reference to it) outside the async runtime.
    let processor = Arc::new(build_processor(&config)?);

    match cli.command {
        Command::Run { image, barcode } => {
            let seed = ProductSeed::from_parts(image.as_deref(), barcode.as_deref());
            let outcome = processor.process(&seed);
            println!("{}", serde_json::to_string_pretty(&outcome.result)?);
        }
        Command::Serve { bind } => {
            let addr = bind.unwrap_or(config.bind_addr);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(serve(processor.clone(), addr))?;
            drop(runtime);
        }
    }
    Ok(())
}

async fn serve(processor: Arc<PipelineProcessor>, addr: SocketAddr) -> std::io::Result<()> {
    let mut server = start_api_server(processor, addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    shutdown_signal().await;
    server.shutdown();
    server.stopped().await;
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
