use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flightpass::api::{create_router, AppState};
use flightpass::config::Config;
use flightpass::decode::{
    BoardingPassPipeline, PipelineOptions, SymbolScanner, TesseractRecognizer,
};
use flightpass::flights::{FlightStore, InMemoryFlightStore};

#[derive(Parser)]
#[command(name = "flightpass")]
#[command(about = "Decode flight codes from boarding-pass images")]
struct Args {
    /// JSON file with flight records to load at start-up (overrides FLIGHTS_SEED_PATH)
    #[arg(long)]
    flights: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "flightpass=info,tower_http=debug".into());
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = Config::from_env();

    if config.server.api_keys.is_empty() {
        tracing::warn!(
            "FLIGHTPASS_API_KEYS is not set, upload endpoints are locked. Set FLIGHTPASS_API_KEYS to enable them."
        );
    }

    tracing::info!(
        "Initializing OCR engines: {} x {}...",
        config.ocr.engines.max(1),
        config.ocr.languages
    );
    let recognizer = TesseractRecognizer::new(&config.ocr);
    if let Some(reason) = recognizer.unavailable_reason() {
        tracing::warn!("OCR unavailable - codes will only be read from QR symbols: {reason}");
    }
    let symbols = SymbolScanner::boarding_pass(config.decode.symbol_max_dimension);

    let options = PipelineOptions::from_config(&config)?;
    tracing::info!(
        region = %options.region,
        workers = options.workers,
        ocr_slots = options.ocr_slots,
        timeout_secs = options.ocr_timeout.as_secs(),
        "Decode pipeline configured"
    );
    let pipeline = BoardingPassPipeline::new(Arc::new(recognizer), Arc::new(symbols), options);

    let seed_path = args
        .flights
        .or_else(|| config.flights.seed_path.as_ref().map(PathBuf::from));
    let store = match seed_path {
        Some(path) => InMemoryFlightStore::load_seed(&path).await?,
        None => {
            tracing::warn!("No flight records loaded; boarding-pass uploads will return 404");
            InMemoryFlightStore::new()
        }
    };
    tracing::info!(flights = store.len().await, "Flight store ready");
    let flights: Arc<dyn FlightStore> = Arc::new(store);

    let state = AppState::new(config.clone(), pipeline.clone(), flights);
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Flightpass starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  Pass storage: {}", config.storage.pass_directory);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let tasks = pipeline.tasks();
    tasks.close();
    if !tasks.is_empty() {
        tracing::info!("Waiting for {} boarding pass writes to finish...", tasks.len());
    }
    tasks.wait().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining pending work...");
}
