use std::{
    fs::OpenOptions, net::SocketAddr, process::ExitCode, sync::Arc, time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use kakeibo::{AppState, LedgerConfig, SQLiteRecordStore, build_router, graceful_shutdown};

/// How often the server looks for changes made by other processes.
const SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// The JSON API server for the household expense ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the ledger SQLite database.
    #[arg(long)]
    db_path: String,

    /// File path to a JSON file with the household members and their colors.
    ///
    /// The default household is used if not given.
    #[arg(long)]
    config: Option<String>,

    /// The canonical name of the local timezone, e.g. "Asia/Tokyo".
    #[arg(long, default_value = "Asia/Tokyo")]
    timezone: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(error) = setup_logging() {
        eprintln!("Could not set up logging: {error}");
        return ExitCode::FAILURE;
    }

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => LedgerConfig::from_path(path),
        None => Ok(LedgerConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("Could not load the ledger config: {error}");
            return ExitCode::FAILURE;
        }
    };

    let state = match SQLiteRecordStore::open(&args.db_path)
        .and_then(|store| AppState::new(store, config, &args.timezone))
    {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not open the ledger at {}: {error}", args.db_path);
            return ExitCode::FAILURE;
        }
    };

    let sync_task = state.spawn_sync_task(SYNC_INTERVAL);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    tracing::info!("HTTP server listening on {}", addr);
    if let Err(error) = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
    {
        tracing::error!("Server error: {error}");
        return ExitCode::FAILURE;
    }

    sync_task.abort();

    ExitCode::SUCCESS
}

fn setup_logging() -> Result<(), std::io::Error> {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged where they are turned into responses.
        .on_failure(());

    router.layer(tracing_layer)
}
