use std::time::Duration;

use clap::Parser;
use rusqlite::Connection;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use groupbank::{Limits, PlanScheduler, TransferEngine, stores::sqlite::create_stores};

/// The recurring payment scheduler daemon for groupbank.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// Seconds between scans for due payment plans.
    ///
    /// Plans repeat in days at the finest, so the default of five minutes
    /// only affects how late a due plan executes, never whether it does.
    #[arg(long, default_value_t = 300)]
    tick_seconds: u64,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let connection = Connection::open(&args.db_path).expect("Could not open the database.");
    let stores = create_stores(connection).expect("Could not create the database schema.");

    let engine = TransferEngine::new(stores.ledger, Limits::default());
    let scheduler = PlanScheduler::new(engine, stores.plans);

    tracing::info!(
        "scanning for due payment plans every {} seconds",
        args.tick_seconds
    );

    // A tick body runs synchronously, so dropping the scheduler future
    // here cancels between ticks and never half-advances a plan.
    tokio::select! {
        _ = scheduler.run(Duration::from_secs(args.tick_seconds)) => {},
        _ = shutdown_signal() => {
            tracing::info!("shutting down");
        },
    }
}

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
        },
    }
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
