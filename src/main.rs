use std::sync::{Arc, Mutex};
use stream_ledger::{api, config, db, job};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Stream ledger starting...");

    let cfg = config::load()?;
    info!("  DB Path: {}", cfg.db_path);
    info!("  Port: {}", cfg.port);
    info!("  Network: {} ({})", cfg.network, cfg.network.chain_id());
    info!("  Accounts tracked: {:?}", cfg.addresses);

    // Run DB migrations once at startup
    {
        let conn = db::connect(&cfg.db_path)?;
        db::run_migrations(&conn)?;
    }

    // Shared DB connection
    let shared_conn = Arc::new(Mutex::new(db::connect(&cfg.db_path)?));

    let api_handle = tokio::spawn({
        let cfg = cfg.clone();
        let conn = Arc::clone(&shared_conn);
        async move { api::serve(cfg, conn).await }
    });

    let job_handle = tokio::spawn({
        let cfg = cfg.clone();
        let conn = Arc::clone(&shared_conn);
        async move { job::run(cfg, conn).await }
    });

    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        res = job_handle => match res {
            Ok(Ok(_)) => info!("Aggregation job exited cleanly"),
            Ok(Err(e)) => error!("Aggregation job error: {:?}", e),
            Err(e) => error!("Aggregation job task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Stream ledger stopped.");
    Ok(())
}
