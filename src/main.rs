mod config;
mod error;
mod greeks;
mod normalize;
mod pipeline;
mod provider;
mod sink;
mod types;

use std::str::FromStr;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::pipeline::Pipeline;
use crate::provider::YahooProvider;
use crate::sink::SqliteSink;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Workbook database setup (created on first run) ---
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", cfg.db_path))?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Workbook database ready at {}", cfg.db_path);

    info!(
        "Collecting {} for {} (bound=±{:.0}%, max_dte={}, r={})",
        cfg.kinds.iter().map(|k| format!("{k}s")).collect::<Vec<_>>().join(" and "),
        cfg.tickers.join(", "),
        cfg.strike_bound * 100.0,
        cfg.max_dte,
        cfg.risk_free_rate,
    );

    let provider = YahooProvider::new(&cfg)?;
    let sink = SqliteSink::new(pool);
    let summary = Pipeline::new(cfg, provider, sink).run().await;

    for outcome in &summary.outcomes {
        info!("  {outcome}");
    }
    info!(
        "Collection complete: {} rows across {} sheets",
        summary.total_rows,
        summary.written_sheets(),
    );

    let failed = summary.sink_failures();
    if failed > 0 {
        return Err(AppError::Sink(format!("{failed} sheet write(s) failed")));
    }
    Ok(())
}
