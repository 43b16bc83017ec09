// =============================================================================
// Liquidity-sweep detection & trade-gating engine — entry point
// =============================================================================

mod broker;
mod config;
mod feed;
mod imbalance;
mod level_engine;
mod market_data;
mod orchestrator;
mod risk;
mod sweep_hunter;
mod telemetry;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::feed::{BinanceTickerSource, BinanceTradeFeed};
use crate::orchestrator::Orchestrator;
use crate::telemetry::NullSink;

fn parse_symbol_arg() -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    let idx = args.iter().position(|a| a == "--symbol")?;
    args.get(idx + 1).cloned()
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env(parse_symbol_arg());
    info!(symbol = %config.symbol, paper_trading = config.paper_trading, "starting engine");

    let feed = BinanceTradeFeed::new(&config.symbol);
    let ticker = BinanceTickerSource::default();
    let telemetry = Arc::new(NullSink);

    let mut orchestrator = match Orchestrator::new(config, feed, ticker, telemetry) {
        Ok(o) => o,
        Err(e) => {
            error!(error = %e, "failed to initialize engine");
            std::process::exit(1);
        }
    };

    let mut fatal = false;
    {
        let run = orchestrator.run();
        tokio::select! {
            result = run => {
                if let Err(e) = result {
                    error!(error = %e, "drive loop exited with a fatal error");
                    fatal = true;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c — initiating graceful shutdown");
            }
        }
    }

    orchestrator.shutdown_summary();
    info!("shutdown complete");
    if fatal {
        std::process::exit(1);
    }
}
