// =============================================================================
// Orchestrator — single-threaded cooperative drive loop tying every
// component together, one trade batch at a time.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::broker::PaperBroker;
use crate::config::EngineConfig;
use crate::feed::{TickerSource, TradeFeed};
use crate::imbalance::ImbalanceTracker;
use crate::level_engine::LevelEngine;
use crate::risk::RiskEngine;
use crate::telemetry::TelemetrySink;
use crate::types::{SignalMetadata, Trade, TradeSignal};

const PULSE_INTERVAL_SEC: u64 = 5;

fn nofi_label(nofi: f64) -> &'static str {
    let abs_n = nofi.abs();
    if abs_n >= 0.7 {
        if nofi > 0.0 { "Strong Buy Bias" } else { "Strong Sell Bias" }
    } else if abs_n >= 0.3 {
        if nofi > 0.0 { "Moderate Buy Bias" } else { "Moderate Sell Bias" }
    } else {
        "Balanced"
    }
}

fn vol_label(zscore: f64) -> &'static str {
    if zscore >= 3.0 {
        "EXTREME"
    } else if zscore >= 2.0 {
        "HEAVY"
    } else if zscore >= 1.0 {
        "ELEVATED"
    } else {
        "NORMAL"
    }
}

fn eff_label(efficiency: f64) -> &'static str {
    let abs_e = efficiency.abs();
    if abs_e >= 0.01 {
        "Clear Path"
    } else if abs_e >= 0.001 {
        "Moderate"
    } else {
        "Stalled / Absorbed"
    }
}

/// Wraps a confirmed `SweepResult` as a `TradeSignal`, the shape the Risk
/// Gatekeeper consumes.
fn build_signal(
    sweep: crate::types::SweepResult,
    price: f64,
    timestamp_ms: i64,
) -> TradeSignal {
    TradeSignal {
        side: sweep.side,
        strength: sweep.strength,
        reason: format!("sweep_{} nOFI confirmed", sweep.level_name),
        price,
        stop_loss: sweep.wick_extreme,
        take_profit: sweep.fib_tp,
        timestamp_ms,
        metadata: SignalMetadata {
            level_name: sweep.level_name,
            level_price: sweep.level_price,
            wick_extreme: sweep.wick_extreme,
            fib_tp: sweep.fib_tp,
            range_high: sweep.range_high,
            range_low: sweep.range_low,
        },
    }
}

/// Owns every core component exclusively; mutated only here.
pub struct Orchestrator<F: TradeFeed, T: TickerSource> {
    config: EngineConfig,
    feed: F,
    ticker: T,
    telemetry: Arc<dyn TelemetrySink>,
    imbalance: ImbalanceTracker,
    levels: LevelEngine,
    risk: RiskEngine,
    broker: PaperBroker,
    last_price: f64,
}

impl<F: TradeFeed, T: TickerSource> Orchestrator<F, T> {
    pub fn new(config: EngineConfig, feed: F, ticker: T, telemetry: Arc<dyn TelemetrySink>) -> anyhow::Result<Self> {
        let broker = PaperBroker::new(config.broker.clone(), &config.symbol)?;
        Ok(Self {
            imbalance: ImbalanceTracker::new(config.imbalance.clone()),
            levels: LevelEngine::new(config.level.clone()),
            risk: RiskEngine::new(config.risk.clone()),
            broker,
            config,
            feed,
            ticker,
            telemetry,
            last_price: 0.0,
        })
    }

    /// Process exactly one trade batch through the full pipeline. Returns
    /// `Ok(false)` when the feed is exhausted (used by tests/replay).
    pub async fn step(&mut self) -> anyhow::Result<()> {
        let batch = self.feed.next_batch().await?;
        if batch.is_empty() {
            return Ok(());
        }

        self.ingest(&batch);

        let metrics = self.imbalance.compute_metrics();
        self.risk.update_metrics(&metrics);

        if self.config.paper_trading {
            let closed = self.broker.check_positions(self.last_price, now_ms());
            for trade in &closed {
                self.risk.record_fill(trade.pnl);
                self.telemetry.publish(crate::types::TelemetryEvent::TradeUpdate {
                    action: "EXIT",
                    id: trade.position.id.clone(),
                    pair: self.config.symbol.clone(),
                    side: trade.position.side,
                    entry_price: trade.position.entry_price,
                });
            }
        }

        let now = now_ms();
        if let Some(sweep) = self.levels.check_hunt(metrics.nofi, now, &self.config.hunter) {
            let signal = build_signal(sweep, self.last_price, now);
            self.telemetry.publish(crate::types::TelemetryEvent::SignalGen {
                side: signal.side,
                strength: signal.strength,
                price: signal.price,
                stop_loss: signal.stop_loss,
                take_profit: signal.take_profit,
                reason: signal.reason.clone(),
            });

            let (bid, ask) = self.ticker.ticker(&self.config.symbol).await.unwrap_or((0.0, 0.0));
            if let Some(order) = self.risk.process_signal(&signal, bid, ask) {
                if self.config.paper_trading && self.broker.active_positions().is_empty() {
                    let position = self.broker.execute_order(&order, now);
                    self.telemetry.publish(crate::types::TelemetryEvent::TradeUpdate {
                        action: "ENTRY",
                        id: position.id.clone(),
                        pair: self.config.symbol.clone(),
                        side: position.side,
                        entry_price: position.entry_price,
                    });
                }
            } else {
                warn!(side = %signal.side, "signal rejected by risk gatekeeper");
            }
        }

        Ok(())
    }

    fn ingest(&mut self, batch: &[Trade]) {
        self.imbalance.push(batch);
        for t in batch {
            self.levels.push_trade(t.timestamp_ms, t.price, t.amount);
            self.last_price = t.price;
        }
    }

    /// Logs the console pulse and fires the `MARKET_PULSE`/`LEVEL_UPDATE`
    /// telemetry events. Called on the 5-second wall-clock cadence only —
    /// never per trade batch.
    fn emit_pulse(&self) {
        let m = self.imbalance.compute_metrics();
        let lv = self.levels.level_info();
        info!(
            trend = %m.trend,
            nofi = m.nofi,
            nofi_label = nofi_label(m.nofi),
            volume_zscore = m.volume_zscore,
            vol_label = vol_label(m.volume_zscore),
            efficiency = m.efficiency,
            eff_label = eff_label(m.efficiency),
            is_absorption = m.is_absorption,
            nearest_high = lv.nearest_high,
            high_distance_pct = lv.high_distance_pct,
            nearest_low = lv.nearest_low,
            low_distance_pct = lv.low_distance_pct,
            atr = lv.atr,
            sweep_status = %lv.sweep_status,
            status = %m.status,
            "market pulse"
        );

        self.telemetry.publish(crate::types::TelemetryEvent::MarketPulse {
            symbol: self.config.symbol.clone(),
            nofi: m.nofi,
            volume_zscore: m.volume_zscore,
            efficiency: m.efficiency,
            trend: m.trend,
            is_absorption: m.is_absorption,
            price: self.last_price,
            atr: lv.atr,
        });

        let near_liquidity = if lv.high_distance_pct.abs() <= lv.low_distance_pct.abs() {
            lv.nearest_high
        } else {
            lv.nearest_low
        };
        self.telemetry.publish(crate::types::TelemetryEvent::LevelUpdate {
            symbol: self.config.symbol.clone(),
            h1_high: lv.h1_high,
            h1_low: lv.h1_low,
            h4_high: lv.h4_high,
            h4_low: lv.h4_low,
            near_liquidity,
            hunt_summary: lv.sweep_status,
        });
    }

    /// Run the drive loop until the feed is exhausted or a fatal error
    /// propagates (stream exceeded max reconnect attempts). Cancellation
    /// (ctrl-c) is handled by the caller in `main`.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!(symbol = %self.config.symbol, "orchestrator starting");
        let mut last_pulse = Instant::now();
        loop {
            self.step().await?;
            if self.imbalance.size() > 0
                && last_pulse.elapsed() >= std::time::Duration::from_secs(PULSE_INTERVAL_SEC)
            {
                self.emit_pulse();
                last_pulse = Instant::now();
            }
        }
    }

    /// Final statistics logged on graceful shutdown.
    pub fn shutdown_summary(&self) {
        let stats = self.broker.get_stats();
        info!(
            win_rate_pct = stats.win_rate_pct,
            profit_factor = stats.profit_factor,
            max_drawdown_pct = stats.max_drawdown_pct,
            total_trades = stats.total_trades,
            net_pnl = stats.net_pnl,
            virtual_balance = stats.virtual_balance,
            "final broker stats"
        );
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
