// =============================================================================
// Risk Gatekeeper — turns a TradeSignal into a ValidatedOrder or rejects it.
// =============================================================================

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::RiskConfig;
use crate::types::{MarketMetrics, RiskState, Side, TradeSignal, ValidatedOrder};

fn round8(v: f64) -> f64 {
    (v * 1e8).round() / 1e8
}

fn today_utc() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

struct Inner {
    current_day: String,
    daily_pnl: f64,
    consecutive_losses: u32,
    daily_halted: bool,
    volatility_halted: bool,
}

/// Validates signals against capital-protection limits and sizes positions
/// by fixed-fractional account risk. Owned exclusively by the orchestrator.
pub struct RiskEngine {
    config: RiskConfig,
    state: Inner,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        info!(balance = config.account_balance, "risk engine initialized");
        Self {
            config,
            state: Inner {
                current_day: today_utc(),
                daily_pnl: 0.0,
                consecutive_losses: 0,
                daily_halted: false,
                volatility_halted: false,
            },
        }
    }

    fn maybe_reset_daily(&mut self) {
        let today = today_utc();
        if today != self.state.current_day {
            info!(previous_day = %self.state.current_day, "UTC day rollover — resetting risk state");
            self.state.current_day = today;
            self.state.daily_pnl = 0.0;
            self.state.consecutive_losses = 0;
            self.state.daily_halted = false;
        }
    }

    /// Day rollover, then refresh the volatility breaker from the latest
    /// market metrics.
    pub fn update_metrics(&mut self, m: &MarketMetrics) {
        self.maybe_reset_daily();
        let was_halted = self.state.volatility_halted;
        self.state.volatility_halted = m.volume_zscore >= self.config.max_volatility_zscore;
        if self.state.volatility_halted && !was_halted {
            warn!(zscore = m.volume_zscore, "volatility breaker tripped");
        } else if was_halted && !self.state.volatility_halted {
            info!("volatility breaker cleared");
        }
    }

    fn calculate_position_size(&self, entry_price: f64, stop_loss_price: f64) -> f64 {
        let risk_distance = (entry_price - stop_loss_price).abs();
        if risk_distance == 0.0 {
            return 0.0;
        }
        let risk_amount = self.config.account_balance * self.config.max_account_risk_pct;
        let mut size = risk_amount / risk_distance;
        if size < self.config.min_order_qty {
            return 0.0;
        }
        let max_size = self.config.account_balance / entry_price;
        size = size.min(max_size);
        round8(size)
    }

    /// Validate and size a signal. Checks run in the exact order given in
    /// the component design; the first failing check rejects with `None`.
    pub fn process_signal(&mut self, signal: &TradeSignal, bid: f64, ask: f64) -> Option<ValidatedOrder> {
        self.maybe_reset_daily();

        if self.state.daily_halted {
            debug!("rejected: daily loss breaker latched");
            return None;
        }

        let daily_loss_limit = self.config.account_balance * self.config.max_daily_loss_pct;
        if self.state.daily_pnl <= -daily_loss_limit {
            self.state.daily_halted = true;
            error!(daily_pnl = self.state.daily_pnl, "CIRCUIT BREAKER: daily loss limit breached");
            return None;
        }

        if self.state.consecutive_losses >= self.config.max_consecutive_losses {
            debug!(consecutive_losses = self.state.consecutive_losses, "rejected: consecutive loss breaker");
            return None;
        }

        if self.state.volatility_halted {
            debug!("rejected: volatility breaker active");
            return None;
        }

        if bid <= 0.0 || ask <= 0.0 {
            debug!(bid, ask, "rejected: invalid ticker");
            return None;
        }

        let mid = (ask + bid) / 2.0;
        let spread_pct = (ask - bid) / mid;
        if spread_pct > self.config.max_spread_pct {
            debug!(spread_pct, "rejected: spread too wide");
            return None;
        }

        let entry_price = if signal.side.is_buy() { ask } else { bid };

        if signal.stop_loss <= 0.0 {
            debug!("rejected: non-positive stop loss");
            return None;
        }
        let sl_valid = if signal.side.is_buy() {
            signal.stop_loss < entry_price
        } else {
            signal.stop_loss > entry_price
        };
        if !sl_valid {
            debug!("rejected: stop loss on wrong side of entry");
            return None;
        }

        let risk_distance = (entry_price - signal.stop_loss).abs();
        let take_profit = if signal.side.is_buy() {
            entry_price + risk_distance * self.config.reward_risk_ratio
        } else {
            entry_price - risk_distance * self.config.reward_risk_ratio
        };

        let size = self.calculate_position_size(entry_price, signal.stop_loss);
        if size == 0.0 {
            debug!("rejected: position size below minimum");
            return None;
        }

        Some(ValidatedOrder {
            side: signal.side,
            entry_price: round8(entry_price),
            stop_loss: round8(signal.stop_loss),
            take_profit: round8(take_profit),
            position_size: size,
            reason: signal.reason.clone(),
            timestamp_ms: signal.timestamp_ms,
        })
    }

    /// Record a closed trade's PnL: updates the daily total and the
    /// consecutive-loss counter, then re-checks the daily-loss breaker.
    pub fn record_fill(&mut self, pnl: f64) {
        self.maybe_reset_daily();
        self.state.daily_pnl += pnl;
        if pnl < 0.0 {
            self.state.consecutive_losses += 1;
        } else {
            self.state.consecutive_losses = 0;
        }

        let daily_loss_limit = self.config.account_balance * self.config.max_daily_loss_pct;
        if !self.state.daily_halted && self.state.daily_pnl <= -daily_loss_limit {
            self.state.daily_halted = true;
            error!(daily_pnl = self.state.daily_pnl, "CIRCUIT BREAKER: daily loss limit breached");
        }
    }

    pub fn get_state(&self) -> RiskState {
        RiskState {
            account_balance: self.config.account_balance,
            volatility_halted: self.state.volatility_halted,
            current_day: self.state.current_day.clone(),
            daily_pnl: self.state.daily_pnl,
            consecutive_losses: self.state.consecutive_losses,
            daily_halted: self.state.daily_halted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(side: Side, price: f64, sl: f64, tp: f64) -> TradeSignal {
        TradeSignal {
            side,
            strength: "HIGH",
            reason: "test".to_string(),
            price,
            stop_loss: sl,
            take_profit: tp,
            timestamp_ms: 0,
            metadata: crate::types::SignalMetadata {
                level_name: crate::types::LevelName::H4High,
                level_price: price,
                wick_extreme: price,
                fib_tp: tp,
                range_high: price,
                range_low: sl,
            },
        }
    }

    /// S4 — risk rejection on spread.
    #[test]
    fn s4_spread_rejection() {
        let cfg = RiskConfig { account_balance: 10_000.0, max_spread_pct: 0.001, ..RiskConfig::default() };
        let mut risk = RiskEngine::new(cfg);
        let sig = signal(Side::Buy, 100.25, 99.0, 102.0);
        let out = risk.process_signal(&sig, 100.0, 100.5);
        assert!(out.is_none());
    }

    /// S5 — position sizing.
    #[test]
    fn s5_position_sizing() {
        let cfg = RiskConfig {
            account_balance: 10_000.0,
            max_account_risk_pct: 0.01,
            max_spread_pct: 1.0, // disable spread rejection for this case
            ..RiskConfig::default()
        };
        let mut risk = RiskEngine::new(cfg);
        let sig = signal(Side::Buy, 50_000.0, 49_500.0, 0.0);
        let order = risk.process_signal(&sig, 49_999.0, 50_000.0).expect("should accept");
        assert_eq!(order.position_size, 0.2);
        assert_eq!(order.take_profit, 51_000.0);
    }

    /// S6 — daily loss breaker.
    #[test]
    fn s6_daily_loss_breaker() {
        let cfg = RiskConfig {
            account_balance: 10_000.0,
            max_daily_loss_pct: 0.03,
            max_spread_pct: 1.0,
            ..RiskConfig::default()
        };
        let mut risk = RiskEngine::new(cfg);
        risk.record_fill(-150.0);
        risk.record_fill(-160.0);
        assert!(risk.state.daily_halted);

        let sig = signal(Side::Buy, 100.0, 99.0, 102.0);
        let out = risk.process_signal(&sig, 99.9, 100.0);
        assert!(out.is_none());
    }

    #[test]
    fn consecutive_losses_reset_on_win() {
        let mut risk = RiskEngine::new(RiskConfig::default());
        risk.record_fill(-10.0);
        risk.record_fill(-10.0);
        assert_eq!(risk.state.consecutive_losses, 2);
        risk.record_fill(5.0);
        assert_eq!(risk.state.consecutive_losses, 0);
    }

    #[test]
    fn rejects_stop_loss_on_wrong_side() {
        let mut risk = RiskEngine::new(RiskConfig { max_spread_pct: 1.0, ..RiskConfig::default() });
        let sig = signal(Side::Buy, 100.0, 101.0, 102.0); // SL above entry for a buy
        let out = risk.process_signal(&sig, 99.9, 100.0);
        assert!(out.is_none());
    }
}
