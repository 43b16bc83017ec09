// =============================================================================
// Paper Broker & Position Monitor — virtual fills, SL/TP tracking, PnL and
// drawdown bookkeeping, append-only CSV trade log.
// =============================================================================

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::BrokerConfig;
use crate::types::{BrokerStats, ClosedTrade, PaperPosition, TradeResult, ValidatedOrder};

const CSV_HEADER: &str = "id,timestamp,pair,side,entry,sl,tp,size,exit_price,pnl,result";

fn round8(v: f64) -> f64 {
    (v * 1e8).round() / 1e8
}

/// Simulated fills against a virtual balance. Owns `active_positions`
/// exclusively; mutated only from the orchestrator's drive loop.
pub struct PaperBroker {
    config: BrokerConfig,
    pair: String,
    virtual_balance: f64,
    initial_balance: f64,
    active: Vec<PaperPosition>,
    closed_count: u64,
    wins: u64,
    gross_win: f64,
    gross_loss: f64,
    peak_balance: f64,
    max_drawdown_pct: f64,
    csv_path: PathBuf,
}

impl PaperBroker {
    pub fn new(config: BrokerConfig, pair: &str) -> anyhow::Result<Self> {
        let csv_path = PathBuf::from("logs")
            .join(format!("simulated_trades_{}.csv", pair.replace('/', "_")));
        if let Some(parent) = csv_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !csv_path.exists() {
            let mut f = File::create(&csv_path)?;
            writeln!(f, "{CSV_HEADER}")?;
        }

        let balance = config.paper_balance;
        Ok(Self {
            config,
            pair: pair.to_string(),
            virtual_balance: balance,
            initial_balance: balance,
            active: Vec::new(),
            closed_count: 0,
            wins: 0,
            gross_win: 0.0,
            gross_loss: 0.0,
            peak_balance: balance,
            max_drawdown_pct: 0.0,
            csv_path,
        })
    }

    /// Open a simulated position, applying the entry commission as a price
    /// shift (not a fee deduction).
    pub fn execute_order(&mut self, order: &ValidatedOrder, now_ms: i64) -> PaperPosition {
        let c = self.config.commission_pct;
        let entry_price = round8(if order.side.is_buy() {
            order.entry_price * (1.0 + c)
        } else {
            order.entry_price * (1.0 - c)
        });

        let position = PaperPosition {
            id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            side: order.side,
            entry_price,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
            size: order.position_size,
            reason: order.reason.clone(),
            open_ts_ms: now_ms,
        };
        info!(id = %position.id, side = %position.side, entry = position.entry_price, "paper position opened");
        self.active.push(position.clone());
        position
    }

    pub fn active_positions(&self) -> &[PaperPosition] {
        &self.active
    }

    /// Check every open position against `last_price`; closes any that hit
    /// SL or TP and returns the resulting `ClosedTrade`s.
    pub fn check_positions(&mut self, last_price: f64, now_ms: i64) -> Vec<ClosedTrade> {
        let mut hits = Vec::new();
        for pos in &self.active {
            if pos.side.is_buy() {
                if last_price <= pos.stop_loss {
                    hits.push((pos.id.clone(), pos.stop_loss, TradeResult::Loss));
                } else if last_price >= pos.take_profit {
                    hits.push((pos.id.clone(), pos.take_profit, TradeResult::Win));
                }
            } else if last_price >= pos.stop_loss {
                hits.push((pos.id.clone(), pos.stop_loss, TradeResult::Loss));
            } else if last_price <= pos.take_profit {
                hits.push((pos.id.clone(), pos.take_profit, TradeResult::Win));
            }
        }

        let mut closed = Vec::with_capacity(hits.len());
        for (id, exit_price, result) in hits {
            if let Some(trade) = self.close_position(&id, exit_price, result, now_ms) {
                closed.push(trade);
            }
        }
        closed
    }

    fn close_position(
        &mut self,
        id: &str,
        exit_price: f64,
        result: TradeResult,
        now_ms: i64,
    ) -> Option<ClosedTrade> {
        let idx = self.active.iter().position(|p| p.id == id)?;
        let position = self.active.remove(idx);

        let c = self.config.commission_pct;
        let adjusted_exit = round8(if position.side.is_buy() {
            exit_price * (1.0 - c)
        } else {
            exit_price * (1.0 + c)
        });

        let raw_pnl = (adjusted_exit - position.entry_price) * position.size;
        let pnl = round8(if position.side.is_buy() { raw_pnl } else { -raw_pnl });

        self.virtual_balance += pnl;
        match result {
            TradeResult::Win => {
                self.gross_win += pnl;
                self.wins += 1;
            }
            TradeResult::Loss => self.gross_loss += -pnl,
        }

        self.peak_balance = self.peak_balance.max(self.virtual_balance);
        let dd_pct = (self.peak_balance - self.virtual_balance) / self.peak_balance * 100.0;
        self.max_drawdown_pct = self.max_drawdown_pct.max(dd_pct);
        self.closed_count += 1;

        let trade = ClosedTrade {
            position: position.clone(),
            exit_price: adjusted_exit,
            pnl,
            result,
            close_ts_ms: now_ms,
        };
        info!(id = %position.id, pnl, result = %result, "paper position closed");
        if let Err(e) = self.write_csv_row(&trade) {
            tracing::warn!(error = %e, "failed to append trade CSV row");
        }
        Some(trade)
    }

    fn write_csv_row(&self, trade: &ClosedTrade) -> anyhow::Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        let timestamp = Utc
            .timestamp_millis_opt(trade.position.open_ts_ms)
            .single()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        writeln!(
            f,
            "{},{},{},{},{},{},{},{},{},{},{}",
            trade.position.id,
            timestamp,
            self.pair,
            trade.position.side,
            trade.position.entry_price,
            trade.position.stop_loss,
            trade.position.take_profit,
            trade.position.size,
            trade.exit_price,
            trade.pnl,
            trade.result,
        )?;
        f.flush()?;
        Ok(())
    }

    pub fn get_stats(&self) -> BrokerStats {
        BrokerStats {
            win_rate_pct: self.win_rate_pct(),
            profit_factor: if self.gross_loss == 0.0 {
                if self.gross_win > 0.0 { f64::INFINITY } else { 0.0 }
            } else {
                self.gross_win / self.gross_loss
            },
            max_drawdown_pct: self.max_drawdown_pct,
            total_trades: self.closed_count,
            net_pnl: self.virtual_balance - self.initial_balance,
            virtual_balance: self.virtual_balance,
            active_positions: self.active.len(),
        }
    }

    fn win_rate_pct(&self) -> f64 {
        if self.closed_count == 0 {
            return 0.0;
        }
        self.wins as f64 / self.closed_count as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    fn order(side: Side, entry: f64, sl: f64, tp: f64) -> ValidatedOrder {
        ValidatedOrder {
            side,
            entry_price: entry,
            stop_loss: sl,
            take_profit: tp,
            position_size: 1.0,
            reason: "test".to_string(),
            timestamp_ms: 0,
        }
    }

    fn test_broker(tag: &str) -> PaperBroker {
        PaperBroker::new(BrokerConfig::default(), &format!("TEST{tag}/USDT")).unwrap()
    }

    /// Round-trip property: opening and immediately closing a buy at the
    /// (pre-commission) entry price loses roughly two commissions' worth.
    #[test]
    fn open_and_close_at_entry_loses_double_commission() {
        let mut broker = test_broker("A");
        let o = order(Side::Buy, 100.0, 90.0, 110.0);
        let pos = broker.execute_order(&o, 0);
        let trade = broker
            .close_position(&pos.id, 100.0, TradeResult::Loss, 1_000)
            .expect("position should close");
        let expected = -100.0 * (broker.config.commission_pct * 2.0) * pos.size;
        assert!((trade.pnl - expected).abs() < 1e-6, "pnl={} expected={}", trade.pnl, expected);
    }

    #[test]
    fn sl_hit_closes_as_loss() {
        let mut broker = test_broker("B");
        let o = order(Side::Buy, 100.0, 90.0, 110.0);
        broker.execute_order(&o, 0);
        let closed = broker.check_positions(89.0, 1_000);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].result, TradeResult::Loss);
    }

    #[test]
    fn tp_hit_closes_as_win() {
        let mut broker = test_broker("C");
        let o = order(Side::Buy, 100.0, 90.0, 110.0);
        broker.execute_order(&o, 0);
        let closed = broker.check_positions(111.0, 1_000);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].result, TradeResult::Win);
    }

    /// A TP hit counts as a win for stats purposes even if commission makes
    /// the post-commission pnl marginally negative.
    #[test]
    fn tp_hit_counts_as_win_even_with_negative_pnl() {
        let mut broker = test_broker("E");
        let o = order(Side::Buy, 100.0, 99.99, 100.01);
        broker.execute_order(&o, 0);
        let trade = broker
            .close_position(&broker.active[0].id.clone(), 100.01, TradeResult::Win, 1_000)
            .expect("position should close");
        assert!(trade.pnl < 0.0, "expected commission to eat the tight TP, pnl={}", trade.pnl);
        let stats = broker.get_stats();
        assert_eq!(stats.win_rate_pct, 100.0);
    }

    #[test]
    fn drawdown_is_monotonic_non_decreasing() {
        let mut broker = test_broker("D");
        let o1 = order(Side::Buy, 100.0, 90.0, 95.0);
        broker.execute_order(&o1, 0);
        broker.check_positions(89.0, 1_000);
        let dd1 = broker.max_drawdown_pct;
        let o2 = order(Side::Buy, 100.0, 90.0, 200.0);
        broker.execute_order(&o2, 2_000);
        broker.check_positions(201.0, 3_000);
        assert!(broker.max_drawdown_pct >= dd1);
    }
}
