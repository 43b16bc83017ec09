// =============================================================================
// Imbalance Engine — sliding-window order-flow imbalance, efficiency, and
// volume Z-score over a bounded trade ring.
// =============================================================================

use std::collections::VecDeque;

use crate::config::ImbalanceConfig;
use crate::types::{MarketMetrics, MarketStatus, Side, Trade, Trend};

/// A single trade as retained in the ring: `(timestamp_ms, is_buy, price, amount)`.
type RawTradeRecord = (i64, bool, f64, f64);

/// Bounded FIFO ring of recent trades plus the statistics derived from it.
///
/// Owned exclusively by the orchestrator's drive loop; never shared.
pub struct ImbalanceTracker {
    config: ImbalanceConfig,
    trades: VecDeque<RawTradeRecord>,
}

impl ImbalanceTracker {
    pub fn new(config: ImbalanceConfig) -> Self {
        let cap = config.max_buffer_size;
        Self {
            config,
            trades: VecDeque::with_capacity(cap.min(4096)),
        }
    }

    /// Number of trades currently retained — used by the orchestrator to
    /// gate the dashboard pulse on a non-empty tape.
    pub fn size(&self) -> usize {
        self.trades.len()
    }

    /// Append a batch of trades, evicting the oldest entries once the ring
    /// exceeds `max_buffer_size`. Amortized O(1) per trade.
    pub fn push(&mut self, trades: &[Trade]) {
        for t in trades {
            self.trades.push_back((t.timestamp_ms, t.side.is_buy(), t.price, t.amount));
            if self.trades.len() > self.config.max_buffer_size {
                self.trades.pop_front();
            }
        }
    }

    /// Walk the ring newest-to-oldest, collecting entries whose timestamp is
    /// within `window_sec` of wall-clock now. Returned in chronological order.
    fn window(&self, now_ms: i64, window_sec: f64) -> Vec<RawTradeRecord> {
        let cutoff = now_ms as f64 - window_sec * 1000.0;
        let mut out = Vec::new();
        for entry in self.trades.iter().rev() {
            if (entry.0 as f64) < cutoff {
                break;
            }
            out.push(*entry);
        }
        out.reverse();
        out
    }

    fn compute_nofi(window: &[RawTradeRecord]) -> (f64, f64, f64) {
        let mut v_buy = 0.0;
        let mut v_sell = 0.0;
        for &(_, is_buy, _, amount) in window {
            if is_buy {
                v_buy += amount;
            } else {
                v_sell += amount;
            }
        }
        let total = v_buy + v_sell;
        let nofi = if total == 0.0 { 0.0 } else { (v_buy - v_sell) / total };
        (nofi, v_buy, v_sell)
    }

    fn compute_efficiency(window: &[RawTradeRecord]) -> f64 {
        if window.len() < 2 {
            return 0.0;
        }
        let total_volume: f64 = window.iter().map(|e| e.3).sum();
        if total_volume == 0.0 {
            return 0.0;
        }
        let price_first = window.first().unwrap().2;
        let price_last = window.last().unwrap().2;
        (price_last - price_first) / total_volume
    }

    /// Bucket the 20-minute window into 60-second bins, score the latest
    /// bucket against the historical mean/stdev of the rest.
    fn compute_volume_zscore(&self, now_ms: i64) -> f64 {
        let window = self.window(now_ms, self.config.volume_window_min * 60.0);
        if window.is_empty() {
            return 0.0;
        }
        let first_ts = window[0].0;
        let bucket_ms = 60_000i64;

        let mut bucket_volumes: Vec<f64> = Vec::new();
        for &(ts, _, _, amount) in &window {
            let bucket_id = ((ts - first_ts) / bucket_ms) as usize;
            if bucket_id >= bucket_volumes.len() {
                bucket_volumes.resize(bucket_id + 1, 0.0);
            }
            bucket_volumes[bucket_id] += amount;
        }

        if bucket_volumes.len() < 2 {
            return 0.0;
        }

        let (history, current) = bucket_volumes.split_at(bucket_volumes.len() - 1);
        let current = current[0];
        let mean = history.iter().sum::<f64>() / history.len() as f64;
        let variance = history.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / (history.len() as f64 - 1.0).max(1.0);
        let stdev = variance.sqrt();

        if history.len() < 2 || stdev == 0.0 {
            return 0.0;
        }
        (current - mean) / stdev
    }

    /// Recompute every statistic from the current ring state, using
    /// `now_ms` as the wall-clock reference for windowing.
    pub fn compute_metrics_at(&self, now_ms: i64) -> MarketMetrics {
        if self.trades.is_empty() {
            return MarketMetrics::empty();
        }

        let window_60s = self.window(now_ms, self.config.nofi_window_sec);
        let (nofi, buy_volume, sell_volume) = Self::compute_nofi(&window_60s);
        let efficiency = Self::compute_efficiency(&window_60s);
        let volume_zscore = self.compute_volume_zscore(now_ms);

        let is_significant = volume_zscore > self.config.zscore_threshold;
        let is_absorption = nofi.abs() >= self.config.absorption_nofi_min
            && efficiency.abs() <= self.config.absorption_eff_max;

        let trend = if nofi > 0.3 {
            Trend::Bullish
        } else if nofi < -0.3 {
            Trend::Bearish
        } else {
            Trend::Neutral
        };

        let status = if is_significant {
            MarketStatus::SignalDetected
        } else {
            MarketStatus::Monitoring
        };

        MarketMetrics {
            nofi,
            buy_volume,
            sell_volume,
            efficiency,
            volume_zscore,
            is_significant,
            is_absorption,
            trend,
            status,
        }
    }

    /// Convenience wrapper using the real wall clock.
    pub fn compute_metrics(&self) -> MarketMetrics {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.compute_metrics_at(now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(ts: i64, side: Side, price: f64, amount: f64) -> Trade {
        Trade { timestamp_ms: ts, side, price, amount }
    }

    #[test]
    fn empty_ring_returns_zeroed_metrics() {
        let tracker = ImbalanceTracker::new(ImbalanceConfig::default());
        let m = tracker.compute_metrics_at(0);
        assert_eq!(m.nofi, 0.0);
        assert_eq!(m.trend, Trend::Neutral);
        assert_eq!(m.status, MarketStatus::Monitoring);
    }

    /// S1 — nOFI basic.
    #[test]
    fn s1_nofi_basic() {
        let mut tracker = ImbalanceTracker::new(ImbalanceConfig::default());
        tracker.push(&[
            trade(0, Side::Buy, 100.0, 1.0),
            trade(10_000, Side::Sell, 100.0, 1.0),
            trade(20_000, Side::Buy, 100.0, 2.0),
        ]);
        let m = tracker.compute_metrics_at(20_000);
        assert_eq!(m.buy_volume, 3.0);
        assert_eq!(m.sell_volume, 1.0);
        assert!((m.nofi - 0.5).abs() < 1e-9);
        assert_eq!(m.trend, Trend::Bullish);
        assert_eq!(m.efficiency, 0.0);
    }

    #[test]
    fn nofi_stays_within_domain() {
        let mut tracker = ImbalanceTracker::new(ImbalanceConfig::default());
        tracker.push(&[trade(0, Side::Buy, 100.0, 5.0)]);
        let m = tracker.compute_metrics_at(0);
        assert_eq!(m.nofi, 1.0);
        assert!(m.nofi <= 1.0 && m.nofi >= -1.0);
    }

    #[test]
    fn volume_zscore_zero_with_single_bucket() {
        let mut tracker = ImbalanceTracker::new(ImbalanceConfig::default());
        tracker.push(&[trade(0, Side::Buy, 100.0, 1.0), trade(1_000, Side::Sell, 100.0, 1.0)]);
        let m = tracker.compute_metrics_at(1_000);
        assert_eq!(m.volume_zscore, 0.0);
    }

    #[test]
    fn ring_evicts_oldest_beyond_capacity() {
        let mut cfg = ImbalanceConfig::default();
        cfg.max_buffer_size = 3;
        let mut tracker = ImbalanceTracker::new(cfg);
        tracker.push(&[
            trade(0, Side::Buy, 1.0, 1.0),
            trade(1, Side::Buy, 2.0, 1.0),
            trade(2, Side::Buy, 3.0, 1.0),
            trade(3, Side::Buy, 4.0, 1.0),
        ]);
        assert_eq!(tracker.size(), 3);
        assert_eq!(tracker.trades.front().unwrap().0, 1);
    }

    #[test]
    fn absorption_flag_requires_both_conditions() {
        let mut tracker = ImbalanceTracker::new(ImbalanceConfig::default());
        // Strong one-sided flow but price barely moves relative to volume.
        tracker.push(&[
            trade(0, Side::Buy, 100.0, 1000.0),
            trade(1_000, Side::Buy, 100.0001, 1000.0),
        ]);
        let m = tracker.compute_metrics_at(1_000);
        assert!(m.is_absorption);
    }
}
