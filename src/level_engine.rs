// =============================================================================
// Level Engine — incremental candle synthesis, rolling H1/H4 extremes, ATR,
// and ownership of the four Sweep Hunter level states.
// =============================================================================

use crate::config::LevelConfig;
use crate::market_data::candle_buffer::{Candle, CandleRing};
use crate::sweep_hunter::{self, LevelState};
use crate::types::{LevelInfo, LevelName, SweepResult};

/// Mean-of-true-range ATR over the last `min(period, len)` closed candles.
/// `C_{-1}` is seeded to the first candle's open, per the source's
/// equivalence-preserving quirk — this dampens the very first TR slightly
/// but keeps parity with the original bot's numbers.
fn compute_atr(candles: &[Candle], period: usize) -> f64 {
    if candles.is_empty() {
        return 0.0;
    }
    let take = period.min(candles.len());
    let window = &candles[candles.len() - take..];

    let mut prev_close = window[0].open;
    let mut sum_tr = 0.0;
    for c in window {
        let hl = c.high - c.low;
        let hc = (c.high - prev_close).abs();
        let lc = (c.low - prev_close).abs();
        sum_tr += hl.max(hc).max(lc);
        prev_close = c.close;
    }
    sum_tr / take as f64
}

fn extremes(candles: &[Candle]) -> (f64, f64) {
    let mut high = f64::NEG_INFINITY;
    let mut low = f64::INFINITY;
    for c in candles {
        high = high.max(c.high);
        low = low.min(c.low);
    }
    (high, low)
}

/// Owns the candle ring and the four per-level state machines. Mutated only
/// from the orchestrator's single drive loop.
pub struct LevelEngine {
    config: LevelConfig,
    candles: CandleRing,
    levels: [LevelState; 4],
    last_price: f64,
}

impl LevelEngine {
    pub fn new(config: LevelConfig) -> Self {
        Self {
            levels: [
                LevelState::new(LevelName::H1High),
                LevelState::new(LevelName::H1Low),
                LevelState::new(LevelName::H4High),
                LevelState::new(LevelName::H4Low),
            ],
            candles: CandleRing::new(config.candle_interval_sec, config.candle_window),
            config,
            last_price: 0.0,
        }
    }

    /// Feed one trade into the candle ring. Recomputes H1/H4/ATR and
    /// refreshes scanning levels whenever a candle closes.
    pub fn push_trade(&mut self, ts_ms: i64, price: f64, amount: f64) {
        self.last_price = price;
        if self.candles.push_trade(ts_ms, price, amount).is_some() {
            self.recompute_levels();
        }
    }

    fn recompute_levels(&mut self) {
        let closed = self.candles.closed();
        if closed.is_empty() {
            return;
        }
        let all: Vec<Candle> = closed.iter().copied().collect();
        let (h4_high, h4_low) = extremes(&all);

        let h1_take = self.config.h1_lookback.min(all.len());
        let h1_slice = &all[all.len() - h1_take..];
        let (h1_high, h1_low) = extremes(h1_slice);

        self.levels[0].refresh(h1_high, h1_low);
        self.levels[1].refresh(h1_low, h1_high);
        self.levels[2].refresh(h4_high, h4_low);
        self.levels[3].refresh(h4_low, h4_high);
    }

    fn atr(&self) -> f64 {
        let all: Vec<Candle> = self.candles.closed().iter().copied().collect();
        compute_atr(&all, self.config.atr_period)
    }

    /// Advance all four hunter state machines by one tick; returns the
    /// first confirmed `SweepResult`, if any.
    pub fn check_hunt(&mut self, nofi: f64, now_ms: i64, hunter_cfg: &crate::config::HunterConfig) -> Option<SweepResult> {
        if self.last_price == 0.0 {
            return None;
        }
        sweep_hunter::advance_all(&mut self.levels, self.last_price, nofi, now_ms, hunter_cfg)
    }

    /// Current price, rolling levels, ATR, and an aggregate hunt summary —
    /// the payload for the dashboard pulse and `LEVEL_UPDATE` telemetry.
    pub fn level_info(&self) -> LevelInfo {
        let price = self.last_price;
        let h1_high = self.levels[0].level_price;
        let h1_low = self.levels[1].level_price;
        let h4_high = self.levels[2].level_price;
        let h4_low = self.levels[3].level_price;

        let nearest_high = match (h1_high > 0.0, h4_high > 0.0) {
            (true, true) => h1_high.min(h4_high),
            (true, false) => h1_high,
            (false, true) => h4_high,
            (false, false) => 0.0,
        };
        let nearest_low = match (h1_low > 0.0, h4_low > 0.0) {
            (true, true) => h1_low.max(h4_low),
            (true, false) => h1_low,
            (false, true) => h4_low,
            (false, false) => 0.0,
        };

        let high_distance_pct = if price > 0.0 && nearest_high > 0.0 {
            (nearest_high - price) / price * 100.0
        } else {
            0.0
        };
        let low_distance_pct = if price > 0.0 && nearest_low > 0.0 {
            (price - nearest_low) / price * 100.0
        } else {
            0.0
        };

        let sweep_status = self
            .levels
            .iter()
            .map(|l| format!("{}:{:?}", l.name, l.state))
            .collect::<Vec<_>>()
            .join(" ");

        LevelInfo {
            price,
            h1_high,
            h1_low,
            h4_high,
            h4_low,
            nearest_high,
            high_distance_pct,
            nearest_low,
            low_distance_pct,
            atr: self.atr(),
            sweep_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atr_seeds_prior_close_with_first_open() {
        let candles = vec![
            Candle { open_ts_ms: 0, open: 100.0, high: 102.0, low: 98.0, close: 101.0, volume: 1.0 },
            Candle { open_ts_ms: 60_000, open: 101.0, high: 104.0, low: 99.0, close: 103.0, volume: 1.0 },
        ];
        let atr = compute_atr(&candles, 14);
        // TR1 uses prevClose=100 (first open): max(4, |102-100|=2, |98-100|=2) = 4
        // TR2 uses prevClose=101: max(5, |104-101|=3, |99-101|=2) = 5
        assert!((atr - 4.5).abs() < 1e-9);
    }

    #[test]
    fn atr_empty_candles_is_zero() {
        assert_eq!(compute_atr(&[], 14), 0.0);
    }

    #[test]
    fn level_refresh_recomputes_on_candle_close() {
        let mut engine = LevelEngine::new(LevelConfig::default());
        engine.push_trade(0, 100.0, 1.0);
        engine.push_trade(60_000, 105.0, 1.0); // closes first candle
        assert_eq!(engine.levels[2].level_price, 100.0); // H4 high so far
    }

    #[test]
    fn check_hunt_returns_none_before_any_price() {
        let mut engine = LevelEngine::new(LevelConfig::default());
        let cfg = crate::config::HunterConfig::default();
        assert!(engine.check_hunt(0.8, 0, &cfg).is_none());
    }
}
