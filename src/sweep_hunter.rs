// =============================================================================
// Sweep Hunter — four parallel per-level stop-hunt state machines.
// =============================================================================
//
// SCANNING -> SWEEPING -> CONFIRMING -> COOLDOWN -> SCANNING. Polled once per
// tick by the Level Engine, which owns the `LevelState` instances; this
// module only contains the pure transition logic (no external mutation).

use crate::config::HunterConfig;
use crate::types::{HunterState, LevelName, Side, SweepResult};

/// Mutable state for a single tracked level. Owned exclusively by the Level
/// Engine; `level_price`/`opposite_price` are refreshed only while SCANNING.
#[derive(Debug, Clone, Copy)]
pub struct LevelState {
    pub name: LevelName,
    pub is_high: bool,
    pub state: HunterState,
    pub level_price: f64,
    pub opposite_price: f64,
    pub wick_extreme: f64,
    pub sweep_start_ts: i64,
    pub cooldown_until_ts: i64,
}

impl LevelState {
    pub fn new(name: LevelName) -> Self {
        Self {
            name,
            is_high: name.is_high(),
            state: HunterState::Scanning,
            level_price: 0.0,
            opposite_price: 0.0,
            wick_extreme: 0.0,
            sweep_start_ts: 0,
            cooldown_until_ts: 0,
        }
    }

    /// Update `level_price`/`opposite_price` — no-op unless SCANNING, per
    /// the rule that active hunts pin their level.
    pub fn refresh(&mut self, level_price: f64, opposite_price: f64) {
        if matches!(self.state, HunterState::Scanning) {
            self.level_price = level_price;
            self.opposite_price = opposite_price;
        }
    }

    fn range_high(&self) -> f64 {
        self.level_price.max(self.opposite_price)
    }

    fn range_low(&self) -> f64 {
        self.level_price.min(self.opposite_price)
    }

    fn fib_tp(&self) -> f64 {
        self.range_low() + 0.5 * (self.range_high() - self.range_low())
    }

    fn result(&self, side: Side) -> SweepResult {
        SweepResult {
            side,
            strength: "HIGH",
            level_name: self.name,
            level_price: self.level_price,
            wick_extreme: self.wick_extreme,
            fib_tp: self.fib_tp(),
            range_high: self.range_high(),
            range_low: self.range_low(),
        }
    }

    /// Advance this level's state machine by one tick. Returns a
    /// `SweepResult` iff this tick confirmed a hunt.
    fn tick(&mut self, price: f64, nofi: f64, now_ms: i64, cfg: &HunterConfig) -> Option<SweepResult> {
        let buf = price * cfg.buffer_zone_pct;
        let sweep_timeout_ms = cfg.sweep_timeout_sec * 1000;
        let confirm_timeout_ms = (cfg.sweep_timeout_sec + cfg.confirm_timeout_sec) * 1000;
        let cooldown_ms = cfg.cooldown_sec * 1000;

        // The high/low cases are mirror images of each other: "beyond the
        // level" means `>` for a high level and `<` for a low one. Flip the
        // comparison once instead of duplicating the whole match.
        let sign = if self.is_high { 1.0 } else { -1.0 };
        let beyond = |price: f64, level: f64| sign * (price - level) > 0.0;
        let past_buffer = |price: f64, level: f64| sign * (price - (level + sign * buf)) > 0.0;
        let extends = |price: f64, extreme: f64| sign * (price - extreme) > 0.0;
        let snapped_back = |price: f64, level: f64| !beyond(price, level);
        let confirm_side = if self.is_high { Side::Sell } else { Side::Buy };
        let confirm_nofi_hit = |nofi: f64| sign * nofi <= -cfg.nofi_threshold;

        match self.state {
            HunterState::Scanning => {
                if past_buffer(price, self.level_price) {
                    self.state = HunterState::Sweeping;
                    self.sweep_start_ts = now_ms;
                    self.wick_extreme = price;
                }
                None
            }
            HunterState::Sweeping => {
                if now_ms - self.sweep_start_ts > sweep_timeout_ms {
                    self.state = HunterState::Scanning;
                } else if snapped_back(price, self.level_price) {
                    self.state = HunterState::Confirming;
                } else if extends(price, self.wick_extreme) {
                    self.wick_extreme = price;
                }
                None
            }
            HunterState::Confirming => {
                if now_ms - self.sweep_start_ts > confirm_timeout_ms {
                    self.state = HunterState::Scanning;
                    None
                } else if past_buffer(price, self.level_price) {
                    self.state = HunterState::Sweeping;
                    self.wick_extreme = price;
                    None
                } else if confirm_nofi_hit(nofi) {
                    let out = self.result(confirm_side);
                    self.state = HunterState::Cooldown;
                    self.cooldown_until_ts = now_ms + cooldown_ms;
                    Some(out)
                } else {
                    None
                }
            }
            HunterState::Cooldown => {
                if now_ms >= self.cooldown_until_ts {
                    self.state = HunterState::Scanning;
                }
                None
            }
        }
    }
}

/// Advance all four levels in fixed order (H1_High, H1_Low, H4_High,
/// H4_Low), returning the first confirmed result this tick. Levels after
/// the first hit still advance on the *next* tick, not this one.
pub fn advance_all(
    levels: &mut [LevelState; 4],
    price: f64,
    nofi: f64,
    now_ms: i64,
    cfg: &HunterConfig,
) -> Option<SweepResult> {
    let mut found = None;
    for level in levels.iter_mut() {
        let r = level.tick(price, nofi, now_ms, cfg);
        if found.is_none() {
            found = r;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_levels() -> [LevelState; 4] {
        [
            LevelState::new(LevelName::H1High),
            LevelState::new(LevelName::H1Low),
            LevelState::new(LevelName::H4High),
            LevelState::new(LevelName::H4Low),
        ]
    }

    /// S3 — H4 High sweep confirmation -> SELL.
    #[test]
    fn s3_h4_high_sweep_confirms_sell() {
        let cfg = HunterConfig::default();
        let mut levels = four_levels();
        levels[2].level_price = 100.0;
        levels[2].opposite_price = 90.0;

        let r1 = advance_all(&mut levels, 100.10, 0.1, 0, &cfg);
        assert!(r1.is_none());
        assert_eq!(levels[2].state, HunterState::Sweeping);
        assert_eq!(levels[2].wick_extreme, 100.10);

        let r2 = advance_all(&mut levels, 99.95, 0.0, 5_000, &cfg);
        assert!(r2.is_none());
        assert_eq!(levels[2].state, HunterState::Confirming);

        let r3 = advance_all(&mut levels, 99.80, -0.80, 10_000, &cfg);
        let sweep = r3.expect("expected confirmed sweep");
        assert_eq!(sweep.side, Side::Sell);
        assert_eq!(sweep.level_name, LevelName::H4High);
        assert_eq!(sweep.level_price, 100.0);
        assert_eq!(sweep.wick_extreme, 100.10);
        assert_eq!(sweep.range_high, 100.0);
        assert_eq!(sweep.range_low, 90.0);
        assert_eq!(sweep.fib_tp, 95.0);
        assert_eq!(levels[2].state, HunterState::Cooldown);
    }

    #[test]
    fn low_level_sweep_confirms_buy() {
        let cfg = HunterConfig::default();
        let mut levels = four_levels();
        levels[3].level_price = 90.0;
        levels[3].opposite_price = 100.0;

        advance_all(&mut levels, 89.90, -0.1, 0, &cfg);
        assert_eq!(levels[3].state, HunterState::Sweeping);

        advance_all(&mut levels, 90.05, 0.0, 5_000, &cfg);
        assert_eq!(levels[3].state, HunterState::Confirming);

        let r3 = advance_all(&mut levels, 90.20, 0.80, 10_000, &cfg);
        let sweep = r3.expect("expected confirmed sweep");
        assert_eq!(sweep.side, Side::Buy);
        assert_eq!(sweep.level_name, LevelName::H4Low);
    }

    #[test]
    fn level_price_pinned_while_not_scanning() {
        let mut level = LevelState::new(LevelName::H4High);
        level.refresh(100.0, 90.0);
        level.state = HunterState::Sweeping;
        level.refresh(105.0, 95.0);
        assert_eq!(level.level_price, 100.0);
        assert_eq!(level.opposite_price, 90.0);
    }

    #[test]
    fn sweeping_times_out_back_to_scanning() {
        let cfg = HunterConfig::default();
        let mut levels = four_levels();
        levels[2].level_price = 100.0;
        levels[2].opposite_price = 90.0;
        advance_all(&mut levels, 100.10, 0.0, 0, &cfg);
        assert_eq!(levels[2].state, HunterState::Sweeping);
        advance_all(&mut levels, 100.20, 0.0, 61_000, &cfg);
        assert_eq!(levels[2].state, HunterState::Scanning);
    }

    #[test]
    fn confirming_times_out_back_to_scanning() {
        let cfg = HunterConfig::default();
        let mut levels = four_levels();
        levels[2].level_price = 100.0;
        levels[2].opposite_price = 90.0;
        advance_all(&mut levels, 100.10, 0.0, 0, &cfg);
        advance_all(&mut levels, 99.95, 0.0, 5_000, &cfg);
        assert_eq!(levels[2].state, HunterState::Confirming);
        advance_all(&mut levels, 99.95, 0.0, 91_000, &cfg);
        assert_eq!(levels[2].state, HunterState::Scanning);
    }

    /// Re-breaking out of CONFIRMING resets wick_extreme to the current
    /// price unconditionally, even if it's less extreme than the prior
    /// excursion.
    #[test]
    fn rebreak_resets_wick_extreme_unconditionally() {
        let cfg = HunterConfig::default();
        let mut levels = four_levels();
        levels[2].level_price = 100.0;
        levels[2].opposite_price = 90.0;

        advance_all(&mut levels, 100.20, 0.0, 0, &cfg);
        assert_eq!(levels[2].wick_extreme, 100.20);

        advance_all(&mut levels, 99.95, 0.0, 5_000, &cfg);
        assert_eq!(levels[2].state, HunterState::Confirming);

        advance_all(&mut levels, 100.06, 0.0, 6_000, &cfg);
        assert_eq!(levels[2].state, HunterState::Sweeping);
        assert_eq!(levels[2].wick_extreme, 100.06);
    }

    #[test]
    fn fib_tp_is_range_midpoint() {
        let mut level = LevelState::new(LevelName::H1High);
        level.level_price = 100.0;
        level.opposite_price = 80.0;
        assert_eq!(level.fib_tp(), 90.0);
        assert!(level.range_low() <= level.fib_tp());
        assert!(level.fib_tp() <= level.range_high());
    }
}
