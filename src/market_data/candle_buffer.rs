// =============================================================================
// Candle synthesis — incremental OHLCV bars built from the trade tape.
// =============================================================================

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// A single OHLCV bar. `open_ts_ms` is floored to the candle interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub open_ts_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    fn open_at(open_ts_ms: i64, price: f64, amount: f64) -> Self {
        Self {
            open_ts_ms,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: amount,
        }
    }

    fn update(&mut self, price: f64, amount: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += amount;
    }
}

/// Bounded ring of closed candles plus the in-progress one.
///
/// Owned exclusively by the Level Engine; never shared or mutated from
/// outside its `push_trade` / `current` / `closed` API.
pub struct CandleRing {
    interval_ms: i64,
    max_closed: usize,
    closed: VecDeque<Candle>,
    current: Option<Candle>,
}

/// Returned by `push_trade` when a trade finalizes the in-progress candle,
/// so the caller (Level Engine) knows to recompute levels/ATR.
pub struct CloseEvent;

impl CandleRing {
    pub fn new(interval_sec: i64, max_closed: usize) -> Self {
        Self {
            interval_ms: interval_sec * 1000,
            max_closed,
            closed: VecDeque::with_capacity(max_closed.min(1024)),
            current: None,
        }
    }

    /// Feed one trade. Returns `Some(CloseEvent)` iff this trade finalized
    /// the previous bucket's candle.
    pub fn push_trade(&mut self, ts_ms: i64, price: f64, amount: f64) -> Option<CloseEvent> {
        let bucket = (ts_ms / self.interval_ms) * self.interval_ms;

        match &mut self.current {
            Some(c) if c.open_ts_ms == bucket => {
                c.update(price, amount);
                None
            }
            Some(c) => {
                let finished = *c;
                self.closed.push_back(finished);
                while self.closed.len() > self.max_closed {
                    self.closed.pop_front();
                }
                self.current = Some(Candle::open_at(bucket, price, amount));
                Some(CloseEvent)
            }
            None => {
                self.current = Some(Candle::open_at(bucket, price, amount));
                None
            }
        }
    }

    pub fn current(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    pub fn closed(&self) -> &VecDeque<Candle> {
        &self.closed
    }

    pub fn len(&self) -> usize {
        self.closed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closed.is_empty()
    }
}
