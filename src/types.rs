// =============================================================================
// Shared data types for the liquidity-sweep detection & trade-gating engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Which side of the book a trade or signal sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// A single trade as delivered by the exchange streaming client.
///
/// Chronological, duplicates allowed, jitter of up to a few seconds tolerated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp_ms: i64,
    pub side: Side,
    pub price: f64,
    pub amount: f64,
}

/// Directional label derived from nOFI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Bullish => write!(f, "BULLISH"),
            Trend::Bearish => write!(f, "BEARISH"),
            Trend::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Coarse status label attached to a `MarketMetrics` reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Monitoring,
    SignalDetected,
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketStatus::Monitoring => write!(f, "MONITORING"),
            MarketStatus::SignalDetected => write!(f, "SIGNAL_DETECTED"),
        }
    }
}

/// Order-flow statistics recomputed from the trade ring on every tick.
/// Never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketMetrics {
    pub nofi: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub efficiency: f64,
    pub volume_zscore: f64,
    pub is_significant: bool,
    pub is_absorption: bool,
    pub trend: Trend,
    pub status: MarketStatus,
}

impl MarketMetrics {
    /// The all-zero reading returned while the trade ring is empty.
    pub fn empty() -> Self {
        Self {
            nofi: 0.0,
            buy_volume: 0.0,
            sell_volume: 0.0,
            efficiency: 0.0,
            volume_zscore: 0.0,
            is_significant: false,
            is_absorption: false,
            trend: Trend::Neutral,
            status: MarketStatus::Monitoring,
        }
    }
}

/// Which of the four tracked levels a `LevelState` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelName {
    H1High,
    H1Low,
    H4High,
    H4Low,
}

impl LevelName {
    pub fn is_high(self) -> bool {
        matches!(self, LevelName::H1High | LevelName::H4High)
    }
}

impl std::fmt::Display for LevelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelName::H1High => write!(f, "H1_High"),
            LevelName::H1Low => write!(f, "H1_Low"),
            LevelName::H4High => write!(f, "H4_High"),
            LevelName::H4Low => write!(f, "H4_Low"),
        }
    }
}

/// Per-level stop-hunt state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HunterState {
    Scanning,
    Sweeping,
    Confirming,
    Cooldown,
}

/// Result emitted by the Sweep Hunter when a stop-hunt is confirmed.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SweepResult {
    pub side: Side,
    pub strength: &'static str,
    pub level_name: LevelName,
    pub level_price: f64,
    pub wick_extreme: f64,
    pub fib_tp: f64,
    pub range_high: f64,
    pub range_low: f64,
}

/// A strategy-level proposal, before risk gating.
#[derive(Debug, Clone, Serialize)]
pub struct TradeSignal {
    pub side: Side,
    pub strength: &'static str,
    pub reason: String,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub timestamp_ms: i64,
    pub metadata: SignalMetadata,
}

/// Fields carried alongside a `TradeSignal` for telemetry/logging context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalMetadata {
    pub level_name: LevelName,
    pub level_price: f64,
    pub wick_extreme: f64,
    pub fib_tp: f64,
    pub range_high: f64,
    pub range_low: f64,
}

/// An order the Risk Gatekeeper has approved for the Paper Broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedOrder {
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub position_size: f64,
    pub reason: String,
    pub timestamp_ms: i64,
}

/// Why a `PaperPosition` was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeResult {
    Win,
    Loss,
}

impl std::fmt::Display for TradeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeResult::Win => write!(f, "WIN"),
            TradeResult::Loss => write!(f, "LOSS"),
        }
    }
}

/// An open simulated position held by the Paper Broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperPosition {
    pub id: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub size: f64,
    pub reason: String,
    pub open_ts_ms: i64,
}

/// A `PaperPosition` after it has been closed by the Position Monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub position: PaperPosition,
    pub exit_price: f64,
    pub pnl: f64,
    pub result: TradeResult,
    pub close_ts_ms: i64,
}

/// Point-in-time snapshot of the Risk Gatekeeper's internal bookkeeping,
/// exposed for telemetry and dashboard consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    pub account_balance: f64,
    pub volatility_halted: bool,
    pub current_day: String,
    pub daily_pnl: f64,
    pub consecutive_losses: u32,
    pub daily_halted: bool,
}

/// Current price, rolling levels, and a human-readable hunt summary —
/// the payload consumed by the dashboard pulse and the `LEVEL_UPDATE`
/// telemetry event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelInfo {
    pub price: f64,
    pub h1_high: f64,
    pub h1_low: f64,
    pub h4_high: f64,
    pub h4_low: f64,
    pub nearest_high: f64,
    pub high_distance_pct: f64,
    pub nearest_low: f64,
    pub low_distance_pct: f64,
    pub atr: f64,
    pub sweep_status: String,
}

/// Aggregate statistics maintained by the Paper Broker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BrokerStats {
    pub win_rate_pct: f64,
    pub profit_factor: f64,
    pub max_drawdown_pct: f64,
    pub total_trades: u64,
    pub net_pnl: f64,
    pub virtual_balance: f64,
    pub active_positions: usize,
}

/// Telemetry events the core fires at the `TelemetrySink` boundary.
/// Fire-and-forget — publish failures never affect control flow.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum TelemetryEvent {
    MarketPulse {
        symbol: String,
        nofi: f64,
        volume_zscore: f64,
        efficiency: f64,
        trend: Trend,
        is_absorption: bool,
        price: f64,
        atr: f64,
    },
    LevelUpdate {
        symbol: String,
        h1_high: f64,
        h1_low: f64,
        h4_high: f64,
        h4_low: f64,
        near_liquidity: f64,
        hunt_summary: String,
    },
    SignalGen {
        side: Side,
        strength: &'static str,
        price: f64,
        stop_loss: f64,
        take_profit: f64,
        reason: String,
    },
    TradeUpdate {
        action: &'static str,
        id: String,
        pair: String,
        side: Side,
        entry_price: f64,
    },
}
