// =============================================================================
// Engine configuration — an explicit struct built once at startup
// =============================================================================
//
// Replaces the source's global logger + scattered `os.getenv` calls with a
// single typed struct assembled in `EngineConfig::from_env`. Every field has
// a default matching the source so a bare `.env`-less run behaves the same
// as the original bot.

use serde::{Deserialize, Serialize};

fn default_symbol() -> String {
    "BTC/USDT".to_string()
}

fn default_account_balance() -> f64 {
    10_000.0
}

fn default_paper_balance() -> f64 {
    10_000.0
}

fn default_zscore_threshold() -> f64 {
    2.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImbalanceConfig {
    #[serde(default = "default_nofi_window_sec")]
    pub nofi_window_sec: f64,
    #[serde(default = "default_volume_window_min")]
    pub volume_window_min: f64,
    #[serde(default = "default_zscore_threshold")]
    pub zscore_threshold: f64,
    #[serde(default = "default_absorption_nofi_min")]
    pub absorption_nofi_min: f64,
    #[serde(default = "default_absorption_eff_max")]
    pub absorption_eff_max: f64,
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
}

fn default_nofi_window_sec() -> f64 {
    60.0
}
fn default_volume_window_min() -> f64 {
    20.0
}
fn default_absorption_nofi_min() -> f64 {
    0.4
}
fn default_absorption_eff_max() -> f64 {
    1e-4
}
fn default_max_buffer_size() -> usize {
    50_000
}

impl Default for ImbalanceConfig {
    fn default() -> Self {
        Self {
            nofi_window_sec: default_nofi_window_sec(),
            volume_window_min: default_volume_window_min(),
            zscore_threshold: default_zscore_threshold(),
            absorption_nofi_min: default_absorption_nofi_min(),
            absorption_eff_max: default_absorption_eff_max(),
            max_buffer_size: default_max_buffer_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelConfig {
    #[serde(default = "default_candle_interval_sec")]
    pub candle_interval_sec: i64,
    #[serde(default = "default_candle_window")]
    pub candle_window: usize,
    #[serde(default = "default_h1_lookback")]
    pub h1_lookback: usize,
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
}

fn default_candle_interval_sec() -> i64 {
    60
}
fn default_candle_window() -> usize {
    240
}
fn default_h1_lookback() -> usize {
    60
}
fn default_atr_period() -> usize {
    14
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            candle_interval_sec: default_candle_interval_sec(),
            candle_window: default_candle_window(),
            h1_lookback: default_h1_lookback(),
            atr_period: default_atr_period(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HunterConfig {
    #[serde(default = "default_buffer_zone_pct")]
    pub buffer_zone_pct: f64,
    #[serde(default = "default_nofi_threshold")]
    pub nofi_threshold: f64,
    #[serde(default = "default_sweep_timeout_sec")]
    pub sweep_timeout_sec: i64,
    #[serde(default = "default_confirm_timeout_sec")]
    pub confirm_timeout_sec: i64,
    #[serde(default = "default_cooldown_sec")]
    pub cooldown_sec: i64,
}

fn default_buffer_zone_pct() -> f64 {
    0.0005
}
fn default_nofi_threshold() -> f64 {
    0.7
}
fn default_sweep_timeout_sec() -> i64 {
    60
}
fn default_confirm_timeout_sec() -> i64 {
    30
}
fn default_cooldown_sec() -> i64 {
    1800
}

impl Default for HunterConfig {
    fn default() -> Self {
        Self {
            buffer_zone_pct: default_buffer_zone_pct(),
            nofi_threshold: default_nofi_threshold(),
            sweep_timeout_sec: default_sweep_timeout_sec(),
            confirm_timeout_sec: default_confirm_timeout_sec(),
            cooldown_sec: default_cooldown_sec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_account_balance")]
    pub account_balance: f64,
    #[serde(default = "default_max_account_risk_pct")]
    pub max_account_risk_pct: f64,
    #[serde(default = "default_max_daily_loss_pct")]
    pub max_daily_loss_pct: f64,
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
    #[serde(default = "default_max_volatility_zscore")]
    pub max_volatility_zscore: f64,
    #[serde(default = "default_max_spread_pct")]
    pub max_spread_pct: f64,
    #[serde(default = "default_reward_risk_ratio")]
    pub reward_risk_ratio: f64,
    #[serde(default = "default_min_order_qty")]
    pub min_order_qty: f64,
}

fn default_max_account_risk_pct() -> f64 {
    0.01
}
fn default_max_daily_loss_pct() -> f64 {
    0.03
}
fn default_max_consecutive_losses() -> u32 {
    3
}
fn default_max_volatility_zscore() -> f64 {
    4.0
}
fn default_max_spread_pct() -> f64 {
    0.001
}
fn default_reward_risk_ratio() -> f64 {
    2.0
}
fn default_min_order_qty() -> f64 {
    0.001
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            account_balance: default_account_balance(),
            max_account_risk_pct: default_max_account_risk_pct(),
            max_daily_loss_pct: default_max_daily_loss_pct(),
            max_consecutive_losses: default_max_consecutive_losses(),
            max_volatility_zscore: default_max_volatility_zscore(),
            max_spread_pct: default_max_spread_pct(),
            reward_risk_ratio: default_reward_risk_ratio(),
            min_order_qty: default_min_order_qty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_paper_balance")]
    pub paper_balance: f64,
    #[serde(default = "default_commission_pct")]
    pub commission_pct: f64,
}

fn default_commission_pct() -> f64 {
    0.0005
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            paper_balance: default_paper_balance(),
            commission_pct: default_commission_pct(),
        }
    }
}

/// The whole engine's runtime configuration, assembled once in `main` and
/// shared by reference with every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default)]
    pub paper_trading: bool,
    #[serde(default)]
    pub imbalance: ImbalanceConfig,
    #[serde(default)]
    pub level: LevelConfig,
    #[serde(default)]
    pub hunter: HunterConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            paper_trading: true,
            imbalance: ImbalanceConfig::default(),
            level: LevelConfig::default(),
            hunter: HunterConfig::default(),
            risk: RiskConfig::default(),
            broker: BrokerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Build configuration from environment variables, falling back to the
    /// source's defaults for anything unset. Mirrors `PAPER_TRADING`,
    /// `ACCOUNT_BALANCE`, `PAPER_BALANCE`, `ZSCORE_THRESHOLD` plus the
    /// `--symbol` CLI argument.
    pub fn from_env(symbol_arg: Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(symbol) = symbol_arg {
            cfg.symbol = symbol;
        }

        cfg.paper_trading = std::env::var("PAPER_TRADING")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        if let Ok(v) = std::env::var("ACCOUNT_BALANCE") {
            if let Ok(parsed) = v.parse() {
                cfg.risk.account_balance = parsed;
            }
        }
        if let Ok(v) = std::env::var("PAPER_BALANCE") {
            if let Ok(parsed) = v.parse() {
                cfg.broker.paper_balance = parsed;
            }
        }
        if let Ok(v) = std::env::var("ZSCORE_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                cfg.imbalance.zscore_threshold = parsed;
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.symbol, "BTC/USDT");
        assert!(cfg.paper_trading);
        assert_eq!(cfg.risk.account_balance, 10_000.0);
        assert_eq!(cfg.risk.max_daily_loss_pct, 0.03);
        assert_eq!(cfg.hunter.cooldown_sec, 1800);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbol, "BTC/USDT");
        assert_eq!(cfg.imbalance.max_buffer_size, 50_000);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"symbol":"ETH/USDT","risk":{"account_balance":5000.0}}"#)
                .unwrap();
        assert_eq!(cfg.symbol, "ETH/USDT");
        assert_eq!(cfg.risk.account_balance, 5000.0);
        assert_eq!(cfg.risk.max_consecutive_losses, 3);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.symbol, cfg.symbol);
        assert_eq!(back.risk.account_balance, cfg.risk.account_balance);
    }
}
