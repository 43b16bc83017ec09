// =============================================================================
// External collaborator contracts — exchange streaming client (trade tape,
// ticker, OHLCV). Out of core scope; only the boundary is owned here.
// =============================================================================

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};

use crate::types::{Side, Trade};

/// Delivers trade batches for a single symbol. Implementations suspend only
/// at the stream-read boundary; everything downstream is synchronous.
#[async_trait::async_trait]
pub trait TradeFeed: Send {
    async fn next_batch(&mut self) -> Result<Vec<Trade>>;
}

/// Fetches best bid/ask on demand. A thin read, not an order-entry client —
/// real order execution is out of scope for this engine.
#[async_trait::async_trait]
pub trait TickerSource: Send + Sync {
    async fn ticker(&self, symbol: &str) -> Result<(f64, f64)>;
}

fn stream_url(symbol: &str) -> String {
    format!(
        "wss://stream.binance.com:9443/ws/{}@aggTrade",
        symbol.to_lowercase()
    )
}

fn parse_agg_trade(text: &str) -> Result<Trade> {
    let v: Value = serde_json::from_str(text).context("parsing aggTrade payload")?;
    let price: f64 = v["p"].as_str().context("missing price")?.parse()?;
    let amount: f64 = v["q"].as_str().context("missing quantity")?.parse()?;
    let timestamp_ms = v["T"].as_i64().context("missing trade time")?;
    let is_buyer_maker = v["m"].as_bool().unwrap_or(false);
    // A buyer-maker trade was filled by an aggressive seller; aggressor side
    // is the opposite of the maker flag, matching the source's convention.
    let side = if is_buyer_maker { Side::Sell } else { Side::Buy };
    Ok(Trade { timestamp_ms, side, price, amount })
}

/// WebSocket-backed trade feed with reconnect-with-backoff, capped at 5
/// retries before propagating a fatal error per the concurrency model.
pub struct BinanceTradeFeed {
    symbol: String,
    retry: u32,
}

impl BinanceTradeFeed {
    pub fn new(symbol: &str) -> Self {
        Self { symbol: symbol.replace('/', "").to_lowercase(), retry: 0 }
    }

    async fn connect(&self) -> Result<
        futures_util::stream::SplitStream<
            tokio_tungstenite::WebSocketStream<
                tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
            >,
        >,
    > {
        let url = stream_url(&self.symbol);
        let (ws, _) = connect_async(&url).await.context("connecting to trade stream")?;
        let (_, read) = ws.split();
        Ok(read)
    }
}

#[async_trait::async_trait]
impl TradeFeed for BinanceTradeFeed {
    async fn next_batch(&mut self) -> Result<Vec<Trade>> {
        loop {
            let mut read = match self.connect().await {
                Ok(r) => {
                    self.retry = 0;
                    r
                }
                Err(e) => {
                    self.retry += 1;
                    if self.retry > 5 {
                        return Err(e.context("exceeded max reconnect attempts"));
                    }
                    let backoff = 2u64.pow(self.retry.min(5));
                    warn!(retry = self.retry, backoff, "trade stream reconnecting");
                    tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
                    continue;
                }
            };

            match read.next().await {
                Some(Ok(tokio_tungstenite::tungstenite::Message::Text(text))) => {
                    match parse_agg_trade(&text) {
                        Ok(trade) => return Ok(vec![trade]),
                        Err(e) => {
                            warn!(error = %e, "dropping unparseable trade message");
                            continue;
                        }
                    }
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "trade stream read error, reconnecting");
                    continue;
                }
                None => {
                    warn!("trade stream closed, reconnecting");
                    continue;
                }
            }
        }
    }
}

/// Public-endpoint ticker fetch — no signing required, matching the
/// `{symbol, last, bid, ask, volume}` contract of the original exchange
/// client (`ExchangeClient.get_market_data`).
pub struct BinanceTickerSource {
    client: reqwest::Client,
}

impl Default for BinanceTickerSource {
    fn default() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait::async_trait]
impl TickerSource for BinanceTickerSource {
    async fn ticker(&self, symbol: &str) -> Result<(f64, f64)> {
        let pair = symbol.replace('/', "").to_uppercase();
        let url = format!("https://api.binance.com/api/v3/ticker/bookTicker?symbol={pair}");
        let resp: Value = self
            .client
            .get(&url)
            .send()
            .await
            .context("fetching ticker")?
            .json()
            .await
            .context("decoding ticker response")?;
        let bid: f64 = resp["bidPrice"].as_str().context("missing bidPrice")?.parse()?;
        let ask: f64 = resp["askPrice"].as_str().context("missing askPrice")?.parse()?;
        Ok((bid, ask))
    }
}

/// Deterministic in-memory feed used by orchestrator tests.
pub struct ReplayFeed {
    batches: std::collections::VecDeque<Vec<Trade>>,
}

impl ReplayFeed {
    pub fn new(batches: Vec<Vec<Trade>>) -> Self {
        Self { batches: batches.into() }
    }
}

#[async_trait::async_trait]
impl TradeFeed for ReplayFeed {
    async fn next_batch(&mut self) -> Result<Vec<Trade>> {
        match self.batches.pop_front() {
            Some(batch) => Ok(batch),
            None => std::future::pending().await,
        }
    }
}

/// Fixed bid/ask used by orchestrator tests.
pub struct FixedTicker(pub f64, pub f64);

#[async_trait::async_trait]
impl TickerSource for FixedTicker {
    async fn ticker(&self, _symbol: &str) -> Result<(f64, f64)> {
        Ok((self.0, self.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_agg_trade_buy_side() {
        let text = r#"{"p":"100.5","q":"0.01","T":1690000000000,"m":false}"#;
        let t = parse_agg_trade(text).unwrap();
        assert_eq!(t.side, Side::Buy);
        assert_eq!(t.price, 100.5);
    }

    #[test]
    fn parses_agg_trade_sell_side_from_buyer_maker() {
        let text = r#"{"p":"100.5","q":"0.01","T":1690000000000,"m":true}"#;
        let t = parse_agg_trade(text).unwrap();
        assert_eq!(t.side, Side::Sell);
    }

    #[test]
    fn stream_url_lowercases_symbol() {
        assert_eq!(stream_url("BTCUSDT"), "wss://stream.binance.com:9443/ws/btcusdt@aggTrade");
    }
}
