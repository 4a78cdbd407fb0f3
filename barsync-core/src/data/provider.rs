//! Market-data provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over bar sources (Binance REST,
//! fixture providers in tests) so the pipeline can swap implementations
//! and run entirely against fakes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw OHLCV bar as returned by a provider, before partitioning.
///
/// The timestamp is kept as the provider-formatted string. Parsing happens
/// at the partition boundary, which drops rows whose stamp does not parse
/// and reports how many it dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Venue tag (e.g. `BINANCE:BTCUSD`). Dropped from emitted rows.
    pub symbol: Option<String>,
}

/// Bar interval supported by providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Hourly,
    FourHour,
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    /// Wire token understood by the klines endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Hourly => "1h",
            Interval::FourHour => "4h",
            Interval::Daily => "1d",
            Interval::Weekly => "1w",
            Interval::Monthly => "1M",
        }
    }
}

/// One fetch: symbol, venue, interval, and how many bars back from now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub symbol: String,
    pub exchange: String,
    pub interval: Interval,
    pub bar_count: usize,
    /// Pre/post-market bars on venues that distinguish sessions. Crypto
    /// venues trade one continuous session and ignore it.
    #[serde(default)]
    pub extended_session: bool,
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for market-data providers.
///
/// Failure modes (rate limits, auth, missing symbol) surface as `DataError`
/// and propagate; the pipeline layer adds no retry of its own.
pub trait MarketDataProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the most recent `bar_count` bars for the request, oldest first.
    fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawBar>, DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_wire_tokens() {
        assert_eq!(Interval::Daily.as_str(), "1d");
        assert_eq!(Interval::Monthly.as_str(), "1M");
        assert_eq!(Interval::FourHour.as_str(), "4h");
    }

    #[test]
    fn interval_serde_roundtrip() {
        let json = serde_json::to_string(&Interval::FourHour).unwrap();
        assert_eq!(json, "\"four_hour\"");
        let back: Interval = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Interval::FourHour);
    }
}
