//! Binance klines provider.
//!
//! Fetches OHLCV bars from the public spot REST API. The endpoint caps a
//! single page at 1000 bars, so larger requests walk backward from the
//! newest bar one page at a time and stitch the pages together oldest-first.

use std::time::Duration;

use super::provider::{DataError, FetchRequest, MarketDataProvider, RawBar};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const KLINES_PATH: &str = "/api/v3/klines";
const PAGE_LIMIT: usize = 1000;

/// Timestamp format emitted for downstream partitioning and CSV output.
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// One kline as the endpoint returns it: a heterogeneous JSON array of
/// `[open_time_ms, open, high, low, close, volume, close_time_ms, ...]`
/// where prices and volume arrive as decimal strings.
type KlineRow = Vec<serde_json::Value>;

/// Binance spot market-data provider.
pub struct BinanceProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl BinanceProvider {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Point the provider at a different host (tests, regional mirrors).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch one page of klines ending at `end_time_ms` (newest page when None).
    fn fetch_page(
        &self,
        request: &FetchRequest,
        limit: usize,
        end_time_ms: Option<i64>,
    ) -> Result<Vec<KlineRow>, DataError> {
        let url = format!("{}{}", self.base_url, KLINES_PATH);
        let limit = limit.to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("symbol", request.symbol.as_str()),
            ("interval", request.interval.as_str()),
            ("limit", limit.as_str()),
        ];
        let end_time;
        if let Some(ms) = end_time_ms {
            end_time = ms.to_string();
            query.push(("endTime", end_time.as_str()));
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            match self.client.get(&url).query(&query).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(DataError::AuthenticationRequired(format!(
                            "HTTP {status} from {}",
                            self.base_url
                        )));
                    }

                    if status == reqwest::StatusCode::BAD_REQUEST {
                        // The venue reports unknown symbols as error code -1121.
                        let body = resp.text().unwrap_or_default();
                        if body.contains("-1121") {
                            return Err(DataError::SymbolNotFound {
                                symbol: request.symbol.clone(),
                            });
                        }
                        return Err(DataError::Other(format!("HTTP 400: {body}")));
                    }

                    if !status.is_success() {
                        last_error = Some(DataError::Other(format!(
                            "HTTP {status} for {}",
                            request.symbol
                        )));
                        continue;
                    }

                    return resp.json::<Vec<KlineRow>>().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse klines for {}: {e}",
                            request.symbol
                        ))
                    });
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketDataProvider for BinanceProvider {
    fn name(&self) -> &str {
        "binance"
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawBar>, DataError> {
        // Continuous-session venue: `extended_session` has nothing to select.
        let mut pages: Vec<Vec<RawBar>> = Vec::new();
        let mut remaining = request.bar_count;
        let mut end_time_ms: Option<i64> = None;

        while remaining > 0 {
            let limit = remaining.min(PAGE_LIMIT);
            let rows = self.fetch_page(request, limit, end_time_ms)?;
            if rows.is_empty() {
                break;
            }

            let page_start_ms = rows
                .first()
                .and_then(|row| row.first())
                .and_then(|v| v.as_i64())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged("kline row without open time".into())
                })?;

            let page = parse_klines(request, &rows)?;
            let got = page.len();
            remaining = remaining.saturating_sub(got);
            end_time_ms = Some(page_start_ms - 1);
            pages.push(page);

            // A short page means the venue's history is exhausted.
            if got < limit {
                break;
            }
        }

        // Pages were collected newest-first; flatten back to oldest-first.
        pages.reverse();
        Ok(pages.into_iter().flatten().collect())
    }
}

/// Parse one page of kline rows into raw bars, oldest first.
fn parse_klines(request: &FetchRequest, rows: &[KlineRow]) -> Result<Vec<RawBar>, DataError> {
    let tag = format!("{}:{}", request.exchange, request.symbol);
    let mut bars = Vec::with_capacity(rows.len());

    for row in rows {
        if row.len() < 6 {
            return Err(DataError::ResponseFormatChanged(format!(
                "kline row with {} fields (want at least 6)",
                row.len()
            )));
        }

        let open_time_ms = row[0]
            .as_i64()
            .ok_or_else(|| DataError::ResponseFormatChanged("non-integer open time".into()))?;

        bars.push(RawBar {
            timestamp: format_timestamp(open_time_ms),
            open: decimal_field(&row[1], "open")?,
            high: decimal_field(&row[2], "high")?,
            low: decimal_field(&row[3], "low")?,
            close: decimal_field(&row[4], "close")?,
            volume: decimal_field(&row[5], "volume")?,
            symbol: Some(tag.clone()),
        });
    }

    Ok(bars)
}

/// Epoch millis → naive UTC stamp. An out-of-range epoch is passed through
/// raw for the partitioner to drop and count.
fn format_timestamp(open_time_ms: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(open_time_ms) {
        Some(dt) => dt.naive_utc().format(TIMESTAMP_FMT).to_string(),
        None => open_time_ms.to_string(),
    }
}

/// Prices and volume arrive as decimal strings ("43250.01000000").
fn decimal_field(value: &serde_json::Value, name: &str) -> Result<f64, DataError> {
    value
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| value.as_f64())
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("bad {name} field: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::Interval;

    fn sample_request() -> FetchRequest {
        FetchRequest {
            symbol: "BTCUSD".into(),
            exchange: "BINANCE".into(),
            interval: Interval::Daily,
            bar_count: 2,
            extended_session: false,
        }
    }

    fn kline(open_time_ms: i64, open: &str, close: &str) -> KlineRow {
        serde_json::from_value(serde_json::json!([
            open_time_ms,
            open,
            "43500.0",
            "42800.0",
            close,
            "1234.5",
            open_time_ms + 86_399_999,
            "0",
            100,
            "0",
            "0",
            "0"
        ]))
        .unwrap()
    }

    #[test]
    fn parses_kline_page() {
        // 2024-01-02T00:00:00Z
        let rows = vec![kline(1_704_153_600_000, "42900.1", "43111.5")];
        let bars = parse_klines(&sample_request(), &rows).unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, "2024-01-02 00:00:00");
        assert_eq!(bars[0].open, 42900.1);
        assert_eq!(bars[0].close, 43111.5);
        assert_eq!(bars[0].volume, 1234.5);
        assert_eq!(bars[0].symbol.as_deref(), Some("BINANCE:BTCUSD"));
    }

    #[test]
    fn rejects_short_rows() {
        let rows = vec![vec![serde_json::json!(1_704_153_600_000_i64)]];
        let err = parse_klines(&sample_request(), &rows).unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn out_of_range_epoch_passes_through_raw() {
        // The partitioner drops this stamp later; the provider must not panic.
        assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
    }

    #[test]
    fn decimal_fields_accept_numbers_and_strings() {
        assert_eq!(decimal_field(&serde_json::json!("1.5"), "open").unwrap(), 1.5);
        assert_eq!(decimal_field(&serde_json::json!(2.5), "open").unwrap(), 2.5);
        assert!(decimal_field(&serde_json::json!(null), "open").is_err());
    }
}
