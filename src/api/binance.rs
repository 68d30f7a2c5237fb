use anyhow::{Context, Result};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::models::Candle;

const BINANCE_FAPI_BASE: &str = "https://fapi.binance.com";
const RATE_LIMIT_RPM: u32 = 240; // Stays well inside the futures REST weight budget
const MAX_RETRIES: u32 = 3;
/// Hard cap Binance puts on a single klines request.
const MAX_KLINES_PER_REQUEST: usize = 1500;

// Type alias for the rate limiter to simplify signatures
type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// One kline row as /fapi/v1/klines returns it: integer times, prices and
/// volumes as strings.
type KlineRow = (
    i64,    // open time (ms)
    String, // open
    String, // high
    String, // low
    String, // close
    String, // volume
    i64,    // close time (ms)
    String, // quote asset volume
    i64,    // number of trades
    String, // taker buy base volume
    String, // taker buy quote volume
    String, // unused field
);

/// Binance USDⓈ-M futures market data client with rate limiting.
///
/// Klines are public endpoints, so no API key is involved. The struct is
/// cloneable; clones share the same rate limiter.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<BinanceRateLimiter>,
}

impl BinanceFuturesClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BINANCE_FAPI_BASE)
    }

    /// Build a client against a different base URL (mock servers in tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let quota = Quota::per_minute(NonZeroU32::new(RATE_LIMIT_RPM).unwrap());
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            client,
            base_url: base_url.into(),
            rate_limiter,
        })
    }

    /// Make a rate-limited API request with retry logic
    async fn make_request(&self, url: &str) -> Result<reqwest::Response> {
        for attempt in 1..=MAX_RETRIES {
            // Wait for rate limiter
            self.rate_limiter.until_ready().await;

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    // 429 is the rate limit warning, 418 the follow-up IP ban
                    if status.as_u16() == 429 || status.as_u16() == 418 {
                        let backoff_secs = 2u64.pow(attempt);
                        tracing::warn!(
                            "Rate limited by Binance ({}), backing off for {}s (attempt {}/{})",
                            status,
                            backoff_secs,
                            attempt,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                        continue;
                    }

                    if status.is_server_error() {
                        let backoff_secs = 2u64.pow(attempt);
                        tracing::warn!(
                            "Server error {} from Binance, retrying in {}s (attempt {}/{})",
                            status,
                            backoff_secs,
                            attempt,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                        continue;
                    }

                    // Other errors (4xx) - don't retry
                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    anyhow::bail!("Binance API error ({}): {}", status, error_text);
                }
                Err(e) if attempt < MAX_RETRIES => {
                    let backoff_secs = 2u64.pow(attempt);
                    tracing::warn!(
                        "Network error: {}, retrying in {}s (attempt {}/{})",
                        e,
                        backoff_secs,
                        attempt,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                }
                Err(e) => anyhow::bail!("Network error after {} retries: {}", MAX_RETRIES, e),
            }
        }

        anyhow::bail!("Failed after {} retries", MAX_RETRIES)
    }

    /// Fetch one page of klines, newest last.
    ///
    /// `end_time` is exclusive of anything newer; `None` means the newest
    /// available bars. `limit` is clamped to what Binance accepts.
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        end_time: Option<i64>,
    ) -> Result<Vec<Candle>> {
        let limit = limit.min(MAX_KLINES_PER_REQUEST);
        let mut url = format!(
            "{}/fapi/v1/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );
        if let Some(end) = end_time {
            url.push_str(&format!("&endTime={}", end));
        }

        let response = self.make_request(&url).await?;

        let rows: Vec<KlineRow> = response.json().await.context("Failed to parse klines")?;

        rows.iter()
            .map(parse_kline)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Bad kline data for {} {}", symbol, interval))
    }

    /// Fetch up to `limit` historical bars for a symbol, oldest first.
    ///
    /// Pages backwards from the newest bar in 1500-bar requests until the
    /// limit is reached or the listing history runs out.
    pub async fn get_historical_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        self.paged_klines(symbol, interval, limit, MAX_KLINES_PER_REQUEST)
            .await
    }

    async fn paged_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
        page_size: usize,
    ) -> Result<Vec<Candle>> {
        let mut pages: Vec<Vec<Candle>> = Vec::new();
        let mut remaining = limit;
        let mut end_time: Option<i64> = None;

        while remaining > 0 {
            let want = remaining.min(page_size);
            let page = self.get_klines(symbol, interval, want, end_time).await?;
            if page.is_empty() {
                break;
            }

            tracing::debug!(
                "Fetched {} {} bars for {} (up to {:?})",
                page.len(),
                interval,
                symbol,
                end_time
            );

            remaining -= page.len().min(remaining);
            // Next page ends just before the oldest bar we have
            end_time = Some(page[0].open_time - 1);
            let exhausted = page.len() < want;
            pages.push(page);
            if exhausted {
                break;
            }
        }

        // Pages were fetched newest-first; flatten back to ascending order
        pages.reverse();
        let candles: Vec<Candle> = pages.into_iter().flatten().collect();

        tracing::info!(
            "Fetched {} {} bars for {} ({} requested)",
            candles.len(),
            interval,
            symbol,
            limit
        );

        Ok(candles)
    }
}

fn parse_kline(row: &KlineRow) -> Result<Candle> {
    Ok(Candle {
        open_time: row.0,
        open: row.1.parse().context("bad open price")?,
        high: row.2.parse().context("bad high price")?,
        low: row.3.parse().context("bad low price")?,
        close: row.4.parse().context("bad close price")?,
        volume: row.5.parse().context("bad volume")?,
    })
}
