//! # Market Data
//!
//! Daily price histories and spot prices for portfolio tickers.
//!
//! ## Providers
//!
//! - `BTC-USD` → CoinGecko (`/coins/bitcoin/market_chart`, `/simple/price`)
//! - everything else → Brapi (`/quote/{ticker}` with the `.SA` suffix removed)
//!
//! Histories are cached for `cache_ttl_seconds` under
//! `stock_data:{ticker}:1y`. Brapi calls share a sliding-window limiter
//! and every fetch is retried with exponential backoff. Provider failures
//! never surface as errors: the caller gets `None` and the reason is logged.

use crate::config::MarketConfig;
use alm_core::primitives::CRYPTO_TICKER;
use alm_core::{
    AlmError, AlmStore, Database, PortfolioItem, PriceHistory, PricePoint, SlidingWindowLimiter,
    TtlCache, UserId, mock_allocation,
};
use chrono::DateTime;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// History period requested from the providers.
const HISTORY_PERIOD: &str = "1y";

/// Added to limiter waits so the oldest call has surely left the window.
const LIMITER_SLACK: Duration = Duration::from_millis(100);

/// Boxed future returned by `MarketData` methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of market prices.
pub trait MarketData: Send + Sync {
    /// Daily history of a ticker, oldest first. `None` when unavailable.
    fn history<'a>(&'a self, ticker: &'a str) -> BoxFuture<'a, Option<PriceHistory>>;

    /// Latest traded price of a ticker. `None` when unavailable.
    fn current_price<'a>(&'a self, ticker: &'a str) -> BoxFuture<'a, Option<f64>>;
}

// =============================================================================
// ERRORS
// =============================================================================

/// Failure of a single provider request.
#[derive(Debug)]
pub enum MarketError {
    /// Transport failure or timeout.
    Request(String),
    /// Provider answered with a non-success status.
    Status(u16),
    /// Body did not match the provider schema.
    Parse(String),
    /// Provider returned no usable data.
    Empty,
}

impl std::fmt::Display for MarketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(msg) => write!(f, "request failed: {msg}"),
            Self::Status(status) => write!(f, "provider returned HTTP {status}"),
            Self::Parse(msg) => write!(f, "unexpected payload: {msg}"),
            Self::Empty => write!(f, "empty payload"),
        }
    }
}

impl std::error::Error for MarketError {}

// =============================================================================
// PROVIDER PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize)]
struct BrapiResponse {
    #[serde(default)]
    results: Vec<BrapiQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrapiQuote {
    #[serde(default)]
    historical_data_price: Vec<BrapiBar>,
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct BrapiBar {
    /// Unix seconds.
    date: i64,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoChart {
    /// `[unix_millis, price]` pairs.
    #[serde(default)]
    prices: Vec<(f64, f64)>,
}

fn brapi_history(ticker: &str, body: BrapiResponse) -> Option<PriceHistory> {
    let quote = body.results.into_iter().next()?;
    let points: Vec<PricePoint> = quote
        .historical_data_price
        .into_iter()
        .filter_map(|bar| {
            let close = bar.close?;
            let date = DateTime::from_timestamp(bar.date, 0)?.date_naive();
            Some(PricePoint {
                date,
                open: bar.open.unwrap_or(close),
                high: bar.high.unwrap_or(close),
                low: bar.low.unwrap_or(close),
                close,
                volume: bar.volume.unwrap_or(0.0),
            })
        })
        .collect();
    (!points.is_empty()).then(|| PriceHistory::new(ticker, points))
}

fn coingecko_history(ticker: &str, body: CoinGeckoChart) -> Option<PriceHistory> {
    let points: Vec<PricePoint> = body
        .prices
        .into_iter()
        .filter_map(|(millis, close)| {
            let date = DateTime::from_timestamp_millis(millis as i64)?.date_naive();
            Some(PricePoint::close_only(date, close))
        })
        .collect();
    (!points.is_empty()).then(|| PriceHistory::new(ticker, points))
}

/// Brapi symbols drop the B3 `.SA` suffix.
fn brapi_symbol(ticker: &str) -> &str {
    ticker.strip_suffix(".SA").unwrap_or(ticker)
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// Market data fetched from Brapi and CoinGecko.
pub struct HttpMarketData {
    http: reqwest::Client,
    config: MarketConfig,
    cache: Mutex<TtlCache<PriceHistory>>,
    limiter: Mutex<SlidingWindowLimiter>,
}

impl std::fmt::Debug for HttpMarketData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMarketData")
            .field("brapi_base_url", &self.config.brapi_base_url)
            .field("coingecko_base_url", &self.config.coingecko_base_url)
            .finish_non_exhaustive()
    }
}

impl HttpMarketData {
    #[must_use]
    pub fn new(config: MarketConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            cache: Mutex::new(TtlCache::new(config.cache_ttl())),
            limiter: Mutex::new(SlidingWindowLimiter::new(
                config.brapi_rate_limit_calls,
                config.rate_limit_period(),
            )),
            config,
        }
    }

    fn cache_key(ticker: &str) -> String {
        format!("stock_data:{ticker}:{HISTORY_PERIOD}")
    }

    /// Drop expired cache entries. Returns how many were removed.
    pub async fn cleanup_cache(&self) -> usize {
        self.cache.lock().await.cleanup_expired()
    }

    /// Build a GET request with the Brapi bearer token when configured.
    fn brapi_request(&self, ticker: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/quote/{}", self.config.brapi_base_url, brapi_symbol(ticker));
        let mut req = self.http.get(url);
        if let Some(ref key) = self.config.brapi_api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Check status codes and parse JSON.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, MarketError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(MarketError::Status(status.as_u16()));
        }
        resp.json::<T>()
            .await
            .map_err(|e| MarketError::Parse(e.to_string()))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        req: reqwest::RequestBuilder,
    ) -> Result<T, MarketError> {
        let resp = req
            .send()
            .await
            .map_err(|e| MarketError::Request(e.to_string()))?;
        Self::handle_response(resp).await
    }

    /// Block until the Brapi window admits another call, then record it.
    async fn acquire_brapi_slot(&self, ticker: &str) {
        loop {
            let acquired = self.limiter.lock().await.try_acquire();
            let Err(wait) = acquired else {
                return;
            };
            tracing::info!(
                ticker,
                wait_secs = wait.as_secs_f64(),
                "Brapi rate limit reached, waiting"
            );
            tokio::time::sleep(wait + LIMITER_SLACK).await;
        }
    }

    async fn fetch_brapi_history(&self, ticker: &str) -> Result<PriceHistory, MarketError> {
        let req = self
            .brapi_request(ticker)
            .query(&[("range", HISTORY_PERIOD), ("interval", "1d")])
            .timeout(Duration::from_secs(self.config.history_timeout_secs));
        let body: BrapiResponse = Self::send(req).await?;
        brapi_history(ticker, body).ok_or(MarketError::Empty)
    }

    async fn fetch_coingecko_history(&self, ticker: &str) -> Result<PriceHistory, MarketError> {
        let url = format!("{}/coins/bitcoin/market_chart", self.config.coingecko_base_url);
        let req = self
            .http
            .get(url)
            .query(&[("vs_currency", "usd"), ("days", "365"), ("interval", "daily")])
            .timeout(Duration::from_secs(self.config.history_timeout_secs));
        let body: CoinGeckoChart = Self::send(req).await?;
        coingecko_history(ticker, body).ok_or(MarketError::Empty)
    }

    /// Fetch a history through the cache, limiter and retry loop.
    pub async fn fetch_history(&self, ticker: &str) -> Option<PriceHistory> {
        let key = Self::cache_key(ticker);
        if let Some(cached) = self.cache.lock().await.get(&key) {
            tracing::debug!(ticker, "Market data cache hit");
            return Some(cached);
        }

        let is_crypto = ticker == CRYPTO_TICKER;
        let retries = self.config.retries.max(1);
        for attempt in 0..retries {
            let result = if is_crypto {
                self.fetch_coingecko_history(ticker).await
            } else {
                self.acquire_brapi_slot(ticker).await;
                self.fetch_brapi_history(ticker).await
            };

            match result {
                Ok(history) => {
                    self.cache.lock().await.set(key, history.clone());
                    return Some(history);
                }
                Err(e) => tracing::warn!(
                    ticker,
                    attempt = attempt + 1,
                    retries,
                    error = %e,
                    "Market data fetch failed"
                ),
            }

            if attempt + 1 < retries {
                let backoff = self.config.retry_backoff_ms.saturating_mul(1 << attempt.min(16));
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }

        tracing::error!(ticker, retries, "All market data attempts failed");
        None
    }

    /// Fetch the latest price without caching or retries.
    pub async fn fetch_current_price(&self, ticker: &str) -> Result<f64, MarketError> {
        let timeout = Duration::from_secs(self.config.price_timeout_secs);
        if ticker == CRYPTO_TICKER {
            let url = format!("{}/simple/price", self.config.coingecko_base_url);
            let req = self
                .http
                .get(url)
                .query(&[("ids", "bitcoin"), ("vs_currencies", "usd")])
                .timeout(timeout);
            let body: serde_json::Value = Self::send(req).await?;
            body.get("bitcoin")
                .and_then(|b| b.get("usd"))
                .and_then(serde_json::Value::as_f64)
                .ok_or(MarketError::Empty)
        } else {
            let req = self.brapi_request(ticker).timeout(timeout);
            let body: BrapiResponse = Self::send(req).await?;
            body.results
                .into_iter()
                .next()
                .and_then(|q| q.regular_market_price)
                .ok_or(MarketError::Empty)
        }
    }
}

impl MarketData for HttpMarketData {
    fn history<'a>(&'a self, ticker: &'a str) -> BoxFuture<'a, Option<PriceHistory>> {
        Box::pin(self.fetch_history(ticker))
    }

    fn current_price<'a>(&'a self, ticker: &'a str) -> BoxFuture<'a, Option<f64>> {
        Box::pin(async move {
            match self.fetch_current_price(ticker).await {
                Ok(price) => Some(price),
                Err(e) => {
                    tracing::warn!(ticker, error = %e, "Current price unavailable");
                    None
                }
            }
        })
    }
}

// =============================================================================
// STATIC PROVIDER
// =============================================================================

/// Fixed histories, for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticMarketData {
    histories: HashMap<String, PriceHistory>,
}

impl StaticMarketData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_history(mut self, history: PriceHistory) -> Self {
        self.histories.insert(history.ticker.clone(), history);
        self
    }
}

impl MarketData for StaticMarketData {
    fn history<'a>(&'a self, ticker: &'a str) -> BoxFuture<'a, Option<PriceHistory>> {
        let found = self.histories.get(ticker).filter(|h| !h.is_empty()).cloned();
        Box::pin(async move { found })
    }

    fn current_price<'a>(&'a self, ticker: &'a str) -> BoxFuture<'a, Option<f64>> {
        let found = self.histories.get(ticker).and_then(PriceHistory::last_close);
        Box::pin(async move { found })
    }
}

// =============================================================================
// PORTFOLIO ASSEMBLY
// =============================================================================

/// Build the market-enriched portfolio of a user.
///
/// With `user = None` every catalog stock is listed with its mock
/// allocation. Tickers without market data are skipped.
pub async fn portfolio_items(
    db: &RwLock<Database>,
    market: &dyn MarketData,
    user: Option<UserId>,
) -> Result<Vec<PortfolioItem>, AlmError> {
    let needs_seed = db.read().await.all_stocks()?.is_empty();
    if needs_seed {
        let seeded = db.write().await.initialize_stocks()?;
        tracing::info!(count = seeded, "Seeded stock catalog");
    }

    let entries: Vec<(String, String, f64)> = {
        let db = db.read().await;
        match user {
            Some(id) => db
                .user_portfolio(id)?
                .into_iter()
                .map(|view| {
                    let name = view.stock_name.unwrap_or_else(|| view.holding.ticker.clone());
                    (view.holding.ticker, name, view.holding.allocation)
                })
                .collect(),
            None => db
                .all_stocks()?
                .into_iter()
                .map(|stock| {
                    let allocation = mock_allocation(&stock.ticker);
                    (stock.ticker, stock.name, allocation)
                })
                .collect(),
        }
    };

    let mut items = Vec::with_capacity(entries.len());
    for (ticker, name, allocation) in entries {
        match market.history(&ticker).await {
            Some(history) => {
                let item = PortfolioItem::from_history(&ticker, name, allocation, &history);
                items.extend(item);
            }
            None => tracing::warn!(ticker = %ticker, "Skipping ticker without market data"),
        }
    }
    Ok(items)
}

// =============================================================================
// TESTS
// =============================================================================
