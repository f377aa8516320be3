//! # Meridian API Client
//!
//! Upstream access for both modes of the engine: batched historical data
//! for scoring, and the exchange trading surface for live execution.
//!
//! ## Architectural Principles
//!
//! - **Traits at the seams:** higher layers consume `MarketDataClient` and
//!   `ExchangeClient`, never a concrete HTTP client, so tests substitute
//!   deterministic fakes.
//! - **Shared discipline:** every remote call funnels through one
//!   `RateLimiter` per upstream, transient failures go through
//!   `RetryingClient`, and history fetches are memoized by `DataCache`
//!   with its two-tier (TTL + calendar-day) validity rule.

use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use configuration::DataSettings;
use core_types::{MarketBar, OrderSide};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod cache;
pub mod error;
pub mod rate_limiter;
pub mod responses;
pub mod retry;

// --- Public API ---
pub use cache::{CacheEntry, DataCache};
pub use rate_limiter::RateLimiter;
pub use responses::{BalanceResponse, BookTicker, HoldingResponse, OrderAck, OrderState};
pub use retry::RetryingClient;

/// The abstract interface for historical market data.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Fetches daily bars for a set of symbols over a UTC date range.
    /// Implementations batch, rate-limit and cache as they see fit; the
    /// returned bars are validated and sorted by (symbol, date).
    async fn fetch_daily_bars(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MarketBar>, ApiError>;
}

/// The abstract interface for the exchange trading API.
///
/// This trait is the contract the live engine and the order executors
/// program against, allowing the underlying implementation (live or mock)
/// to be swapped out.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fetches the current best bid/ask for a symbol.
    async fn book_ticker(&self, symbol: &str) -> Result<BookTicker, ApiError>;

    /// Places a limit order; price and size are already rounded to the
    /// instrument's native precision by the caller.
    async fn place_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<OrderAck, ApiError>;

    /// Places a marketable order for immediate completion.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<OrderAck, ApiError>;

    /// Cancels an open order, returning its final state (including any
    /// quantity that filled before the cancel landed).
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<OrderAck, ApiError>;

    /// Queries the current state of an order.
    async fn order_status(&self, symbol: &str, order_id: &str) -> Result<OrderAck, ApiError>;

    /// Fetches the current account balances.
    async fn balances(&self) -> Result<Vec<BalanceResponse>, ApiError>;

    /// Fetches all open positions.
    async fn open_positions(&self) -> Result<Vec<HoldingResponse>, ApiError>;
}

/// Converts an HTTP response into either its JSON body or a classified
/// `ApiError`, preserving any Retry-After hint for the retry layer.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::Status {
            code: status.as_u16(),
            body,
            retry_after,
        });
    }
    serde_json::from_str::<T>(&body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// A concrete `MarketDataClient` backed by a batched REST history API.
///
/// Requests go out in chunks of at most `batch_size` symbols, each chunk
/// passing through the shared rate limiter and the retrying client, and
/// each response landing in the cache keyed by its exact query.
pub struct RestDataClient {
    client: reqwest::Client,
    settings: DataSettings,
    limiter: RateLimiter,
    retrier: RetryingClient,
    cache: DataCache,
}

impl RestDataClient {
    pub fn new(
        settings: DataSettings,
        limiter: RateLimiter,
        cache: DataCache,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.api_timeout_secs))
            .build()?;
        let retrier = RetryingClient::new(settings.retry.clone());
        Ok(Self {
            client,
            settings,
            limiter,
            retrier,
            cache,
        })
    }

    fn cache_key(symbols: &[String], start: NaiveDate, end: NaiveDate) -> String {
        format!("bars:1d:{}:{start}:{end}", symbols.join(","))
    }

    async fn fetch_chunk(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}/v1/history", self.settings.base_url);
        let joined = symbols.join(",");
        self.retrier
            .call(|| async {
                // Every attempt consumes its own grant; a retry must not
                // slip past the upstream allowance.
                self.limiter.acquire().await;
                let response = self
                    .client
                    .get(&url)
                    .query(&[
                        ("symbols", joined.as_str()),
                        ("interval", "1d"),
                        ("start", &start.to_string()),
                        ("end", &end.to_string()),
                    ])
                    .send()
                    .await?;
                read_json::<serde_json::Value>(response).await
            })
            .await
    }
}

#[async_trait]
impl MarketDataClient for RestDataClient {
    async fn fetch_daily_bars(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MarketBar>, ApiError> {
        // A range that reaches into today must be refreshed today; fully
        // historical ranges may be served across calendar days.
        let same_day_required = end >= Utc::now().date_naive();
        let ttl = Duration::from_secs(self.settings.cache_ttl_secs);

        let mut bars: Vec<MarketBar> = Vec::new();
        for chunk in symbols.chunks(self.settings.batch_size) {
            let key = Self::cache_key(chunk, start, end);
            let payload = self
                .cache
                .get(&key, ttl, same_day_required, || {
                    self.fetch_chunk(chunk, start, end)
                })
                .await?;
            let chunk_bars: Vec<MarketBar> = serde_json::from_value(payload)
                .map_err(|e| ApiError::Deserialization(e.to_string()))?;
            for bar in &chunk_bars {
                bar.validate()
                    .map_err(|e| ApiError::InvalidData(e.to_string()))?;
            }
            bars.extend(chunk_bars);
        }

        bars.sort_by(|a, b| (&a.symbol, a.date).cmp(&(&b.symbol, b.date)));
        Ok(bars)
    }
}

/// A concrete `ExchangeClient` over a plain REST trading API.
pub struct RestExchangeClient {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

impl RestExchangeClient {
    pub fn new(
        base_url: String,
        api_key: &str,
        timeout: Duration,
        limiter: RateLimiter,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-API-KEY",
            HeaderValue::from_str(api_key)
                .map_err(|_| ApiError::InvalidData("API key is not a valid header".to_string()))?,
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            limiter,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.limiter.acquire().await;
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        read_json(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        self.limiter.acquire().await;
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl ExchangeClient for RestExchangeClient {
    async fn book_ticker(&self, symbol: &str) -> Result<BookTicker, ApiError> {
        self.get("/v1/ticker", &[("symbol", symbol.to_string())])
            .await
    }

    async fn place_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<OrderAck, ApiError> {
        self.post(
            "/v1/order",
            &serde_json::json!({
                "symbol": symbol,
                "side": side,
                "type": "LIMIT",
                "price": price,
                "quantity": quantity,
            }),
        )
        .await
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<OrderAck, ApiError> {
        self.post(
            "/v1/order",
            &serde_json::json!({
                "symbol": symbol,
                "side": side,
                "type": "MARKET",
                "quantity": quantity,
            }),
        )
        .await
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<OrderAck, ApiError> {
        self.post(
            "/v1/order/cancel",
            &serde_json::json!({ "symbol": symbol, "orderId": order_id }),
        )
        .await
    }

    async fn order_status(&self, symbol: &str, order_id: &str) -> Result<OrderAck, ApiError> {
        self.get(
            "/v1/order",
            &[
                ("symbol", symbol.to_string()),
                ("orderId", order_id.to_string()),
            ],
        )
        .await
    }

    async fn balances(&self) -> Result<Vec<BalanceResponse>, ApiError> {
        self.get("/v1/balances", &[]).await
    }

    async fn open_positions(&self) -> Result<Vec<HoldingResponse>, ApiError> {
        self.get("/v1/positions", &[]).await
    }
}
