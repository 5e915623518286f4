use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use lq_endpoints::AccessTier;
use lq_endpoints::EndpointDescriptor;
use lq_endpoints::EndpointRegistry;
use lq_endpoints::Operation;
use lq_endpoints::Timeframe;
use lq_endpoints::exchange;
use lq_ratelimit::RateLimitError;
use lq_ratelimit::RateLimiter;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::circuit_breaker::CircuitBreaker;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::client::HttpClient;
use crate::client::HttpClientConfig;
use crate::errors::HttpError;
use crate::errors::Result;
use crate::exceptions;
use crate::sign;
use crate::sign::Credentials;
use crate::sign::Params;
use crate::sign::SignedRequest;

const DEFAULT_LIST_LIMIT: u32 = 1000;
const DEFAULT_ORDERS_LIMIT: u32 = 50;
const DEFAULT_OHLCV_LIMIT: u32 = 500;

/// What to do when the rate limiter has no room for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitMode {
    /// Wait until the cost fits
    #[default]
    Wait,
    /// Fail with `RateLimitExceeded`
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
        }
    }
}

/// Parameters of a `createOrder` call
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: Option<f64>,
    pub price: Option<f64>,
    /// Spend this much of the quote currency instead of a base amount
    pub quote_amount: Option<f64>,
}

impl OrderRequest {
    pub fn limit(symbol: impl Into<String>, side: OrderSide, amount: f64, price: f64) -> Self {
        Self { symbol: symbol.into(), order_type: OrderType::Limit, side, amount: Some(amount), price: Some(price), quote_amount: None }
    }

    pub fn market(symbol: impl Into<String>, side: OrderSide, amount: f64) -> Self {
        Self { symbol: symbol.into(), order_type: OrderType::Market, side, amount: Some(amount), price: None, quote_amount: None }
    }

    /// Market order sized in the quote currency
    pub fn market_quote(symbol: impl Into<String>, side: OrderSide, quote_amount: f64) -> Self {
        Self { symbol: symbol.into(), order_type: OrderType::Market, side, amount: None, price: None, quote_amount: Some(quote_amount) }
    }

    pub fn to_params(&self) -> Params {
        Params::new()
            .with("symbol", &self.symbol)
            .with("type", self.order_type.as_str())
            .with("side", self.side.as_str())
            .with_opt("amount", self.amount)
            .with_opt("price", self.price)
            .with_opt("quoteAmount", self.quote_amount)
    }
}

/// Liqi REST client
///
/// Every call goes through the same pipeline: registry lookup, circuit
/// breaker, rate limiter charge of the endpoint cost, signing for private
/// endpoints, then error mapping of the reply.
pub struct LiqiClient {
    client: HttpClient,
    registry: &'static EndpointRegistry,
    base_url: String,
    rate_limiter: Arc<dyn RateLimiter>,
    rate_limit_mode: RateLimitMode,
    circuit_breaker: Arc<CircuitBreaker>,
    credentials: Option<Credentials>,
    recv_window_ms: u64,
    time_difference_ms: i64,
    /// Set once a signed request succeeds
    authenticated: AtomicBool,
}

impl LiqiClient {
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> LiqiClientBuilder {
        LiqiClientBuilder::default()
    }

    pub fn registry(&self) -> &'static EndpointRegistry {
        self.registry
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.rate_limiter
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Whether a signed request has succeeded on this client
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Call an endpoint by any of its keys (`fetchTicker`, `publicGetFetchTicker`, `public_get_fetchticker`)
    pub async fn request(&self, key: &str, params: Params) -> Result<Value> {
        let endpoint = self.registry.lookup(key).ok_or_else(|| HttpError::UnknownOperation(key.to_string()))?;
        self.dispatch(endpoint, params).await
    }

    /// Call an endpoint by operation
    pub async fn call(&self, operation: Operation, params: Params) -> Result<Value> {
        self.dispatch(self.registry.get(operation), params).await
    }

    async fn dispatch(&self, endpoint: &'static EndpointDescriptor, params: Params) -> Result<Value> {
        if endpoint.tier.requires_signature() && self.credentials.is_none() {
            return Err(HttpError::AuthenticationFailed(format!("{} requires apiKey and secret", endpoint.name())));
        }

        let result = self
            .circuit_breaker
            .call_async(|| async {
                self.charge(endpoint).await?;

                let request = sign::build_request(
                    &self.base_url,
                    endpoint,
                    &params,
                    self.credentials.as_ref(),
                    sign::nonce(self.time_difference_ms),
                    self.recv_window_ms,
                )?;

                tracing::debug!(
                    operation = endpoint.name(),
                    tier = %endpoint.tier,
                    method = %endpoint.method,
                    cost = endpoint.cost.get(),
                    "dispatching request"
                );

                self.send(endpoint, request).await
            })
            .await;

        match &result {
            Err(HttpError::CircuitBreakerOpen) => tracing::warn!(operation = endpoint.name(), "circuit open, request rejected"),
            Err(HttpError::Exchange { kind, message }) => tracing::warn!(operation = endpoint.name(), %kind, detail = %message, "exchange rejected request"),
            _ => {}
        }

        result
    }

    async fn charge(&self, endpoint: &EndpointDescriptor) -> Result<()> {
        match self.rate_limit_mode {
            RateLimitMode::Wait => self.rate_limiter.charge(endpoint).await?,
            RateLimitMode::FailFast => self.rate_limiter.try_charge(endpoint).map_err(|err| match err {
                RateLimitError::Exceeded => HttpError::RateLimitExceeded,
                other => HttpError::RateLimiter(other),
            })?,
        }
        Ok(())
    }

    async fn send(&self, endpoint: &EndpointDescriptor, request: SignedRequest) -> Result<Value> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|err| self.transport_error(err))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| self.transport_error(err))?;

        tracing::trace!(operation = endpoint.name(), status, bytes = body.len(), "response received");

        exceptions::check_response(status, &body, self.is_authenticated())?;

        if endpoint.tier == AccessTier::Private {
            self.authenticated.store(true, Ordering::Release);
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn transport_error(&self, err: reqwest::Error) -> HttpError {
        if err.is_timeout() {
            HttpError::Timeout(self.client.config().request_timeout)
        } else {
            HttpError::RequestFailed(err)
        }
    }

    pub async fn fetch_market(&self, symbol: &str) -> Result<Value> {
        require(Operation::FetchMarket, "symbol", symbol)?;
        self.call(Operation::FetchMarket, Params::new().with("symbol", symbol)).await
    }

    pub async fn fetch_markets(&self) -> Result<Value> {
        self.call(Operation::FetchMarkets, Params::new()).await
    }

    pub async fn fetch_currencies(&self, limit: Option<u32>) -> Result<Value> {
        let params = Params::new().with("limit", limit.unwrap_or(DEFAULT_LIST_LIMIT));
        self.call(Operation::FetchCurrencies, params).await
    }

    pub async fn fetch_tickers(&self, limit: Option<u32>) -> Result<Value> {
        let params = Params::new().with("limit", limit.unwrap_or(DEFAULT_LIST_LIMIT));
        self.call(Operation::FetchTickers, params).await
    }

    pub async fn fetch_ticker(&self, symbol: &str) -> Result<Value> {
        require(Operation::FetchTicker, "symbol", symbol)?;
        self.call(Operation::FetchTicker, Params::new().with("symbol", symbol)).await
    }

    pub async fn fetch_order_book(&self, symbol: &str) -> Result<Value> {
        require(Operation::FetchOrderBook, "symbol", symbol)?;
        self.call(Operation::FetchOrderBook, Params::new().with("symbol", symbol)).await
    }

    /// Candles, `1m` and 500 rows unless given
    pub async fn fetch_ohlcv(&self, symbol: &str, timeframe: Option<Timeframe>, limit: Option<u32>) -> Result<Value> {
        require(Operation::FetchOhlcv, "symbol", symbol)?;
        let params = Params::new()
            .with("symbol", symbol)
            .with("interval", timeframe.unwrap_or_default())
            .with("limit", limit.unwrap_or(DEFAULT_OHLCV_LIMIT));
        self.call(Operation::FetchOhlcv, params).await
    }

    pub async fn fetch_balance(&self) -> Result<Value> {
        self.call(Operation::FetchBalance, Params::new()).await
    }

    pub async fn fetch_my_orders(&self, symbol: Option<&str>, limit: Option<u32>) -> Result<Value> {
        let params = Params::new().with_opt("symbol", symbol.filter(|symbol| !symbol.is_empty())).with_opt("limit", limit);
        self.call(Operation::FetchMyOrders, params).await
    }

    pub async fn fetch_orders(&self, symbol: &str, limit: Option<u32>) -> Result<Value> {
        require(Operation::FetchOrders, "symbol", symbol)?;
        let params = Params::new().with("symbol", symbol).with("limit", limit.unwrap_or(DEFAULT_ORDERS_LIMIT));
        self.call(Operation::FetchOrders, params).await
    }

    /// `since` is a millisecond timestamp, omitted when `None`
    pub async fn fetch_open_orders(&self, symbol: &str, since: Option<i64>, limit: Option<u32>) -> Result<Value> {
        require(Operation::FetchOpenOrders, "symbol", symbol)?;
        let params =
            Params::new().with_opt("since", since).with("symbol", symbol).with("limit", limit.unwrap_or(DEFAULT_ORDERS_LIMIT));
        self.call(Operation::FetchOpenOrders, params).await
    }

    /// `fetch_orders` narrowed to orders whose status is `closed`
    pub async fn fetch_closed_orders(&self, symbol: &str, limit: Option<u32>) -> Result<Value> {
        require(Operation::FetchClosedOrders, "symbol", symbol)?;
        let orders = self.fetch_orders(symbol, limit).await?;
        Ok(filter_by_status(orders, "closed"))
    }

    pub async fn fetch_order(&self, id: &str) -> Result<Value> {
        require(Operation::FetchOrder, "id", id)?;
        self.call(Operation::FetchOrder, Params::new().with("id", id)).await
    }

    pub async fn fetch_trades(&self, symbol: &str, limit: Option<u32>) -> Result<Value> {
        require(Operation::FetchTrades, "symbol", symbol)?;
        let params = Params::new().with("symbol", symbol).with_opt("limit", limit);
        self.call(Operation::FetchTrades, params).await
    }

    pub async fn create_order(&self, order: &OrderRequest) -> Result<Value> {
        require(Operation::CreateOrder, "symbol", &order.symbol)?;
        if order.amount.is_none() && order.quote_amount.is_none() {
            return Err(HttpError::ArgumentsRequired { operation: Operation::CreateOrder.name(), argument: "amount" });
        }
        if order.order_type == OrderType::Limit && order.price.is_none() {
            return Err(HttpError::ArgumentsRequired { operation: Operation::CreateOrder.name(), argument: "price" });
        }
        self.call(Operation::CreateOrder, order.to_params()).await
    }

    pub async fn cancel_order(&self, id: &str) -> Result<Value> {
        require(Operation::CancelOrder, "id", id)?;
        self.call(Operation::CancelOrder, Params::new().with("id", id)).await
    }

    pub async fn cancel_all_orders(&self, symbol: &str) -> Result<Value> {
        require(Operation::CancelAllOrders, "symbol", symbol)?;
        self.call(Operation::CancelAllOrders, Params::new().with("symbol", symbol)).await
    }
}

fn require(operation: Operation, argument: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(HttpError::ArgumentsRequired { operation: operation.name(), argument });
    }
    Ok(())
}

/// Keep the orders whose `status` equals `status`
///
/// Objects keyed by order id are flattened into a list first.
pub fn filter_by_status(orders: Value, status: &str) -> Value {
    let entries = match orders {
        Value::Array(entries) => entries,
        Value::Object(map) => map.into_iter().map(|(_, order)| order).collect(),
        _ => Vec::new(),
    };

    Value::Array(entries.into_iter().filter(|order| order.get("status").and_then(Value::as_str) == Some(status)).collect())
}

/// Builder for configuring the Liqi client
pub struct LiqiClientBuilder {
    http_config: HttpClientConfig,
    base_url: String,
    rate_limit_ms: u64,
    rate_limit_mode: RateLimitMode,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    circuit_breaker_config: CircuitBreakerConfig,
    api_key: Option<String>,
    secret: Option<String>,
    recv_window_ms: u64,
    time_difference_ms: i64,
}

impl Default for LiqiClientBuilder {
    fn default() -> Self {
        Self {
            http_config: HttpClientConfig::default(),
            base_url: exchange::PUBLIC_API_URL.to_string(),
            rate_limit_ms: exchange::RATE_LIMIT_MS,
            rate_limit_mode: RateLimitMode::default(),
            rate_limiter: None,
            circuit_breaker_config: CircuitBreakerConfig::default(),
            api_key: None,
            secret: None,
            recv_window_ms: exchange::DEFAULT_RECV_WINDOW_MS,
            time_difference_ms: 0,
        }
    }
}

impl LiqiClientBuilder {
    /// Point at another deployment, e.g. a local mock
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn http_config(mut self, config: HttpClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Spacing between weight-1 requests in milliseconds
    pub fn rate_limit_ms(mut self, rate_limit_ms: u64) -> Self {
        self.rate_limit_ms = rate_limit_ms;
        self
    }

    pub fn rate_limit_mode(mut self, mode: RateLimitMode) -> Self {
        self.rate_limit_mode = mode;
        self
    }

    /// Share a limiter between clients; overrides `rate_limit_ms`
    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker_config = config;
        self
    }

    /// API key and hex encoded Ed25519 secret for private endpoints
    pub fn credentials(mut self, api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self.secret = Some(secret.into());
        self
    }

    pub fn recv_window_ms(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }

    /// Local clock minus exchange clock, subtracted from every nonce
    pub fn time_difference_ms(mut self, time_difference_ms: i64) -> Self {
        self.time_difference_ms = time_difference_ms;
        self
    }

    /// Short timeouts and a quick-opening circuit
    pub fn low_latency(mut self) -> Self {
        self.http_config = HttpClientConfig::low_latency();
        self.circuit_breaker_config = CircuitBreakerConfig::aggressive();
        self.rate_limit_mode = RateLimitMode::FailFast;
        self
    }

    pub fn build(self) -> Result<LiqiClient> {
        let client = HttpClient::with_config(self.http_config)?;

        let rate_limiter = match self.rate_limiter {
            Some(limiter) => limiter,
            None => Arc::new(lq_ratelimit::exchanges::liqi::rest_limits_with_interval(self.rate_limit_ms)?),
        };

        let credentials = match (self.api_key, self.secret) {
            (Some(api_key), Some(secret)) => Some(Credentials::new(api_key, &secret)?),
            (None, None) => None,
            _ => return Err(HttpError::AuthenticationFailed("apiKey and secret must be set together".into())),
        };

        Ok(LiqiClient {
            client,
            registry: EndpointRegistry::liqi(),
            base_url: self.base_url,
            rate_limiter,
            rate_limit_mode: self.rate_limit_mode,
            circuit_breaker: Arc::new(CircuitBreaker::with_config(self.circuit_breaker_config)),
            credentials,
            recv_window_ms: self.recv_window_ms,
            time_difference_ms: self.time_difference_ms,
            authenticated: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use lq_ratelimit::TokenBucket;
    use serde_json::json;

    use super::*;

    const SECRET: &str = "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb";

    // Nothing listens on the discard port; tests below must fail before I/O
    fn offline_builder() -> LiqiClientBuilder {
        LiqiClient::builder().base_url("http://127.0.0.1:9")
    }

    #[test]
    fn test_builder_default() {
        let builder = LiqiClientBuilder::default();
        assert_eq!(builder.base_url, exchange::PUBLIC_API_URL);
        assert_eq!(builder.rate_limit_ms, 50);
        assert_eq!(builder.recv_window_ms, 5000);
        assert_eq!(builder.rate_limit_mode, RateLimitMode::Wait);
    }

    #[test]
    fn test_builder_low_latency() {
        let builder = LiqiClientBuilder::default().low_latency();
        assert_eq!(builder.rate_limit_mode, RateLimitMode::FailFast);
        assert_eq!(builder.circuit_breaker_config.minimum_requests, 5);
    }

    #[test]
    fn test_build_with_credentials() {
        let client = LiqiClient::builder().credentials("key", SECRET).build().unwrap();
        assert!(client.has_credentials());
        assert!(!client.is_authenticated());
        assert_eq!(client.rate_limiter().capacity(), 1000);
    }

    #[test]
    fn test_build_rejects_bad_secret() {
        assert!(matches!(LiqiClient::builder().credentials("key", "not-hex").build(), Err(HttpError::Signing(_))));
    }

    #[test]
    fn test_build_rejects_zero_interval() {
        assert!(matches!(LiqiClient::builder().rate_limit_ms(0).build(), Err(HttpError::RateLimiter(RateLimitError::InvalidConfig(_)))));
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let client = offline_builder().build().unwrap();

        let result = client.request("fetchDeposits", Params::new()).await;
        assert!(matches!(result, Err(HttpError::UnknownOperation(key)) if key == "fetchDeposits"));
        assert_eq!(client.circuit_breaker().stats().total_requests, 0);
    }

    #[tokio::test]
    async fn test_missing_arguments_fail_before_charge() {
        let client = offline_builder().credentials("key", SECRET).build().unwrap();
        let available = client.rate_limiter().available();

        assert!(matches!(client.fetch_orders("", None).await, Err(HttpError::ArgumentsRequired { operation: "fetchOrders", argument: "symbol" })));
        assert!(matches!(client.fetch_open_orders(" ", None, None).await, Err(HttpError::ArgumentsRequired { argument: "symbol", .. })));
        assert!(matches!(client.fetch_order("").await, Err(HttpError::ArgumentsRequired { operation: "fetchOrder", argument: "id" })));
        assert!(matches!(client.cancel_order("").await, Err(HttpError::ArgumentsRequired { argument: "id", .. })));
        assert!(matches!(client.cancel_all_orders("").await, Err(HttpError::ArgumentsRequired { operation: "cancelAllOrders", .. })));
        assert!(matches!(client.fetch_ohlcv("", None, None).await, Err(HttpError::ArgumentsRequired { .. })));

        let order = OrderRequest { price: None, ..OrderRequest::limit("BTC/BRL", OrderSide::Buy, 1.0, 1.0) };
        assert!(matches!(client.create_order(&order).await, Err(HttpError::ArgumentsRequired { argument: "price", .. })));

        assert_eq!(client.rate_limiter().available(), available);
        assert_eq!(client.circuit_breaker().stats().total_requests, 0);
    }

    #[tokio::test]
    async fn test_private_call_without_credentials() {
        let client = offline_builder().build().unwrap();

        let result = client.fetch_balance().await;
        assert!(matches!(result, Err(HttpError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_fail_fast_when_limiter_drained() {
        let limiter: Arc<dyn RateLimiter> = Arc::new(TokenBucket::new(1000, 0.001).unwrap());
        let client = offline_builder().rate_limiter(limiter.clone()).rate_limit_mode(RateLimitMode::FailFast).build().unwrap();

        limiter.try_acquire(1000).unwrap();

        let result = client.fetch_ticker("BTC/BRL").await;
        assert!(matches!(result, Err(HttpError::RateLimitExceeded)));

        // Local errors leave the breaker untouched
        assert_eq!(client.circuit_breaker().stats().failed_requests, 0);
    }

    #[tokio::test]
    async fn test_cost_above_capacity() {
        let limiter: Arc<dyn RateLimiter> = Arc::new(TokenBucket::new(100, 10.0).unwrap());
        let client = offline_builder().rate_limiter(limiter).build().unwrap();

        let result = client.fetch_ohlcv("BTC/BRL", None, None).await;
        assert!(matches!(result, Err(HttpError::RateLimiter(RateLimitError::WeightExceedsCapacity { weight: 1000, capacity: 100 }))));
    }

    #[test]
    fn test_order_params() {
        let params = OrderRequest::limit("BTC/BRL", OrderSide::Sell, 0.5, 250000.0).to_params();
        assert_eq!(params.encode(), "symbol=BTC%2FBRL&type=limit&side=sell&amount=0.5&price=250000");

        let params = OrderRequest::market_quote("BTC/BRL", OrderSide::Buy, 100.0).to_params();
        assert_eq!(params.encode(), "symbol=BTC%2FBRL&type=market&side=buy&quoteAmount=100");
    }

    #[test]
    fn test_filter_by_status() {
        let orders = json!([
            {"id": "1", "status": "open"},
            {"id": "2", "status": "closed"},
            {"id": "3"},
            {"id": "4", "status": "closed"},
        ]);

        let closed = filter_by_status(orders, "closed");
        assert_eq!(closed, json!([{"id": "2", "status": "closed"}, {"id": "4", "status": "closed"}]));
    }

    #[test]
    fn test_filter_by_status_flattens_objects() {
        let orders = json!({"a": {"status": "closed"}, "b": {"status": "canceled"}});
        assert_eq!(filter_by_status(orders, "closed"), json!([{"status": "closed"}]));
        assert_eq!(filter_by_status(json!("oops"), "closed"), json!([]));
    }

    #[test]
    fn test_rate_limit_mode_serde() {
        assert_eq!(serde_json::from_str::<RateLimitMode>("\"fail_fast\"").unwrap(), RateLimitMode::FailFast);
        assert_eq!(serde_json::to_string(&RateLimitMode::Wait).unwrap(), "\"wait\"");
    }
}
