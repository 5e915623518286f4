use std::time::Duration;

use lq_endpoints::HttpMethod;
use reqwest::Client;
use reqwest::ClientBuilder;
use reqwest::Method;

use crate::errors::Result;

/// Transport settings for the exchange connection
///
/// Durations apply per connection or per request. The two presets tune the
/// same knobs for order entry and for bulk downloads.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
    pub connect_timeout: Duration,
    /// Whole request including body download
    pub request_timeout: Duration,
    pub tcp_keepalive: Duration,
    pub tcp_nodelay: bool,
    /// Speak h2 without ALPN negotiation
    pub http2_prior_knowledge: bool,
    pub http2_keep_alive_interval: Duration,
    pub http2_keep_alive_timeout: Duration,
    /// Use the hickory resolver instead of getaddrinfo
    pub hickory_dns: bool,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 16,
            pool_idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            tcp_keepalive: Duration::from_secs(60),
            tcp_nodelay: true,
            http2_prior_knowledge: false,
            http2_keep_alive_interval: Duration::from_secs(30),
            http2_keep_alive_timeout: Duration::from_secs(20),
            hickory_dns: true,
            user_agent: concat!("lq_http/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpClientConfig {
    /// Short timeouts for order entry and cancels
    pub fn low_latency() -> Self {
        Self {
            pool_max_idle_per_host: 8,
            pool_idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            tcp_keepalive: Duration::from_secs(30),
            http2_keep_alive_interval: Duration::from_secs(20),
            http2_keep_alive_timeout: Duration::from_secs(10),
            ..Default::default()
        }
    }

    /// Wide pool and long timeout for heavy reads such as `fetchOHLCV`
    pub fn high_throughput() -> Self {
        Self { pool_max_idle_per_host: 64, pool_idle_timeout: Duration::from_secs(120), request_timeout: Duration::from_secs(60), ..Default::default() }
    }

    fn to_builder(&self) -> ClientBuilder {
        let builder = ClientBuilder::new()
            .user_agent(self.user_agent.as_str())
            .use_rustls_tls()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout)
            .tcp_nodelay(self.tcp_nodelay)
            .tcp_keepalive(Some(self.tcp_keepalive))
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(self.http2_keep_alive_interval))
            .http2_keep_alive_timeout(self.http2_keep_alive_timeout)
            .hickory_dns(self.hickory_dns)
            .gzip(true)
            .brotli(true);

        if self.http2_prior_knowledge { builder.http2_prior_knowledge() } else { builder }
    }
}

/// Pooled reqwest client shared by every endpoint call
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = config.to_builder().build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Request builder using the endpoint's verb
    pub fn request(&self, method: HttpMethod, url: &str) -> reqwest::RequestBuilder {
        self.client.request(to_reqwest_method(method), url)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new().expect("Failed to create default HTTP client")
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
    }
}
