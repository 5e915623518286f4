use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use lq_endpoints::exchange;
use lq_http::HttpClientConfig;
use lq_http::LiqiClientBuilder;
use lq_http::RateLimitMode;
use serde::Deserialize;
use tracing::Level;

/// Prefix of environment overrides, e.g. `LIQI__CREDENTIALS__API_KEY`
pub const ENV_PREFIX: &str = "LIQI";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiqiConfig {
    pub base_url: String,
    /// Spacing between weight-1 requests
    pub rate_limit_ms: u64,
    pub rate_limit_mode: RateLimitMode,
    pub recv_window_ms: u64,
    /// Local clock minus exchange clock
    pub time_difference_ms: i64,
    pub http: HttpConfig,
    pub credentials: Option<CredentialsConfig>,
    pub logging: LoggingConfig,
}

impl Default for LiqiConfig {
    fn default() -> Self {
        Self {
            base_url: exchange::PUBLIC_API_URL.to_string(),
            rate_limit_ms: exchange::RATE_LIMIT_MS,
            rate_limit_mode: RateLimitMode::Wait,
            recv_window_ms: exchange::DEFAULT_RECV_WINDOW_MS,
            time_difference_ms: 0,
            http: HttpConfig::default(),
            credentials: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl LiqiConfig {
    /// Client builder carrying every configured setting
    pub fn client_builder(&self) -> LiqiClientBuilder {
        let mut builder = LiqiClientBuilder::default()
            .base_url(self.base_url.clone())
            .rate_limit_ms(self.rate_limit_ms)
            .rate_limit_mode(self.rate_limit_mode)
            .recv_window_ms(self.recv_window_ms)
            .time_difference_ms(self.time_difference_ms)
            .http_config(self.http.to_client_config());

        if let Some(credentials) = &self.credentials {
            builder = builder.credentials(credentials.api_key.clone(), credentials.secret.clone());
        }
        builder
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpProfile {
    #[default]
    Default,
    LowLatency,
    HighThroughput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub profile: HttpProfile,
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub pool_max_idle_per_host: Option<usize>,
    pub user_agent: Option<String>,
}

impl HttpConfig {
    pub fn to_client_config(&self) -> HttpClientConfig {
        let mut config = match self.profile {
            HttpProfile::Default => HttpClientConfig::default(),
            HttpProfile::LowLatency => HttpClientConfig::low_latency(),
            HttpProfile::HighThroughput => HttpClientConfig::high_throughput(),
        };

        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.request_timeout_ms {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(size) = self.pool_max_idle_per_host {
            config.pool_max_idle_per_host = size;
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }
}

#[derive(Clone, Deserialize)]
pub struct CredentialsConfig {
    pub api_key: String,
    /// Hex encoded Ed25519 seed
    pub secret: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig").field("api_key", &self.api_key).field("secret", &"<redacted>").finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Hourly,
    Daily,
    Never,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: String,
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
    /// Mirror log lines to the terminal
    pub console: bool,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { dir: "logs".to_string(), level: "info".to_string(), console: false, rotation: LogRotation::Hourly }
    }
}

impl LoggingConfig {
    /// Configured level, `INFO` when unparseable
    pub fn level(&self) -> Level {
        Level::from_str(&self.level).unwrap_or(Level::INFO)
    }
}

/// `LIQI__SECTION__KEY` variables
///
/// Values stay strings until deserialization, so numeric-looking
/// credentials keep their leading zeros.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__")
}

/// Load the TOML file at `path`, overlaid by `LIQI__*` environment variables
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LiqiConfig, ConfigError> {
    let config = Config::builder().add_source(File::from(path.as_ref())).add_source(environment()).build()?;

    config.try_deserialize()
}

/// Environment overrides on top of built-in defaults
pub fn load_env_config() -> Result<LiqiConfig, ConfigError> {
    env_config(environment())
}

fn env_config(environment: Environment) -> Result<LiqiConfig, ConfigError> {
    Config::builder().add_source(environment).build()?.try_deserialize()
}

/// Outcome of [`load_config_or_default`], logged once tracing is up
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: LiqiConfig,
    pub path: String,
    /// Fallbacks taken while loading
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    pub fn log(&self) {
        if self.warnings.is_empty() {
            tracing::info!("Loaded liqi config from {}", self.path);
        }
        for warning in &self.warnings {
            tracing::warn!("{warning}");
        }
    }
}

/// Load config with fallback to environment and defaults
pub fn load_config_or_default(path: &str) -> LoadedConfig {
    let mut warnings = Vec::new();
    let config = match load_config(path) {
        Ok(config) => config,
        Err(err) => {
            warnings.push(format!("Failed to load liqi config from {path}: {err}. Using defaults."));
            load_env_config().unwrap_or_else(|err| {
                warnings.push(format!("Ignoring invalid LIQI__ environment overrides: {err}"));
                LiqiConfig::default()
            })
        }
    };

    LoadedConfig { config, path: path.to_string(), warnings }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;

    fn write_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("lq_app_{}_{name}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = LiqiConfig::default();

        assert_eq!(config.base_url, "https://api.liqi.com.br/exchange/v1");
        assert_eq!(config.rate_limit_ms, 50);
        assert_eq!(config.recv_window_ms, 5000);
        assert_eq!(config.rate_limit_mode, RateLimitMode::Wait);
        assert!(config.credentials.is_none());
        assert_eq!(config.logging.level(), Level::INFO);
    }

    #[test]
    fn test_load_file() {
        let path = write_config(
            "full",
            r#"
rate_limit_ms = 100
rate_limit_mode = "fail_fast"
recv_window_ms = 10000

[http]
profile = "low_latency"
request_timeout_ms = 2500

[credentials]
api_key = "abc"
secret = "00"

[logging]
level = "debug"
rotation = "daily"
"#,
        );

        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.rate_limit_ms, 100);
        assert_eq!(config.rate_limit_mode, RateLimitMode::FailFast);
        assert_eq!(config.recv_window_ms, 10_000);
        assert_eq!(config.base_url, exchange::PUBLIC_API_URL);
        assert_eq!(config.http.profile, HttpProfile::LowLatency);
        assert_eq!(config.credentials.as_ref().map(|c| c.api_key.as_str()), Some("abc"));
        assert_eq!(config.logging.level(), Level::DEBUG);
        assert_eq!(config.logging.rotation, LogRotation::Daily);

        let http = config.http.to_client_config();
        assert_eq!(http.request_timeout, Duration::from_millis(2500));
        assert_eq!(http.connect_timeout, Duration::from_secs(5));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn env_source(vars: &[(&str, &str)]) -> Environment {
        let vars: config::Map<String, String> = vars.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        environment().source(Some(vars))
    }

    #[test]
    fn test_missing_file_falls_back() {
        let loaded = load_config_or_default("/nonexistent/liqi.toml");

        assert_eq!(loaded.config.rate_limit_ms, exchange::RATE_LIMIT_MS);
        assert!(loaded.warnings[0].contains("Using defaults"), "{:?}", loaded.warnings);
    }

    #[test]
    fn test_fallback_warning_reaches_subscriber() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt().with_writer(move || writer.clone()).with_ansi(false).finish();

        let loaded = load_config_or_default("/nonexistent/liqi.toml");
        tracing::subscriber::with_default(subscriber, || loaded.log());

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("Failed to load liqi config from /nonexistent/liqi.toml"));
    }

    #[test]
    fn test_env_credentials_stay_strings() {
        let secret = "0".repeat(64);
        let config = env_config(env_source(&[("LIQI__CREDENTIALS__API_KEY", "000123"), ("LIQI__CREDENTIALS__SECRET", &secret)])).unwrap();

        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.api_key, "000123");
        assert_eq!(credentials.secret, secret);
    }

    #[test]
    fn test_env_numbers_still_parse() {
        let config = env_config(env_source(&[
            ("LIQI__RATE_LIMIT_MS", "100"),
            ("LIQI__TIME_DIFFERENCE_MS", "-250"),
            ("LIQI__LOGGING__CONSOLE", "true"),
            ("LIQI__RATE_LIMIT_MODE", "fail_fast"),
        ]))
        .unwrap();

        assert_eq!(config.rate_limit_ms, 100);
        assert_eq!(config.time_difference_ms, -250);
        assert!(config.logging.console);
        assert_eq!(config.rate_limit_mode, RateLimitMode::FailFast);
    }

    #[test]
    fn test_bad_level_falls_back_to_info() {
        let logging = LoggingConfig { level: "chatty".into(), ..Default::default() };
        assert_eq!(logging.level(), Level::INFO);
    }

    #[test]
    fn test_secret_is_redacted() {
        let credentials = CredentialsConfig { api_key: "abc".into(), secret: "deadbeef".into() };
        assert!(!format!("{credentials:?}").contains("deadbeef"));
    }

    #[test]
    fn test_client_builder_from_config() {
        let config = LiqiConfig { base_url: "http://127.0.0.1:9".into(), ..Default::default() };
        let client = config.client_builder().build().unwrap();

        assert_eq!(client.base_url(), "http://127.0.0.1:9");
        assert!(!client.has_credentials());
    }
}
