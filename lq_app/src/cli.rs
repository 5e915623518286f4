use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use lq_endpoints::AccessTier;

/// Liqi REST endpoint registry and request client
#[derive(Parser, Debug)]
#[command(name = "liqi")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    LIQI__BASE_URL                 API base URL
    LIQI__RATE_LIMIT_MS            Spacing between weight-1 requests (default: 50)
    LIQI__CREDENTIALS__API_KEY     API key for private endpoints
    LIQI__CREDENTIALS__SECRET      Hex encoded Ed25519 seed
    RUST_LOG                       Log filter, overrides the configured level
"#)]
pub struct Cli {
    /// Config file, missing file falls back to defaults
    #[arg(short, long, global = true, env = "LIQI_CONFIG", default_value = "config/liqi.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// List registered endpoints
    Endpoints {
        /// Only list endpoints of this tier
        #[arg(long)]
        tier: Option<AccessTier>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Resolve an operation name or implicit method key
    Lookup { key: String },
    /// Send a request to an endpoint
    Call {
        /// Operation name or implicit method key, e.g. `fetchTicker` or `public_get_fetchticker`
        key: String,

        /// Request parameter as `name=value`, repeatable
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw.split_once('=').ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in `{raw}`"));
    }
    Ok((name.to_string(), value.to_string()))
}
