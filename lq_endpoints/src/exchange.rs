//! Static facts about the Liqi exchange integration

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::descriptor::AccessTier;
use crate::error::EndpointError;

pub const ID: &str = "liqi";
pub const NAME: &str = "Liqi";
pub const COUNTRIES: [&str; 2] = ["JP", "MT"];

/// Minimum spacing between weight-1 requests, in milliseconds
pub const RATE_LIMIT_MS: u64 = 50;

/// Validity window sent with signed requests
pub const DEFAULT_RECV_WINDOW_MS: u64 = 5_000;

pub const PUBLIC_API_URL: &str = "https://api.liqi.com.br/exchange/v1";
pub const PRIVATE_API_URL: &str = "https://api.liqi.com.br/exchange/v1";
pub const WWW_URL: &str = "https://www.liqi.com.br";
pub const DOC_URL: &str = "https://liqi.readme.io/";
pub const API_MANAGEMENT_URL: &str = "https://www.liqi.com.br/gerenciamento-de-api";

/// Base URL for a tier
pub const fn api_url(tier: AccessTier) -> &'static str {
    match tier {
        AccessTier::Public => PUBLIC_API_URL,
        AccessTier::Private => PRIVATE_API_URL,
    }
}

/// Flat spot trading fee schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradingFees {
    pub taker: f64,
    pub maker: f64,
    pub percentage: bool,
    pub tier_based: bool,
}

pub const TRADING_FEES: TradingFees = TradingFees { taker: 0.0035, maker: 0.0015, percentage: true, tier_based: false };

/// Candle intervals accepted by `fetchOHLCV`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl Timeframe {
    pub const ALL: [Timeframe; 15] = [
        Timeframe::OneMinute,
        Timeframe::ThreeMinutes,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::ThirtyMinutes,
        Timeframe::OneHour,
        Timeframe::TwoHours,
        Timeframe::FourHours,
        Timeframe::SixHours,
        Timeframe::EightHours,
        Timeframe::TwelveHours,
        Timeframe::OneDay,
        Timeframe::ThreeDays,
        Timeframe::OneWeek,
        Timeframe::OneMonth,
    ];

    /// Interval string as sent in the `interval` query parameter
    pub const fn as_str(self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::ThreeMinutes => "3m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::ThirtyMinutes => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::TwoHours => "2h",
            Timeframe::FourHours => "4h",
            Timeframe::SixHours => "6h",
            Timeframe::EightHours => "8h",
            Timeframe::TwelveHours => "12h",
            Timeframe::OneDay => "1d",
            Timeframe::ThreeDays => "3d",
            Timeframe::OneWeek => "1w",
            Timeframe::OneMonth => "1M",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = EndpointError;

    // Case matters: "1m" is a minute, "1M" a month.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL.iter().copied().find(|tf| tf.as_str() == s).ok_or_else(|| EndpointError::UnknownTimeframe(s.to_string()))
    }
}
