use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use serde::Serialize;

use crate::error::EndpointError;

/// Whether an endpoint needs signed credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    Public,
    Private,
}

impl AccessTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            AccessTier::Public => "public",
            AccessTier::Private => "private",
        }
    }

    #[inline]
    pub const fn requires_signature(self) -> bool {
        matches!(self, AccessTier::Private)
    }
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessTier {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("public") {
            Ok(AccessTier::Public)
        } else if s.eq_ignore_ascii_case("private") {
            Ok(AccessTier::Private)
        } else {
            Err(EndpointError::UnknownTier(s.to_string()))
        }
    }
}

/// HTTP verbs used by the exchange's REST surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }

    /// Capitalised form used inside implicit method names (`publicGet...`)
    const fn title(self) -> &'static str {
        match self {
            HttpMethod::Get => "Get",
            HttpMethod::Post => "Post",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("get") {
            Ok(HttpMethod::Get)
        } else if s.eq_ignore_ascii_case("post") {
            Ok(HttpMethod::Post)
        } else {
            Err(EndpointError::UnknownMethod(s.to_string()))
        }
    }
}

/// Rate-limit weight charged before a request is sent
///
/// Always at least one unit. This is not a monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Cost(NonZeroU32);

impl Cost {
    /// Build a cost in const context, rejecting zero at compile time
    pub const fn new(weight: u32) -> Self {
        match NonZeroU32::new(weight) {
            Some(weight) => Cost(weight),
            None => panic!("endpoint cost must be positive"),
        }
    }

    #[inline(always)]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Every REST operation the Liqi integration exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum Operation {
    FetchMarket,
    FetchMarkets,
    FetchCurrencies,
    FetchTickers,
    FetchTicker,
    FetchOrderBook,
    FetchOhlcv,
    FetchBalance,
    FetchMyOrders,
    FetchOrders,
    FetchClosedOrders,
    FetchOpenOrders,
    FetchOrder,
    FetchTrades,
    CreateOrder,
    CancelOrder,
    CancelAllOrders,
}

impl Operation {
    pub const ALL: [Operation; 17] = [
        Operation::FetchMarket,
        Operation::FetchMarkets,
        Operation::FetchCurrencies,
        Operation::FetchTickers,
        Operation::FetchTicker,
        Operation::FetchOrderBook,
        Operation::FetchOhlcv,
        Operation::FetchBalance,
        Operation::FetchMyOrders,
        Operation::FetchOrders,
        Operation::FetchClosedOrders,
        Operation::FetchOpenOrders,
        Operation::FetchOrder,
        Operation::FetchTrades,
        Operation::CreateOrder,
        Operation::CancelOrder,
        Operation::CancelAllOrders,
    ];

    /// Operation name as the exchange spells it in URL paths
    pub const fn name(self) -> &'static str {
        match self {
            Operation::FetchMarket => "fetchMarket",
            Operation::FetchMarkets => "fetchMarkets",
            Operation::FetchCurrencies => "fetchCurrencies",
            Operation::FetchTickers => "fetchTickers",
            Operation::FetchTicker => "fetchTicker",
            Operation::FetchOrderBook => "fetchOrderBook",
            Operation::FetchOhlcv => "fetchOHLCV",
            Operation::FetchBalance => "fetchBalance",
            Operation::FetchMyOrders => "fetchMyOrders",
            Operation::FetchOrders => "fetchOrders",
            Operation::FetchClosedOrders => "fetchClosedOrders",
            Operation::FetchOpenOrders => "fetchOpenOrders",
            Operation::FetchOrder => "fetchOrder",
            Operation::FetchTrades => "fetchTrades",
            Operation::CreateOrder => "createOrder",
            Operation::CancelOrder => "cancelOrder",
            Operation::CancelAllOrders => "cancelAllOrders",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Operation> for &'static str {
    fn from(op: Operation) -> Self {
        op.name()
    }
}

impl FromStr for Operation {
    type Err = EndpointError;

    /// Strict parse: only the exact camelCase name is accepted.
    /// Use [`crate::EndpointRegistry::lookup`] for alias-tolerant resolution.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL.iter().copied().find(|op| op.name() == s).ok_or_else(|| EndpointError::UnknownOperation(s.to_string()))
    }
}

/// Immutable description of one REST endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EndpointDescriptor {
    pub operation: Operation,
    pub tier: AccessTier,
    pub method: HttpMethod,
    pub cost: Cost,
}

impl EndpointDescriptor {
    pub const fn new(tier: AccessTier, method: HttpMethod, operation: Operation, cost: u32) -> Self {
        Self { operation, tier, method, cost: Cost::new(cost) }
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.operation.name()
    }

    /// Path segment appended to the API base URL
    #[inline]
    pub const fn path(&self) -> &'static str {
        self.operation.name()
    }

    /// camelCase implicit method name, e.g. `publicGetFetchOrderBook`
    pub fn camel_key(&self) -> String {
        let name = self.operation.name();
        let mut key = String::with_capacity(self.tier.as_str().len() + 4 + name.len());
        key.push_str(self.tier.as_str());
        key.push_str(self.method.title());

        let mut chars = name.chars();
        if let Some(first) = chars.next() {
            key.push(first.to_ascii_uppercase());
            key.extend(chars);
        }
        key
    }

    /// snake_case implicit method name, e.g. `public_get_fetchorderbook`
    pub fn snake_key(&self) -> String {
        format!("{}_{}_{}", self.tier.as_str(), self.method.as_str().to_ascii_lowercase(), self.operation.name().to_ascii_lowercase())
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} (cost {})", self.tier, self.method, self.operation, self.cost)
    }
}
