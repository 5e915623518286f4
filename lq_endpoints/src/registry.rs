use std::collections::HashMap;
use std::sync::OnceLock;

use crate::descriptor::AccessTier;
use crate::descriptor::AccessTier::Private;
use crate::descriptor::AccessTier::Public;
use crate::descriptor::EndpointDescriptor;
use crate::descriptor::HttpMethod::Get;
use crate::descriptor::HttpMethod::Post;
use crate::descriptor::Operation;
use crate::error::EndpointError;
use crate::error::Result;

/// Longest normalized key the index can hold; longer input never matches
pub const MAX_KEY_LEN: usize = 64;

/// Liqi REST endpoints in declaration order
static LIQI_ENDPOINTS: [EndpointDescriptor; 17] = [
    EndpointDescriptor::new(Public, Get, Operation::FetchMarket, 1),
    EndpointDescriptor::new(Public, Get, Operation::FetchMarkets, 20),
    EndpointDescriptor::new(Public, Get, Operation::FetchCurrencies, 20),
    EndpointDescriptor::new(Public, Get, Operation::FetchTickers, 20),
    EndpointDescriptor::new(Public, Get, Operation::FetchTicker, 1),
    EndpointDescriptor::new(Public, Get, Operation::FetchOrderBook, 100),
    EndpointDescriptor::new(Public, Get, Operation::FetchOhlcv, 1000),
    EndpointDescriptor::new(Private, Get, Operation::FetchBalance, 1),
    EndpointDescriptor::new(Private, Get, Operation::FetchMyOrders, 100),
    EndpointDescriptor::new(Private, Get, Operation::FetchOrders, 100),
    EndpointDescriptor::new(Private, Get, Operation::FetchClosedOrders, 1000),
    EndpointDescriptor::new(Private, Get, Operation::FetchOpenOrders, 100),
    EndpointDescriptor::new(Private, Get, Operation::FetchOrder, 1),
    EndpointDescriptor::new(Private, Get, Operation::FetchTrades, 500),
    EndpointDescriptor::new(Private, Post, Operation::CreateOrder, 1),
    EndpointDescriptor::new(Private, Post, Operation::CancelOrder, 1),
    EndpointDescriptor::new(Private, Post, Operation::CancelAllOrders, 1),
];

/// Read-only table of endpoint descriptors with alias-tolerant lookup
///
/// Each descriptor is stored once. Both the camelCase (`publicGetFetchTicker`)
/// and snake_case (`public_get_fetchticker`) implicit method names, as well as
/// the bare operation name, collapse to the same normalized key: underscores
/// removed, ASCII lowercased.
#[derive(Debug)]
pub struct EndpointRegistry {
    endpoints: &'static [EndpointDescriptor],

    /// Normalized key -> position in `endpoints`
    index: HashMap<String, usize>,
}

impl EndpointRegistry {
    /// Build a registry over a static table, rejecting key collisions
    pub fn try_new(endpoints: &'static [EndpointDescriptor]) -> Result<Self> {
        let mut index = HashMap::with_capacity(endpoints.len() * 2);

        for (position, descriptor) in endpoints.iter().enumerate() {
            for key in [normalize_owned(descriptor.name()), normalize_owned(&descriptor.camel_key())] {
                if let Some(&existing) = index.get(&key) {
                    let first: &EndpointDescriptor = &endpoints[existing];
                    return Err(EndpointError::DuplicateKey { key, first: first.name(), second: descriptor.name() });
                }
                index.insert(key, position);
            }
        }

        Ok(Self { endpoints, index })
    }

    /// The process-wide Liqi registry, built on first use
    pub fn liqi() -> &'static EndpointRegistry {
        static LIQI: OnceLock<EndpointRegistry> = OnceLock::new();
        LIQI.get_or_init(|| EndpointRegistry::try_new(&LIQI_ENDPOINTS).expect("Liqi endpoint table has colliding keys"))
    }

    /// Resolve an operation name or implicit method alias
    pub fn lookup(&self, key: &str) -> Option<&'static EndpointDescriptor> {
        let endpoints: &'static [EndpointDescriptor] = self.endpoints;
        let normalized = normalize(key)?;
        self.index.get(normalized.as_str()).map(|&position| &endpoints[position])
    }

    /// Like [`lookup`](Self::lookup), with `UnknownOperation` on a miss
    pub fn resolve(&self, key: &str) -> Result<&'static EndpointDescriptor> {
        self.lookup(key).ok_or_else(|| EndpointError::UnknownOperation(key.to_string()))
    }

    /// Descriptor for a known operation
    ///
    /// # Panics
    /// Panics if the registry was built from a table that omits `op`;
    /// the Liqi table covers every [`Operation`].
    pub fn get(&self, op: Operation) -> &'static EndpointDescriptor {
        let endpoints: &'static [EndpointDescriptor] = self.endpoints;
        endpoints.iter().find(|descriptor| descriptor.operation == op).expect("operation missing from endpoint table")
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static EndpointDescriptor> {
        let endpoints: &'static [EndpointDescriptor] = self.endpoints;
        endpoints.iter()
    }

    pub fn public(&self) -> impl Iterator<Item = &'static EndpointDescriptor> {
        self.iter().filter(|descriptor| descriptor.tier == AccessTier::Public)
    }

    pub fn private(&self) -> impl Iterator<Item = &'static EndpointDescriptor> {
        self.iter().filter(|descriptor| descriptor.tier == AccessTier::Private)
    }

    /// Heaviest single charge in the table
    pub fn max_cost(&self) -> u32 {
        self.iter().map(|descriptor| descriptor.cost.get()).max().unwrap_or(1)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Canonical form of a lookup key, on the stack
///
/// Returns `None` when the key cannot fit, which no registered key does.
#[inline]
pub fn normalize(key: &str) -> Option<heapless::String<MAX_KEY_LEN>> {
    let mut normalized = heapless::String::new();
    for c in key.chars().filter(|&c| c != '_') {
        if normalized.push(c.to_ascii_lowercase()).is_err() {
            return None;
        }
    }
    Some(normalized)
}

fn normalize_owned(key: &str) -> String {
    key.chars().filter(|&c| c != '_').map(|c| c.to_ascii_lowercase()).collect()
}
