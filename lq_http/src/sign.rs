//! Request construction and signing
//!
//! Public endpoints take their parameters as a plain query string. Private
//! endpoints prepend `timestamp` and `recvWindow`, then sign the encoded
//! query: SHA-256 hex digest of the query, signed with Ed25519. The
//! signature travels in the `signature` header next to `X-MBX-APIKEY`.

use std::fmt;

use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;
use lq_endpoints::AccessTier;
use lq_endpoints::EndpointDescriptor;
use lq_endpoints::HttpMethod;
use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;
use url::form_urlencoded;

use crate::errors::HttpError;
use crate::errors::Result;

pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";
pub const SIGNATURE_HEADER: &str = "signature";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Ordered request parameters
///
/// Insertion order is kept; setting an existing name replaces its value in
/// place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builder form of [`Params::set`]
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set(name, value);
        self
    }

    /// Builder form that skips `None`
    pub fn with_opt<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(existing, _)| existing == name).map(|(_, value)| value.as_str())
    }

    /// Apply every entry of `other` on top of `self`
    pub fn extend(&mut self, other: Params) {
        for (name, value) in other.0 {
            self.set(name, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// `application/x-www-form-urlencoded` rendering
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new()).extend_pairs(self.iter()).finish()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.set(name, value);
        }
        params
    }
}

/// API key and Ed25519 signing key
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    signing_key: SigningKey,
}

impl Credentials {
    /// Build from the API key and a hex encoded 32-byte Ed25519 seed
    pub fn new(api_key: impl Into<String>, secret_hex: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(HttpError::AuthenticationFailed("apiKey is empty".into()));
        }

        let seed = hex::decode(secret_hex.trim()).map_err(|err| HttpError::Signing(format!("secret is not hex: {err}")))?;
        let seed: [u8; 32] = seed.try_into().map_err(|seed: Vec<u8>| HttpError::Signing(format!("secret must be 32 bytes, got {}", seed.len())))?;

        Ok(Self { api_key, signing_key: SigningKey::from_bytes(&seed) })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Hex signature over the SHA-256 hex digest of `query`
    pub fn sign(&self, query: &str) -> String {
        let digest = hex::encode(Sha256::digest(query.as_bytes()));
        hex::encode(self.signing_key.sign(digest.as_bytes()).to_bytes())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("api_key", &self.api_key).field("signing_key", &"<redacted>").finish()
    }
}

/// A request ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<String>,
    pub headers: Vec<(&'static str, String)>,
}

impl SignedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(header, _)| header.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }
}

/// Milliseconds since the Unix epoch, shifted by a known clock offset
pub fn nonce(time_difference_ms: i64) -> i64 {
    let now_ms = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
    now_ms - time_difference_ms
}

fn endpoint_url(base_url: &str, endpoint: &EndpointDescriptor) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), endpoint.path())
}

/// Unsigned request for a public endpoint
pub fn public_request(base_url: &str, endpoint: &EndpointDescriptor, params: &Params) -> SignedRequest {
    let mut url = endpoint_url(base_url, endpoint);
    if !params.is_empty() {
        url.push('?');
        url.push_str(&params.encode());
    }

    SignedRequest { method: endpoint.method, url, body: None, headers: Vec::new() }
}

/// Signed request for a private endpoint
pub fn private_request(
    base_url: &str,
    endpoint: &EndpointDescriptor,
    params: &Params,
    credentials: &Credentials,
    timestamp_ms: i64,
    recv_window_ms: u64,
) -> SignedRequest {
    let mut signed = Params::new().with("timestamp", timestamp_ms).with("recvWindow", recv_window_ms);
    signed.extend(params.clone());

    let query = signed.encode();
    let mut headers = vec![(SIGNATURE_HEADER, credentials.sign(&query)), (API_KEY_HEADER, credentials.api_key().to_string())];

    let mut url = endpoint_url(base_url, endpoint);
    let body = match endpoint.method {
        HttpMethod::Get => {
            url.push('?');
            url.push_str(&query);
            None
        }
        HttpMethod::Post => {
            headers.push((CONTENT_TYPE_HEADER, FORM_CONTENT_TYPE.to_string()));
            Some(query)
        }
    };

    SignedRequest { method: endpoint.method, url, body, headers }
}

/// Build the request for any endpoint, signing private ones
pub fn build_request(
    base_url: &str,
    endpoint: &EndpointDescriptor,
    params: &Params,
    credentials: Option<&Credentials>,
    timestamp_ms: i64,
    recv_window_ms: u64,
) -> Result<SignedRequest> {
    match endpoint.tier {
        AccessTier::Public => Ok(public_request(base_url, endpoint, params)),
        AccessTier::Private => {
            let credentials = credentials.ok_or_else(|| HttpError::AuthenticationFailed(format!("{} requires apiKey and secret", endpoint.name())))?;
            Ok(private_request(base_url, endpoint, params, credentials, timestamp_ms, recv_window_ms))
        }
    }
}
