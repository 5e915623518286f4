use std::fmt::Write;

use anyhow::Context;
use lq_endpoints::AccessTier;
use lq_endpoints::EndpointDescriptor;
use lq_endpoints::EndpointRegistry;
use lq_http::LiqiClient;
use lq_http::Params;
use serde_json::Value;
use serde_json::json;
use tracing::info;

pub fn select_endpoints(registry: &EndpointRegistry, tier: Option<AccessTier>) -> Vec<&'static EndpointDescriptor> {
    match tier {
        Some(AccessTier::Public) => registry.public().collect(),
        Some(AccessTier::Private) => registry.private().collect(),
        None => registry.iter().collect(),
    }
}

/// JSON view of a descriptor including both implicit method keys
pub fn descriptor_json(descriptor: &EndpointDescriptor) -> Value {
    json!({
        "operation": descriptor.name(),
        "tier": descriptor.tier,
        "method": descriptor.method,
        "cost": descriptor.cost,
        "camel_key": descriptor.camel_key(),
        "snake_key": descriptor.snake_key(),
    })
}

pub fn render_table(endpoints: &[&EndpointDescriptor]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<18} {:<8} {:<6} {:>5}  {:<30} {}", "OPERATION", "TIER", "METHOD", "COST", "CAMEL KEY", "SNAKE KEY");
    for endpoint in endpoints {
        let _ = writeln!(
            out,
            "{:<18} {:<8} {:<6} {:>5}  {:<30} {}",
            endpoint.name(),
            endpoint.tier.as_str(),
            endpoint.method.as_str(),
            endpoint.cost.get(),
            endpoint.camel_key(),
            endpoint.snake_key()
        );
    }
    out
}

pub fn render_json(endpoints: &[&EndpointDescriptor]) -> anyhow::Result<String> {
    let list: Vec<Value> = endpoints.iter().map(|endpoint| descriptor_json(endpoint)).collect();
    Ok(serde_json::to_string_pretty(&list)?)
}

pub fn endpoints(registry: &EndpointRegistry, tier: Option<AccessTier>, as_json: bool) -> anyhow::Result<String> {
    let selected = select_endpoints(registry, tier);
    if as_json { render_json(&selected) } else { Ok(render_table(&selected)) }
}

pub fn lookup(registry: &EndpointRegistry, key: &str) -> anyhow::Result<String> {
    let descriptor = registry.resolve(key)?;
    Ok(serde_json::to_string_pretty(&descriptor_json(descriptor))?)
}

pub async fn call(client: &LiqiClient, key: &str, params: Vec<(String, String)>) -> anyhow::Result<String> {
    let params: Params = params.into_iter().collect();
    info!(key, params = params.len(), "Calling endpoint");

    let response = client.request(key, params).await.with_context(|| format!("{key} failed"))?;
    Ok(serde_json::to_string_pretty(&response)?)
}

#[cfg(test)]
mod tests {
    use lq_endpoints::Operation;

    use super::*;

    #[test]
    fn test_select_by_tier() {
        let registry = EndpointRegistry::liqi();

        assert_eq!(select_endpoints(registry, None).len(), 17);
        assert_eq!(select_endpoints(registry, Some(AccessTier::Public)).len(), 7);
        assert_eq!(select_endpoints(registry, Some(AccessTier::Private)).len(), 10);
        assert!(select_endpoints(registry, Some(AccessTier::Private)).iter().all(|e| e.tier == AccessTier::Private));
    }

    #[test]
    fn test_table_lists_every_endpoint() {
        let registry = EndpointRegistry::liqi();
        let table = render_table(&select_endpoints(registry, None));

        assert_eq!(table.lines().count(), 18);
        assert!(table.lines().any(|line| line.starts_with("fetchOrderBook") && line.contains("publicGetFetchOrderBook")));
        assert!(table.lines().any(|line| line.starts_with("createOrder") && line.contains("POST")));
    }

    #[test]
    fn test_descriptor_json() {
        let descriptor = EndpointRegistry::liqi().get(Operation::FetchOhlcv);
        let value = descriptor_json(descriptor);

        assert_eq!(
            value,
            json!({
                "operation": "fetchOHLCV",
                "tier": "public",
                "method": "GET",
                "cost": 1000,
                "camel_key": "publicGetFetchOHLCV",
                "snake_key": "public_get_fetchohlcv",
            })
        );
    }

    #[test]
    fn test_lookup_accepts_aliases() {
        let registry = EndpointRegistry::liqi();
        let by_name = lookup(registry, "cancelOrder").unwrap();

        assert_eq!(lookup(registry, "private_post_cancelorder").unwrap(), by_name);
        assert_eq!(lookup(registry, "privatePostCancelOrder").unwrap(), by_name);
    }

    #[test]
    fn test_lookup_unknown() {
        let err = lookup(EndpointRegistry::liqi(), "fetchDeposits").unwrap_err();
        assert!(err.to_string().contains("Unknown operation"));
    }

    #[test]
    fn test_json_listing_parses() {
        let registry = EndpointRegistry::liqi();
        let rendered = endpoints(registry, Some(AccessTier::Public), true).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed.len(), 7);
        assert!(parsed.iter().all(|entry| entry["tier"] == "public"));
    }
}
