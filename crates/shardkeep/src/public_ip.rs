//! The host's public address, as seen by outside lookup services.

use parking_lot::RwLock;

use crate::ShardkeepError;
use crate::config::IpProvider;

/// Asks each provider in turn and returns the first address found.
pub async fn lookup(http: &reqwest::Client, providers: &[IpProvider]) -> Result<String, ShardkeepError> {
    let mut failures = Vec::new();
    for provider in providers {
        match ask(http, provider).await {
            Ok(ip) => return Ok(ip),
            Err(e) => {
                tracing::warn!(url = %provider.url, error = %e, "public ip provider failed");
                failures.push(format!("{}: {e}", provider.url));
            }
        }
    }
    Err(ShardkeepError::PublicIp(if failures.is_empty() {
        "no providers configured".to_owned()
    } else {
        failures.join("; ")
    }))
}

async fn ask(http: &reqwest::Client, provider: &IpProvider) -> Result<String, ShardkeepError> {
    let body: serde_json::Value = http
        .get(&provider.url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    field_of(&body, &provider.field)
}

/// Reads a non-empty string field from a provider's answer.
fn field_of(body: &serde_json::Value, field: &str) -> Result<String, ShardkeepError> {
    body.get(field)
        .and_then(serde_json::Value::as_str)
        .filter(|ip| !ip.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ShardkeepError::PublicIp(format!("answer has no {field:?} field")))
}

/// Last address found. Empty until the first successful refresh.
#[derive(Default)]
pub struct PublicIp {
    current: RwLock<String>,
}

impl PublicIp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> String {
        self.current.read().clone()
    }

    pub fn set(&self, ip: String) {
        *self.current.write() = ip;
    }
}
