use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

const MAX_MESSAGE_SIZE: i32 = 104_857_600; // 100MB

/// Client settings. Every field has a default, so a JSON file only needs the
/// keys it wants to change.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Broker used when a request carries no address of its own.
    pub broker: Option<String>,
    pub client_id: String,
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,
    /// Upper bound for every round trip, on top of the caller's deadline.
    #[serde(rename = "request_timeout_ms", with = "millis")]
    pub request_timeout: Duration,
    pub max_message_size: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            broker: None,
            client_id: "kafka-admin".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn with_broker(mut self, broker: impl Into<String>) -> Self {
        self.broker = Some(broker.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, anyhow::Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading client config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing client config {}", path.display()))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
