//! Client options.
//!
//! Options come from a JSON document of the form
//!
//! ```text
//! { "pooling": { "enabled": true, "maxSize": 25, "queueTimeout": 0, "maxIdleTime": 0 } }
//! ```
//!
//! Keys are matched case-insensitively and unknown keys are rejected. Times
//! are in milliseconds; `0` means no limit.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use xdb_pool::PoolConfig;

use crate::error::{Error, Result};

/// Client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Pool settings.
    pub pooling: PoolConfig,
}

/// The `pooling` object as it appears in the options document.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PoolingDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_idle_time: Option<u64>,
}

const POOLING: &str = "pooling";
const POOLING_KEYS: [&str; 4] = ["enabled", "maxSize", "queueTimeout", "maxIdleTime"];

impl ClientOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pooling(mut self, config: PoolConfig) -> Self {
        self.pooling = config;
        self
    }

    /// Parse a client options document.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(top) = value else {
            return Err(Error::Config("client options must be a JSON object".into()));
        };

        let mut options = Self::default();
        for (key, value) in top {
            if !key.eq_ignore_ascii_case(POOLING) {
                return Err(Error::Config(format!("unknown client option '{key}'")));
            }
            let Value::Object(pooling) = value else {
                return Err(Error::Config("'pooling' must be a JSON object".into()));
            };
            let document: PoolingDocument = serde_json::from_value(Value::Object(canonical_keys(pooling)?))?;
            options.pooling = document.into_config()?;
        }

        tracing::debug!(pooling = ?options.pooling, "parsed client options");
        Ok(options)
    }

    /// Render the options as a JSON document accepted by [`from_json`](Self::from_json).
    ///
    /// A pool with no room is written as a disabled pool, since `maxSize`
    /// must be positive in the document.
    pub fn to_json(&self) -> Result<String> {
        let pooling = &self.pooling;
        let document = PoolingDocument {
            enabled: Some(pooling.is_pooling()),
            max_size: (pooling.max_size > 0).then_some(pooling.max_size as u64),
            queue_timeout: Some(millis(pooling.queue_timeout)),
            max_idle_time: Some(millis(pooling.idle_timeout)),
        };
        let mut top = Map::new();
        top.insert(POOLING.to_string(), serde_json::to_value(document)?);
        Ok(Value::Object(top).to_string())
    }
}

/// Rename keys to their canonical spelling; unknown keys are kept so that
/// deserialization rejects them by name.
fn canonical_keys(object: Map<String, Value>) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for (key, value) in object {
        let name = POOLING_KEYS
            .iter()
            .find(|k| k.eq_ignore_ascii_case(&key))
            .map_or(key, |k| (*k).to_string());
        if out.insert(name.clone(), value).is_some() {
            return Err(Error::Config(format!("duplicate pooling option '{name}'")));
        }
    }
    Ok(out)
}

fn millis(limit: Option<Duration>) -> u64 {
    limit.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn limit(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl PoolingDocument {
    fn into_config(self) -> Result<PoolConfig> {
        let mut config = PoolConfig::default();
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(max_size) = self.max_size {
            if max_size == 0 {
                return Err(Error::Config("pooling.maxSize must be greater than 0".into()));
            }
            config.max_size = usize::try_from(max_size)
                .map_err(|_| Error::Config(format!("pooling.maxSize {max_size} is too large")))?;
        }
        if let Some(ms) = self.queue_timeout {
            config.queue_timeout = limit(ms);
        }
        if let Some(ms) = self.max_idle_time {
            config.idle_timeout = limit(ms);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ClientOptions::from_json("{}").unwrap();
        assert_eq!(options, ClientOptions::default());
        assert!(options.pooling.enabled);
        assert_eq!(options.pooling.max_size, 25);
        assert_eq!(options.pooling.queue_timeout, None);
        assert_eq!(options.pooling.idle_timeout, None);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let options = ClientOptions::from_json(
            r#"{"Pooling": {"ENABLED": false, "maxsize": 4, "QueueTimeout": 250, "maxIdleTime": 0}}"#,
        )
        .unwrap();
        assert!(!options.pooling.enabled);
        assert_eq!(options.pooling.max_size, 4);
        assert_eq!(options.pooling.queue_timeout, Some(Duration::from_millis(250)));
        assert_eq!(options.pooling.idle_timeout, None);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            ClientOptions::from_json(r#"{"pooling": {"maxSize": 0}}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ClientOptions::from_json(r#"{"pooling": {"poolSize": 3}}"#),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            ClientOptions::from_json(r#"{"pooling": {"queueTimeout": -1}}"#),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            ClientOptions::from_json(r#"{"pooling": {"enabled": "yes"}}"#),
            Err(Error::Json(_))
        ));
        assert!(matches!(
            ClientOptions::from_json(r#"{"uri": "xdb://localhost"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ClientOptions::from_json(r#"{"pooling": {"maxSize": 2, "MAXSIZE": 3}}"#),
            Err(Error::Config(_))
        ));
        assert!(ClientOptions::from_json("[1]").is_err());
        assert!(ClientOptions::from_json("{").is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let options = ClientOptions::new().pooling(
            PoolConfig::new()
                .max_size(7)
                .idle_timeout(Duration::from_secs(2)),
        );
        let json = options.to_json().unwrap();
        let parsed = ClientOptions::from_json(&json).unwrap();
        assert_eq!(parsed.pooling.max_size, 7);
        assert_eq!(parsed.pooling.idle_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_zero_size_pool_renders_as_disabled() {
        let options = ClientOptions::new().pooling(PoolConfig::new().max_size(0));
        let json = options.to_json().unwrap();
        let parsed = ClientOptions::from_json(&json).unwrap();
        assert!(!parsed.pooling.enabled);
        assert!(!parsed.pooling.is_pooling());
        assert!(!json.contains("maxSize"));
    }
}
