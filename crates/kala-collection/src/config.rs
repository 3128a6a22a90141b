use std::path::PathBuf;

use bson::Document;
use kala_filter::{DEFAULT_LIMIT, UuidRepresentation, Whitelist};
use serde::{Deserialize, Serialize};

/// Service configuration, built once at start-up and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KalaConfig {
    pub version: String,
    /// Collection write probes stage candidate documents in.
    pub staging: String,
    pub default_limit: usize,
    pub max_limit: Option<usize>,
    pub cors: bool,
    pub status: bool,
    pub uuid_representation: UuidRepresentation,
    pub read: ReadConfig,
    pub write: WriteConfig,
}

impl Default for KalaConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            staging: "staging".to_string(),
            default_limit: DEFAULT_LIMIT,
            max_limit: None,
            cors: false,
            status: true,
            uuid_representation: UuidRepresentation::default(),
            read: ReadConfig::default(),
            write: WriteConfig::default(),
        }
    }
}

impl KalaConfig {
    /// The limit to apply when the client asked for `requested`. An explicit
    /// `0` asks for everything, which `max_limit` still caps.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        let limit = match requested {
            None => self.default_limit,
            Some(0) => usize::MAX,
            Some(n) => n,
        };
        self.cap(limit)
    }

    /// The `$limit` appended to aggregation pipelines. It is always finite,
    /// so an explicit `0` falls back to the default.
    pub fn aggregate_limit(&self, requested: Option<usize>) -> usize {
        let limit = match requested {
            None | Some(0) => self.default_limit,
            Some(n) => n,
        };
        self.cap(limit)
    }

    fn cap(&self, limit: usize) -> usize {
        match self.max_limit {
            Some(max) => limit.min(max),
            None => limit,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    /// `None` disables read filtering.
    pub whitelist: Option<Whitelist>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    pub mode: WriteMode,
    pub whitelist: Option<Whitelist>,
    pub policy: Option<Document>,
    /// JSON file holding the policy query; resolved into `policy` at start-up.
    pub policy_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Disabled,
    /// Keep only whitelisted top-level fields.
    Whitelist,
    /// Accept documents the policy query matches once staged.
    Probe,
    Unrestricted,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteMode::Disabled => "disabled",
            WriteMode::Whitelist => "whitelist",
            WriteMode::Probe => "probe",
            WriteMode::Unrestricted => "unrestricted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = KalaConfig::default();
        assert_eq!(config.staging, "staging");
        assert_eq!(config.default_limit, 100);
        assert_eq!(config.write.mode, WriteMode::Disabled);
        assert!(config.read.whitelist.is_none());
    }

    #[test]
    fn limit_is_capped() {
        let config = KalaConfig {
            max_limit: Some(50),
            ..KalaConfig::default()
        };
        assert_eq!(config.effective_limit(None), 50);
        assert_eq!(config.effective_limit(Some(10)), 10);
        assert_eq!(config.effective_limit(Some(500)), 50);
        assert_eq!(config.effective_limit(Some(0)), 50);
        assert_eq!(KalaConfig::default().effective_limit(Some(0)), usize::MAX);
    }

    #[test]
    fn aggregate_limit_is_always_finite() {
        let config = KalaConfig::default();
        assert_eq!(config.aggregate_limit(Some(0)), 100);
        assert_eq!(config.aggregate_limit(None), 100);
        assert_eq!(config.aggregate_limit(Some(7)), 7);

        let capped = KalaConfig {
            max_limit: Some(50),
            ..KalaConfig::default()
        };
        assert_eq!(capped.aggregate_limit(Some(0)), 50);
        assert_eq!(capped.aggregate_limit(Some(500)), 50);
    }

    #[test]
    fn deserializes_from_json() {
        let config: KalaConfig = serde_json::from_str(
            r#"{
                "read": { "whitelist": ["name", "age"] },
                "write": { "mode": "probe", "policy": { "age": { "$gt": 18 } } },
                "uuid_representation": "legacy"
            }"#,
        )
        .unwrap();
        assert_eq!(config.read.whitelist, Some(Whitelist::new(["name", "age"])));
        assert_eq!(config.write.mode, WriteMode::Probe);
        assert!(config.write.policy.is_some());
        assert_eq!(config.uuid_representation, UuidRepresentation::Legacy);
        assert_eq!(config.staging, "staging");
    }
}
