use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bson::Bson;
use kala_collection::{KalaConfig, WriteMode};
use kala_filter::Whitelist;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "settings.toml";
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid policy file {}: {message}", path.display())]
    Policy { path: PathBuf, message: String },

    #[error("invalid value for {name}: {value:?}")]
    Env { name: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the binary needs: where to listen, and the service config.
#[derive(Debug, Clone)]
pub struct Settings {
    pub addr: String,
    pub kala: KalaConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            kala: KalaConfig::default(),
        }
    }
}

#[derive(Deserialize)]
struct FileSettings {
    addr: Option<String>,
    #[serde(flatten)]
    kala: KalaConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|name| std::env::var(name).ok())
    }

    /// Defaults, then the TOML file named by `KALA_CONFIGFILE`, then the
    /// remaining `KALA_*` overrides. `lookup` reads one variable.
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = lookup("KALA_CONFIGFILE").unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        let mut settings = Self::from_file(Path::new(&path))?;
        settings.apply_env(&lookup)?;
        settings.resolve_policy()?;
        settings.validate()?;
        Ok(settings)
    }

    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let file: FileSettings = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            addr: file.addr.unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            kala: file.kala,
        })
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(fields) = lookup("KALA_FILTER_READ") {
            self.kala.read.whitelist = Some(Whitelist::parse(&fields));
        }
        if let Some(path) = lookup("KALA_FILTER_JSON") {
            self.kala.write.policy_file = Some(PathBuf::from(path));
            self.kala.write.mode = WriteMode::Probe;
        }
        if let Some(staging) = lookup("KALA_FILTER_STAGING") {
            self.kala.staging = staging;
        }
        if let Some(value) = lookup("KALA_CORS_ENABLE") {
            self.kala.cors = parse_flag("KALA_CORS_ENABLE", value)?;
        }
        if let Some(addr) = lookup("KALA_ADDR") {
            self.addr = addr;
        }
        Ok(())
    }

    /// Load `write.policy_file` into `write.policy`.
    fn resolve_policy(&mut self) -> Result<(), ConfigError> {
        let Some(path) = self.kala.write.policy_file.clone() else {
            return Ok(());
        };
        let policy_error = |message: String| ConfigError::Policy {
            path: path.clone(),
            message,
        };

        let text = std::fs::read_to_string(&path).map_err(|e| policy_error(e.to_string()))?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| policy_error(e.to_string()))?;
        match Bson::try_from(value) {
            Ok(Bson::Document(policy)) => {
                self.kala.write.policy = Some(policy);
                Ok(())
            }
            Ok(_) => Err(policy_error("policy must be a JSON object".into())),
            Err(e) => Err(policy_error(e.to_string())),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let kala = &self.kala;
        if kala.staging.trim().is_empty() {
            return Err(ConfigError::Invalid("staging collection name is empty".into()));
        }
        if kala.default_limit == 0 || kala.max_limit == Some(0) {
            return Err(ConfigError::Invalid("limits must be positive".into()));
        }
        match kala.write.mode {
            WriteMode::Whitelist if kala.write.whitelist.is_none() => Err(ConfigError::Invalid(
                "write mode \"whitelist\" needs write.whitelist".into(),
            )),
            WriteMode::Probe if kala.write.policy.is_none() => Err(ConfigError::Invalid(
                "write mode \"probe\" needs write.policy or write.policy_file".into(),
            )),
            _ => Ok(()),
        }
    }
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env { name, value }),
    }
}
