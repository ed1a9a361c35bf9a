use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::logging::LoggingConfig;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AiConfigRaw {
    available: bool,
    failure_threshold: u32,
    reset_timeout_seconds: u64,
    call_timeout_ms: u64,
}

impl Default for AiConfigRaw {
    fn default() -> Self {
        Self {
            available: true,
            failure_threshold: 5,
            reset_timeout_seconds: 30,
            call_timeout_ms: 1500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct EngineConfigRaw {
    ai: AiConfigRaw,
    rules_file: Option<PathBuf>,
    logging: LoggingConfig,
}

impl Default for EngineConfigRaw {
    fn default() -> Self {
        Self {
            ai: AiConfigRaw::default(),
            rules_file: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Resolved circuit-breaker/scorer-call bounds, matching §4.6/§5.
#[derive(Debug, Clone, Copy)]
pub struct AiConfig {
    pub available: bool,
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub call_timeout: Duration,
}

/// Top-level resolved configuration for a running engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub ai: AiConfig,
    pub rules_file: Option<PathBuf>,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Reads and parses an engine config TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for EngineConfig {
    type Err = anyhow::Error;

    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: EngineConfigRaw = toml::from_str(toml_str)?;
        Ok(EngineConfig {
            ai: AiConfig {
                available: raw.ai.available,
                failure_threshold: raw.ai.failure_threshold,
                reset_timeout: Duration::from_secs(raw.ai.reset_timeout_seconds),
                call_timeout: Duration::from_millis(raw.ai.call_timeout_ms),
            },
            rules_file: raw.rules_file,
            logging: raw.logging,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let raw = EngineConfigRaw::default();
        EngineConfig {
            ai: AiConfig {
                available: raw.ai.available,
                failure_threshold: raw.ai.failure_threshold,
                reset_timeout: Duration::from_secs(raw.ai.reset_timeout_seconds),
                call_timeout: Duration::from_millis(raw.ai.call_timeout_ms),
            },
            rules_file: raw.rules_file,
            logging: raw.logging,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_resolves_to_defaults() {
        let cfg: EngineConfig = "".parse().unwrap();
        assert!(cfg.ai.available);
        assert_eq!(cfg.ai.failure_threshold, 5);
        assert_eq!(cfg.ai.reset_timeout, Duration::from_secs(30));
        assert_eq!(cfg.ai.call_timeout, Duration::from_millis(1500));
        assert!(cfg.rules_file.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let toml = r#"
rules_file = "rules/custom.json"

[ai]
available = false
failure_threshold = 3
reset_timeout_seconds = 10
call_timeout_ms = 500

[logging]
level = "debug"
"#;
        let cfg: EngineConfig = toml.parse().unwrap();
        assert!(!cfg.ai.available);
        assert_eq!(cfg.ai.failure_threshold, 3);
        assert_eq!(cfg.ai.reset_timeout, Duration::from_secs(10));
        assert_eq!(cfg.rules_file, Some(PathBuf::from("rules/custom.json")));
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!("ai = [".parse::<EngineConfig>().is_err());
    }
}
