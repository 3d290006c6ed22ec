//! Configuration management for the pipeline.

use std::env;

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Reject invalid payloads instead of repairing them with fallbacks
    pub strict_validation: bool,
    /// Quarantine invalid embedded children instead of failing the parent
    pub drop_invalid_embedded: bool,
    /// Compendium pack addressed when an operation names none
    pub default_pack: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strict_validation: true,
            drop_invalid_embedded: false,
            default_pack: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let strict_validation = parse_flag("TOME_STRICT_VALIDATION", true)?;
        let drop_invalid_embedded = parse_flag("TOME_DROP_INVALID_EMBEDDED", false)?;
        let default_pack = env::var("TOME_DEFAULT_PACK").ok().filter(|s| !s.is_empty());

        Ok(Self {
            strict_validation,
            drop_invalid_embedded,
            default_pack,
        })
    }
}

fn parse_flag(name: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::InvalidFlag(name.to_string())),
        },
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid boolean value for {0}")]
    InvalidFlag(String),
}
