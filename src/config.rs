//! Configuration management
//!
//! Defaults, optionally overlaid by a TOML file, then by `FINCHAT_*`
//! environment variables.

use crate::circuit::CircuitBreakerConfig;
use crate::metrics::MetricsConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Longest metrics retention window accepted from configuration
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Per-call cascade options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Record a `SkillExecutionResult` for every attempt
    pub enable_metrics: bool,
    /// Consult and populate the execution cache
    pub enable_caching: bool,
    /// Consult and update per-skill breaker state
    pub enable_circuit_breaker: bool,
    /// Budget for each stage invocation
    pub timeout_ms: u64,
    /// Reserved; stages are not retried
    pub max_retries: u32,
    /// TTL for entries written by this call
    pub cache_ttl_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            enable_caching: true,
            enable_circuit_breaker: true,
            timeout_ms: 5_000,
            max_retries: 0,
            cache_ttl_ms: 5 * 60 * 1000,
        }
    }
}

impl EngineConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// Execution cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 1_000 }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub metrics: MetricsConfig,
    /// Register the built-in finance skills at startup
    pub builtin_skills: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            cache: CacheConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            metrics: MetricsConfig::default(),
            builtin_skills: true,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl AssistantConfig {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Apply `FINCHAT_*` overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_env(&lookup, "FINCHAT_METRICS_ENABLED", parse_bool)? {
            self.engine.enable_metrics = v;
        }
        if let Some(v) = parse_env(&lookup, "FINCHAT_CACHE_ENABLED", parse_bool)? {
            self.engine.enable_caching = v;
        }
        if let Some(v) = parse_env(&lookup, "FINCHAT_CIRCUIT_BREAKER_ENABLED", parse_bool)? {
            self.engine.enable_circuit_breaker = v;
        }
        if let Some(v) = parse_env(&lookup, "FINCHAT_STAGE_TIMEOUT_MS", |s| s.parse::<u64>().ok())? {
            self.engine.timeout_ms = v;
        }
        if let Some(v) = parse_env(&lookup, "FINCHAT_CACHE_TTL_MS", |s| s.parse::<u64>().ok())? {
            self.engine.cache_ttl_ms = v;
        }
        if let Some(v) = parse_env(&lookup, "FINCHAT_CACHE_MAX_ENTRIES", |s| s.parse::<u64>().ok())? {
            self.cache.max_entries = v;
        }
        if let Some(v) = parse_env(&lookup, "FINCHAT_BREAKER_THRESHOLD", |s| s.parse::<u32>().ok())? {
            self.circuit_breaker.failure_threshold = v;
        }
        if let Some(v) =
            parse_env(&lookup, "FINCHAT_BREAKER_COOLDOWN_SECS", |s| s.parse::<u64>().ok())?
        {
            self.circuit_breaker.cool_down = Duration::from_secs(v);
        }
        if let Some(v) =
            parse_env(&lookup, "FINCHAT_METRICS_RETENTION_DAYS", |s| s.parse::<i64>().ok())?
        {
            self.metrics.retention_days = v;
        }
        if let Some(v) = parse_env(&lookup, "FINCHAT_BUILTIN_SKILLS", parse_bool)? {
            self.builtin_skills = v;
        }
        self.validate()
    }

    /// Reject settings the engine cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        let days = self.metrics.retention_days;
        if !(1..=MAX_RETENTION_DAYS).contains(&days) {
            return Err(ConfigError::Invalid {
                field: "metrics.retention_days".to_string(),
                reason: format!("{} is outside 1-{}", days, MAX_RETENTION_DAYS),
            });
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_env<T, L, P>(lookup: &L, var: &str, parse: P) -> Result<Option<T>, ConfigError>
where
    L: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => parse(value.trim()).map(Some).ok_or(ConfigError::InvalidEnv {
            var: var.to_string(),
            value,
        }),
    }
}
