// ABOUTME: Configuration loading and validation for herald runs.
// ABOUTME: Reads HERALD_* environment variables and applies defaults.

use thiserror::Error;

/// Default cap on model calls per user message.
pub const DEFAULT_MAX_STEPS: usize = 10;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HERALD_MAX_STEPS must be a positive integer, got {0:?}")]
    InvalidMaxSteps(String),

    #[error("HERALD_PROVIDER is set but empty")]
    EmptyProvider,
}

/// Run configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeraldConfig {
    pub provider: String,
    pub max_steps: usize,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl HeraldConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - HERALD_PROVIDER: LLM provider (default: gemini)
    /// - HERALD_MAX_STEPS: model calls allowed per user message (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let provider = match lookup("HERALD_PROVIDER") {
            Some(p) if p.trim().is_empty() => return Err(ConfigError::EmptyProvider),
            Some(p) => p.trim().to_lowercase(),
            None => defaults.provider,
        };

        let max_steps = match lookup("HERALD_MAX_STEPS") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidMaxSteps(raw)),
            },
            None => defaults.max_steps,
        };

        Ok(Self {
            provider,
            max_steps,
        })
    }
}
