use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::{LocusError, Result};
use crate::types::Credentials;

pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_USER_AGENT: &str = "LocusBot/1.0 (contact@example.com)";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Fallback credentials, overridden per request
    pub credentials: Credentials,

    // Models
    pub llm_model: String,
    pub embedding_model: String,

    // Pipeline tuning
    pub agent_timeout: Duration,
    pub similarity_threshold: f32,
    pub max_backend_concurrency: usize,

    // HTTP
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            agent_timeout: Duration::from_secs(90),
            similarity_threshold: 0.85,
            max_backend_concurrency: 4,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables. Every variable is
    /// optional; malformed numbers are rejected.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let similarity_threshold: f32 = parse_or(
            optional("LOCUS_SIMILARITY_THRESHOLD"),
            "LOCUS_SIMILARITY_THRESHOLD",
            defaults.similarity_threshold,
        )?;
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(LocusError::Config(format!(
                "LOCUS_SIMILARITY_THRESHOLD must be within [0, 1], got {similarity_threshold}"
            )));
        }

        let timeout_secs: u64 = parse_or(
            optional("LOCUS_AGENT_TIMEOUT_SECS"),
            "LOCUS_AGENT_TIMEOUT_SECS",
            defaults.agent_timeout.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(LocusError::Config(
                "LOCUS_AGENT_TIMEOUT_SECS must be positive".to_string(),
            ));
        }

        let max_backend_concurrency: usize = parse_or(
            optional("LOCUS_MAX_BACKEND_CONCURRENCY"),
            "LOCUS_MAX_BACKEND_CONCURRENCY",
            defaults.max_backend_concurrency,
        )?;
        if max_backend_concurrency == 0 {
            return Err(LocusError::Config(
                "LOCUS_MAX_BACKEND_CONCURRENCY must be positive".to_string(),
            ));
        }

        Ok(Self {
            credentials: Credentials {
                openai_api_key: optional("OPENAI_API_KEY"),
                google_maps_api_key: optional("GOOGLE_MAPS_API_KEY"),
                tavily_api_key: optional("TAVILY_API_KEY"),
            },
            llm_model: optional("LOCUS_LLM_MODEL").unwrap_or(defaults.llm_model),
            embedding_model: optional("LOCUS_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            agent_timeout: Duration::from_secs(timeout_secs),
            similarity_threshold,
            max_backend_concurrency,
            user_agent: optional("LOCUS_USER_AGENT").unwrap_or(defaults.user_agent),
        })
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        let present = |v: &Option<String>| if v.is_some() { "set" } else { "unset" };
        info!(
            openai_api_key = present(&self.credentials.openai_api_key),
            google_maps_api_key = present(&self.credentials.google_maps_api_key),
            tavily_api_key = present(&self.credentials.tavily_api_key),
            llm_model = self.llm_model.as_str(),
            embedding_model = self.embedding_model.as_str(),
            agent_timeout_secs = self.agent_timeout.as_secs(),
            similarity_threshold = self.similarity_threshold,
            max_backend_concurrency = self.max_backend_concurrency,
            "Config loaded"
        );
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| LocusError::Config(format!("{key}={value:?} is invalid: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.llm_model, DEFAULT_LLM_MODEL);
        assert_eq!(config.agent_timeout, Duration::from_secs(90));
        assert_eq!(config.similarity_threshold, 0.85);
        assert_eq!(config.max_backend_concurrency, 4);
        assert!(config.credentials.openai_api_key.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("LOCUS_AGENT_TIMEOUT_SECS", "30"),
            ("LOCUS_SIMILARITY_THRESHOLD", "0.9"),
            ("LOCUS_LLM_MODEL", "gpt-4o"),
        ]))
        .unwrap();
        assert_eq!(config.credentials.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.agent_timeout, Duration::from_secs(30));
        assert_eq!(config.similarity_threshold, 0.9);
        assert_eq!(config.llm_model, "gpt-4o");
    }

    #[test]
    fn blank_credentials_are_unset() {
        let config = Config::from_lookup(lookup(&[("TAVILY_API_KEY", "  ")])).unwrap();
        assert!(config.credentials.tavily_api_key.is_none());
    }

    #[test]
    fn malformed_numbers_are_config_errors() {
        let err = Config::from_lookup(lookup(&[("LOCUS_AGENT_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, LocusError::Config(_)));

        let err =
            Config::from_lookup(lookup(&[("LOCUS_SIMILARITY_THRESHOLD", "1.5")])).unwrap_err();
        assert!(matches!(err, LocusError::Config(_)));

        let err =
            Config::from_lookup(lookup(&[("LOCUS_MAX_BACKEND_CONCURRENCY", "0")])).unwrap_err();
        assert!(matches!(err, LocusError::Config(_)));
    }
}
