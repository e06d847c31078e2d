use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{RoundtableError, SecretValue, require_env};

const DEFAULT_CONFIG_PATH: &str = "roundtable.toml";
const CONFIG_PATH_ENV: &str = "ROUNDTABLE_CONFIG";

/// Top-level configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RoundtableConfig {
    pub llm: LlmConfig,
    pub conversation: ConversationConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

impl RoundtableConfig {
    /// Resolve the configured LLM secret value (from environment only).
    pub fn llm_api_key(&self) -> Result<SecretValue, RoundtableError> {
        require_env(&self.llm.api_key_env)
    }
}

/// Helper to load configuration with best-practice guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `ROUNDTABLE_CONFIG` environment variable.
    /// 3. `roundtable.toml` in the current working directory.
    ///
    /// A missing default file yields the built-in defaults; an explicitly
    /// requested path must exist.
    pub fn load(path: Option<PathBuf>) -> Result<RoundtableConfig, RoundtableError> {
        let explicit = path.is_some() || env::var(CONFIG_PATH_ENV).is_ok();
        let candidate = resolve_path(path);

        let config = if candidate.exists() {
            let raw = fs::read_to_string(&candidate)
                .map_err(|err| RoundtableError::config_io(candidate.clone(), err))?;
            toml::from_str(&raw)
                .map_err(|err| RoundtableError::InvalidConfiguration(err.to_string()))?
        } else if explicit {
            return Err(RoundtableError::config_io(
                candidate,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        } else {
            RoundtableConfig::default()
        };

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &RoundtableConfig) -> Result<(), RoundtableError> {
        if config.llm.api_key_env.trim().is_empty() {
            return Err(RoundtableError::InvalidConfiguration(
                "llm.api_key_env must reference an environment variable".into(),
            ));
        }
        if config.conversation.max_rounds == 0 {
            return Err(RoundtableError::InvalidConfiguration(
                "conversation.max_rounds must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&config.llm.temperature) {
            return Err(RoundtableError::InvalidConfiguration(
                "llm.temperature must be within [0.0, 2.0]".into(),
            ));
        }
        Ok(())
    }
}

fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = path {
        return path;
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return PathBuf::from(from_env);
        }
    }

    Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Maximum research/synthesis/critique cycles before the chat ends.
    pub max_rounds: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self { max_rounds: 20 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_results: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
