use secrecy::Secret;
use serde::Deserialize;
use service_core::config::{self as core_config, ServerConfig};
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const SERVICE_NAME: &str = "genetics-service";

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DATABASE_PATH: &str = "database.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MODEL: &str = "HuggingFaceH4/zephyr-7b-beta";
const DEFAULT_API_BASE: &str = "https://api-inference.huggingface.co";
const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 300;

/// Credential variables checked in order; the first non-empty one wins.
const TOKEN_VARIABLES: [&str; 2] = ["HF_TOKEN", "HF_API_TOKEN"];

#[derive(Debug, Clone, Deserialize)]
pub struct GeneticsConfig {
    pub server: ServerConfig,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
    pub database: DatabaseConfig,
    pub chat: ChatConfig,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file; bootstrapped from the bundled scripts if absent.
    pub path: PathBuf,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Inference credential. `None` disables the chatbot.
    #[serde(default)]
    pub api_token: Option<Secret<String>>,
    pub model: String,
    pub api_base: String,
    pub max_tokens: u32,
    pub history_window: usize,
    pub timeout_secs: u64,
    pub session_ttl_secs: u64,
    pub purge_interval_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ChatConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            history_window: crate::models::HISTORY_WINDOW,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            purge_interval_secs: DEFAULT_PURGE_INTERVAL_SECS,
        }
    }
}

impl GeneticsConfig {
    pub fn load() -> Result<Self, AppError> {
        let mut config: GeneticsConfig = core_config::load(|builder| {
            builder
                .set_default("server.port", DEFAULT_PORT as i64)?
                .set_default("static_dir", default_static_dir())?
                .set_default("database.path", DEFAULT_DATABASE_PATH)?
                .set_default("database.max_connections", DEFAULT_MAX_CONNECTIONS as i64)?
                .set_default("chat.model", DEFAULT_MODEL)?
                .set_default("chat.api_base", DEFAULT_API_BASE)?
                .set_default("chat.max_tokens", DEFAULT_MAX_TOKENS as i64)?
                .set_default("chat.history_window", crate::models::HISTORY_WINDOW as i64)?
                .set_default("chat.timeout_secs", DEFAULT_TIMEOUT_SECS as i64)?
                .set_default("chat.session_ttl_secs", DEFAULT_SESSION_TTL_SECS as i64)?
                .set_default("chat.purge_interval_secs", DEFAULT_PURGE_INTERVAL_SECS as i64)
        })?;

        if config.chat.api_token.is_none() {
            config.chat.api_token = token_from_env();
        }
        if config.otlp_endpoint.is_none() {
            config.otlp_endpoint = env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.chat.history_window < 2 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "chat.history_window must hold at least one exchange (got {})",
                self.chat.history_window
            )));
        }
        if self.chat.max_tokens == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "chat.max_tokens must be at least 1"
            )));
        }
        if self.database.max_connections == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "database.max_connections must be at least 1"
            )));
        }
        Ok(())
    }
}

fn token_from_env() -> Option<Secret<String>> {
    TOKEN_VARIABLES
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .map(Secret::new)
}

fn default_static_dir() -> String {
    concat!(env!("CARGO_MANIFEST_DIR"), "/static").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GeneticsConfig {
        GeneticsConfig {
            server: ServerConfig::default(),
            static_dir: PathBuf::from(default_static_dir()),
            database: DatabaseConfig {
                path: PathBuf::from(DEFAULT_DATABASE_PATH),
                max_connections: DEFAULT_MAX_CONNECTIONS,
            },
            chat: ChatConfig::default(),
            otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }

    #[test]
    fn chat_defaults_match_the_service_contract() {
        let chat = ChatConfig::default();
        assert_eq!(chat.max_tokens, 500);
        assert_eq!(chat.history_window, 10);
        assert_eq!(chat.model, "HuggingFaceH4/zephyr-7b-beta");
        assert!(chat.api_token.is_none());
    }

    #[test]
    fn rejects_window_smaller_than_one_exchange() {
        let mut config = sample();
        config.chat.history_window = 1;
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn rejects_zero_max_tokens() {
        let mut config = sample();
        config.chat.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sample_config_is_valid() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn purge_interval_is_never_zero() {
        let chat = ChatConfig {
            purge_interval_secs: 0,
            ..ChatConfig::default()
        };
        assert_eq!(chat.purge_interval(), Duration::from_secs(1));
    }
}
