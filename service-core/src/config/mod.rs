use crate::error::AppError;
use config::builder::DefaultState;
use config::{Config as Cfg, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Listener settings shared by every service.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub type Builder = ConfigBuilder<DefaultState>;

/// Load layered configuration into `T`.
///
/// Layers, lowest precedence first: `.env` (via dotenvy), service defaults
/// supplied by `defaults`, an optional `configuration.{yaml,toml,json}` file
/// in the working directory, then `APP__`-prefixed environment variables
/// using `__` as the nesting separator (e.g. `APP__SERVER__PORT=5000`).
pub fn load<T, F>(defaults: F) -> Result<T, AppError>
where
    T: DeserializeOwned,
    F: FnOnce(Builder) -> Result<Builder, ConfigError>,
{
    dotenvy::dotenv().ok();

    let builder = Cfg::builder()
        .set_default("server.host", DEFAULT_HOST)?
        .set_default("server.port", DEFAULT_PORT as i64)?;

    let config = defaults(builder)?
        .add_source(File::with_name("configuration").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}
