use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Settings {
    /// Load settings from `<config dir>/default.toml` (optional) with
    /// `TARCAST_*` environment variable overrides, e.g. `TARCAST_SERVER__PORT`.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = env::var("TARCAST_CONFIG_DIR").unwrap_or_else(|_| "config".into());

        Config::builder()
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(Environment::with_prefix("TARCAST").separator("__"))
            .build()?
            .try_deserialize()
    }
}
