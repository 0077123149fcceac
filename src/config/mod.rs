//! Application configuration

pub mod client;
pub mod prompts;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use client::ClientConfig;
pub use prompts::{builtin as prompts_builtin, PromptTemplate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub data_dir: PathBuf,
    pub client_config_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            data_dir: env::var("MINDEASE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            client_config_path: env::var("MINDEASE_CONFIG").ok().map(PathBuf::from),
        })
    }

    /// Load the TOML client config if one is set, defaults otherwise.
    pub fn load_client_config(&self) -> Result<ClientConfig, client::ConfigError> {
        match &self.client_config_path {
            Some(path) => ClientConfig::from_file(path),
            None => Ok(ClientConfig::default()),
        }
    }

    /// Resolve the API key, preferring the variable named in the client config.
    pub fn api_key(&self, client: &ClientConfig) -> Option<String> {
        env::var(&client.llm.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.gemini_api_key.clone())
    }
}
