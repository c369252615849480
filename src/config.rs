use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Environment variable holding the Telegram bot token
pub const BOT_TOKEN_VAR: &str = "BOT_TOKEN";
/// Environment variable holding the CoinGecko demo API key
pub const API_KEY_VAR: &str = "API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub coingecko: CoinGeckoConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoinGeckoConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Load the optional TOML file at `path`, then apply secrets from the
    /// process environment. A missing file is not an error; missing secrets are.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?
        } else {
            info!("No config file at {}, using defaults", path.display());
            String::new()
        };

        Self::from_parts(&content, |key| std::env::var(key).ok())
    }

    /// Build a config from TOML text and an environment lookup.
    pub fn from_parts<F>(content: &str, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config =
            toml::from_str(content).context("Failed to parse config file")?;

        if let Some(token) = env(BOT_TOKEN_VAR).filter(|v| !v.trim().is_empty()) {
            config.telegram.bot_token = token;
        }
        if let Some(key) = env(API_KEY_VAR).filter(|v| !v.trim().is_empty()) {
            config.coingecko.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            bail!("{} is not set", BOT_TOKEN_VAR);
        }
        if self.coingecko.api_key.trim().is_empty() {
            bail!("{} is not set", API_KEY_VAR);
        }
        if self.coingecko.request_timeout_secs == 0 {
            bail!("coingecko.request_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
