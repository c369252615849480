use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::CoinGeckoConfig;

const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Raw `/search/trending` body, entries left untouched
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TrendingPayload {
    #[serde(default)]
    pub coins: Vec<Value>,
    #[serde(default)]
    pub nfts: Vec<Value>,
}

/// Result of one trending request
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 200 with a decodable body
    Trending(TrendingPayload),
    /// The API answered with something other than 200
    Unavailable(StatusCode),
    /// Transport error, timeout or an undecodable body
    Failed(String),
}

impl FetchOutcome {
    /// Raw (coins, nfts); both empty unless the request succeeded
    pub fn into_lists(self) -> (Vec<Value>, Vec<Value>) {
        match self {
            FetchOutcome::Trending(payload) => (payload.coins, payload.nfts),
            FetchOutcome::Unavailable(_) | FetchOutcome::Failed(_) => (Vec::new(), Vec::new()),
        }
    }

    /// Log the outcome so an API failure is not mistaken for an empty list
    pub fn log(&self) {
        match self {
            FetchOutcome::Trending(payload) => info!(
                "Fetched {} trending coin(s) and {} trending NFT(s)",
                payload.coins.len(),
                payload.nfts.len()
            ),
            FetchOutcome::Unavailable(status) => {
                warn!("CoinGecko trending request returned {}", status)
            }
            FetchOutcome::Failed(reason) => warn!("CoinGecko trending request failed: {}", reason),
        }
    }
}

/// Interpret a trending response. Anything but 200 yields `Unavailable`,
/// whatever the body says.
pub fn parse_trending_response(status: StatusCode, body: &str) -> FetchOutcome {
    if status != StatusCode::OK {
        return FetchOutcome::Unavailable(status);
    }
    match serde_json::from_str::<TrendingPayload>(body) {
        Ok(payload) => FetchOutcome::Trending(payload),
        Err(e) => FetchOutcome::Failed(format!("invalid response body: {}", e)),
    }
}

/// Anything that can produce the current trending lists
#[async_trait]
pub trait TrendingSource: Send + Sync {
    async fn fetch_trending(&self) -> FetchOutcome;
}

pub struct CoinGeckoClient {
    client: reqwest::Client,
    config: CoinGeckoConfig,
}

impl CoinGeckoClient {
    pub fn new(config: CoinGeckoConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build CoinGecko HTTP client")?;
        Ok(Self { client, config })
    }

    fn trending_url(&self) -> String {
        format!("{}/search/trending", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TrendingSource for CoinGeckoClient {
    async fn fetch_trending(&self) -> FetchOutcome {
        let url = self.trending_url();
        debug!("Sending request to CoinGecko: {}", url);

        let response = match self
            .client
            .get(&url)
            .header("accept", "application/json")
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Failed(format!("request error: {}", e)),
        };

        let status = response.status();
        match response.text().await {
            Ok(body) => parse_trending_response(status, &body),
            Err(e) => FetchOutcome::Failed(format!("failed to read response body: {}", e)),
        }
    }
}
