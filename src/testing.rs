//! Fixtures and fakes shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::coingecko::{FetchOutcome, TrendingPayload, TrendingSource};
use crate::platform::Messenger;

/// Raw trending coin entry shaped like the CoinGecko payload
pub fn coin_entry(id: &str, name: &str) -> Value {
    json!({
        "item": {
            "id": id,
            "coin_id": 1,
            "name": name,
            "symbol": id.to_uppercase(),
            "market_cap_rank": 42,
            "thumb": format!("https://assets.coingecko.com/coins/images/{}/thumb.png", id),
            "small": format!("https://assets.coingecko.com/coins/images/{}/small.png", id),
            "score": 0,
            "data": {
                "price": 1.23,
                "market_cap": "$1,234,567",
                "market_cap_btc": "0.00123",
                "total_volume": "$89,000",
                "total_volume_btc": "1.5",
                "sparkline": format!("https://www.coingecko.com/coins/{}/sparkline.svg", id)
            }
        }
    })
}

/// Raw trending NFT entry shaped like the CoinGecko payload
pub fn nft_entry(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "symbol": id.to_uppercase(),
        "thumb": format!("https://assets.coingecko.com/nft/{}/thumb.png", id),
        "nft_contract_id": 1234,
        "native_currency_symbol": "eth",
        "data": {
            "floor_price": "10.5 ETH",
            "floor_price_in_usd_24h_percentage_change": "-3.2",
            "h24_volume": "120 ETH",
            "h24_average_sale_price": "11 ETH",
            "sparkline": format!("https://www.coingecko.com/nft/{}/sparkline.svg", id)
        }
    })
}

/// Trending source that always answers with the same outcome
pub struct StubSource {
    outcome: FetchOutcome,
    calls: AtomicUsize,
}

impl StubSource {
    pub fn new(outcome: FetchOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(coins: Vec<Value>, nfts: Vec<Value>) -> Self {
        Self::new(FetchOutcome::Trending(TrendingPayload { coins, nfts }))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrendingSource for StubSource {
    async fn fetch_trending(&self) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { user_id: u64, text: String },
    Photo { user_id: u64, photo_url: String, caption: String },
}

/// Messenger that records every send, optionally failing for some users.
/// Like Telegram, it rejects photos whose URL does not parse.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    unreachable: HashSet<u64>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(user_ids: &[u64]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            unreachable: user_ids.iter().copied().collect(),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, user_id: u64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { user_id: to, text } if to == user_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn captions_to(&self, user_id: u64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Photo {
                    user_id: to,
                    caption,
                    ..
                } if to == user_id => Some(caption),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, user_id: u64, text: &str) -> Result<()> {
        if self.unreachable.contains(&user_id) {
            bail!("Forbidden: bot was blocked by the user");
        }
        self.sent.lock().unwrap().push(Sent::Text {
            user_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_photo(&self, user_id: u64, photo_url: &str, caption: &str) -> Result<()> {
        if self.unreachable.contains(&user_id) {
            bail!("Forbidden: bot was blocked by the user");
        }
        if reqwest::Url::parse(photo_url).is_err() {
            bail!("Bad Request: wrong HTTP URL specified");
        }
        self.sent.lock().unwrap().push(Sent::Photo {
            user_id,
            photo_url: photo_url.to_string(),
            caption: caption.to_string(),
        });
        Ok(())
    }
}
