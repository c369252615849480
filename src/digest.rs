use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::coingecko::TrendingSource;
use crate::format::{format_coin_message, format_nft_message};
use crate::platform::Messenger;
use crate::subscribers::{Subscriber, SubscriberRegistry, SubscriberState};
use crate::trending::{normalize_coins, normalize_nfts, TrendingCoin, TrendingNft};

pub const FETCHING_NOTICE: &str = "Fetching trending data ..";
pub const FETCHED_NOTICE: &str = "Fetched trending data !";

/// Which half of the trending payload a digest carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    Coins,
    Nfts,
}

impl DigestKind {
    /// Sent instead of records when there is nothing to show
    pub fn failure_notice(self) -> &'static str {
        match self {
            DigestKind::Coins => "Failed to fetch trending coins.",
            DigestKind::Nfts => "Failed to fetch trending NFTs.",
        }
    }
}

impl std::fmt::Display for DigestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DigestKind::Coins => write!(f, "coins"),
            DigestKind::Nfts => write!(f, "nfts"),
        }
    }
}

/// A record that can be sent as a photo with a caption
trait DigestRecord: Sync {
    fn thumb_url(&self) -> &str;
    fn caption(&self, display_name: &str, now: DateTime<Utc>) -> String;
}

impl DigestRecord for TrendingCoin {
    fn thumb_url(&self) -> &str {
        &self.thumb_url
    }

    fn caption(&self, display_name: &str, now: DateTime<Utc>) -> String {
        format_coin_message(display_name, self, now)
    }
}

impl DigestRecord for TrendingNft {
    fn thumb_url(&self) -> &str {
        &self.thumb_url
    }

    fn caption(&self, display_name: &str, now: DateTime<Utc>) -> String {
        format_nft_message(display_name, self, now)
    }
}

/// Outcome of one scheduled broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub subscribers: usize,
    pub failed: usize,
}

/// Normalized lists from a single fetch
#[derive(Debug, Clone, Default)]
pub struct Digest {
    pub coins: Vec<TrendingCoin>,
    pub nfts: Vec<TrendingNft>,
}

/// Fetches trending data and pushes it to subscribers
pub struct DigestService {
    source: Arc<dyn TrendingSource>,
    subscribers: SubscriberRegistry,
}

impl DigestService {
    pub fn new(source: Arc<dyn TrendingSource>, subscribers: SubscriberRegistry) -> Self {
        Self {
            source,
            subscribers,
        }
    }

    pub fn subscribers(&self) -> &SubscriberRegistry {
        &self.subscribers
    }

    /// Fetch once and normalize both kinds. A malformed entry fails the call.
    pub async fn fetch_digest(&self) -> Result<Digest> {
        let outcome = self.source.fetch_trending().await;
        outcome.log();
        let (coins, nfts) = outcome.into_lists();
        Ok(Digest {
            coins: normalize_coins(&coins)?,
            nfts: normalize_nfts(&nfts)?,
        })
    }

    /// Send one digest kind to every current subscriber.
    ///
    /// The data is fetched once per cycle and normalized before anything is
    /// sent, so a malformed entry aborts the cycle for everyone. A delivery
    /// failure only stops the affected subscriber; a rejected thumbnail
    /// falls back to a plain text caption.
    pub async fn broadcast(
        &self,
        kind: DigestKind,
        messenger: &dyn Messenger,
    ) -> Result<BroadcastSummary> {
        let outcome = self.source.fetch_trending().await;
        outcome.log();
        let (coins, nfts) = outcome.into_lists();

        let subscribers = self.subscribers.snapshot().await;
        info!(
            "Broadcasting {} digest to {} subscriber(s)",
            kind,
            subscribers.len()
        );

        let failed = match kind {
            DigestKind::Coins => {
                let coins = normalize_coins(&coins)?;
                deliver_all(messenger, &subscribers, &coins, kind).await
            }
            DigestKind::Nfts => {
                let nfts = normalize_nfts(&nfts)?;
                deliver_all(messenger, &subscribers, &nfts, kind).await
            }
        };

        Ok(BroadcastSummary {
            subscribers: subscribers.len(),
            failed,
        })
    }

    /// On-demand digest for one named subscriber: coins, then NFTs
    pub async fn send_full_digest(&self, messenger: &dyn Messenger, user_id: u64) -> Result<()> {
        let display_name = match self.subscribers.state(user_id).await {
            SubscriberState::Named(name) => name,
            SubscriberState::Unknown => bail!("User {} has not picked a display name", user_id),
        };
        let subscriber = Subscriber {
            user_id,
            display_name,
        };

        messenger.send_text(user_id, FETCHING_NOTICE).await?;
        let digest = self.fetch_digest().await?;
        messenger.send_text(user_id, FETCHED_NOTICE).await?;

        deliver(messenger, &subscriber, &digest.coins, DigestKind::Coins).await?;
        deliver(messenger, &subscriber, &digest.nfts, DigestKind::Nfts).await?;
        Ok(())
    }
}

/// Deliver to each subscriber in turn, returning how many failed
async fn deliver_all<R: DigestRecord>(
    messenger: &dyn Messenger,
    subscribers: &[Subscriber],
    records: &[R],
    kind: DigestKind,
) -> usize {
    let mut failed = 0;
    for subscriber in subscribers {
        if let Err(e) = deliver(messenger, subscriber, records, kind).await {
            warn!(
                "Failed to deliver {} digest to {}: {:#}",
                kind, subscriber.user_id, e
            );
            failed += 1;
        }
    }
    failed
}

async fn deliver<R: DigestRecord>(
    messenger: &dyn Messenger,
    subscriber: &Subscriber,
    records: &[R],
    kind: DigestKind,
) -> Result<()> {
    if records.is_empty() {
        return messenger
            .send_text(subscriber.user_id, kind.failure_notice())
            .await;
    }

    for record in records {
        let caption = record.caption(&subscriber.display_name, Utc::now());
        if let Err(e) = messenger
            .send_photo(subscriber.user_id, record.thumb_url(), &caption)
            .await
        {
            // The caption alone still carries the record
            warn!(
                "Photo {} rejected for {}, sending caption as text: {:#}",
                record.thumb_url(),
                subscriber.user_id,
                e
            );
            messenger.send_text(subscriber.user_id, &caption).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coingecko::FetchOutcome;
    use crate::testing::{coin_entry, nft_entry, RecordingMessenger, Sent, StubSource};
    use reqwest::StatusCode;
    use serde_json::Value;

    async fn service_with(
        source: StubSource,
        names: &[(u64, &str)],
    ) -> (DigestService, Arc<StubSource>) {
        let source = Arc::new(source);
        let registry = SubscriberRegistry::new();
        for (user_id, name) in names {
            registry.set_name(*user_id, name).await;
        }
        (DigestService::new(source.clone(), registry), source)
    }

    fn coins(ids: &[&str]) -> Vec<Value> {
        ids.iter().map(|id| coin_entry(id, id)).collect()
    }

    fn nfts(ids: &[&str]) -> Vec<Value> {
        ids.iter().map(|id| nft_entry(id, id)).collect()
    }

    #[tokio::test]
    async fn test_empty_coins_sends_one_notice() {
        let (service, _) =
            service_with(StubSource::with(vec![], nfts(&["milady"])), &[(1, "Alice")]).await;
        let messenger = RecordingMessenger::new();

        let summary = service.broadcast(DigestKind::Coins, &messenger).await.unwrap();

        assert_eq!(summary, BroadcastSummary { subscribers: 1, failed: 0 });
        assert_eq!(messenger.texts_to(1), vec!["Failed to fetch trending coins."]);
        assert!(messenger.captions_to(1).is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_api_sends_notice() {
        let source = StubSource::new(FetchOutcome::Unavailable(StatusCode::TOO_MANY_REQUESTS));
        let (service, _) = service_with(source, &[(1, "Alice"), (2, "Bob")]).await;
        let messenger = RecordingMessenger::new();

        service.broadcast(DigestKind::Nfts, &messenger).await.unwrap();

        assert_eq!(messenger.texts_to(1), vec!["Failed to fetch trending NFTs."]);
        assert_eq!(messenger.texts_to(2), vec!["Failed to fetch trending NFTs."]);
        assert_eq!(messenger.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_coin_cycle_sends_one_photo_per_coin() {
        let (service, source) = service_with(
            StubSource::with(coins(&["pepe", "bonk", "wif"]), nfts(&["milady"])),
            &[(1, "Alice"), (2, "Bob")],
        )
        .await;
        let messenger = RecordingMessenger::new();

        let summary = service.broadcast(DigestKind::Coins, &messenger).await.unwrap();

        assert_eq!(summary, BroadcastSummary { subscribers: 2, failed: 0 });
        assert_eq!(source.calls(), 1);
        for (user_id, name) in [(1, "Alice"), (2, "Bob")] {
            let captions = messenger.captions_to(user_id);
            assert_eq!(captions.len(), 3);
            assert!(captions.iter().all(|c| c.starts_with(&format!("GM {}!", name))));
            assert!(captions.iter().all(|c| c.contains("TRENDING COINS")));
            assert!(messenger.texts_to(user_id).is_empty());
        }
        match &messenger.sent()[0] {
            Sent::Photo { photo_url, caption, .. } => {
                assert_eq!(photo_url, "https://assets.coingecko.com/coins/images/pepe/small.png");
                assert!(caption.contains("Coin ID: pepe"));
            }
            other => panic!("expected a photo, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nft_cycle_sends_only_nfts() {
        let (service, _) = service_with(
            StubSource::with(coins(&["pepe"]), nfts(&["milady", "azuki"])),
            &[(5, "Eve")],
        )
        .await;
        let messenger = RecordingMessenger::new();

        service.broadcast(DigestKind::Nfts, &messenger).await.unwrap();

        let captions = messenger.captions_to(5);
        assert_eq!(captions.len(), 2);
        assert!(captions.iter().all(|c| c.contains("TRENDING NFTS")));
    }

    #[tokio::test]
    async fn test_malformed_entry_aborts_cycle() {
        let mut broken = coin_entry("broken", "Broken");
        broken["item"].as_object_mut().unwrap().remove("small");
        let (service, _) = service_with(
            StubSource::with(vec![coin_entry("ok", "Ok"), broken], vec![]),
            &[(1, "Alice"), (2, "Bob")],
        )
        .await;
        let messenger = RecordingMessenger::new();

        assert!(service.broadcast(DigestKind::Coins, &messenger).await.is_err());
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_nft_does_not_block_coin_cycle() {
        let (service, _) = service_with(
            StubSource::with(coins(&["pepe"]), vec![serde_json::json!({"name": "half"})]),
            &[(1, "Alice")],
        )
        .await;
        let messenger = RecordingMessenger::new();

        service.broadcast(DigestKind::Coins, &messenger).await.unwrap();
        assert_eq!(messenger.captions_to(1).len(), 1);
        assert!(service.broadcast(DigestKind::Nfts, &messenger).await.is_err());
    }

    #[tokio::test]
    async fn test_delivery_failure_skips_only_that_subscriber() {
        let (service, _) = service_with(
            StubSource::with(coins(&["pepe", "bonk"]), vec![]),
            &[(1, "Alice"), (2, "Bob"), (3, "Carol")],
        )
        .await;
        let messenger = RecordingMessenger::failing_for(&[2]);

        let summary = service.broadcast(DigestKind::Coins, &messenger).await.unwrap();

        assert_eq!(summary, BroadcastSummary { subscribers: 3, failed: 1 });
        assert_eq!(messenger.captions_to(1).len(), 2);
        assert!(messenger.captions_to(2).is_empty());
        assert_eq!(messenger.captions_to(3).len(), 2);
    }

    #[tokio::test]
    async fn test_bad_thumbnail_falls_back_to_text() {
        let mut odd = coin_entry("odd", "Odd");
        odd["item"]["small"] = Value::from("missing_small.png");
        let (service, _) = service_with(
            StubSource::with(
                vec![coin_entry("pepe", "Pepe"), odd, coin_entry("bonk", "Bonk")],
                nfts(&["milady"]),
            ),
            &[(1, "Alice")],
        )
        .await;
        let messenger = RecordingMessenger::new();

        let summary = service.broadcast(DigestKind::Coins, &messenger).await.unwrap();

        assert_eq!(summary, BroadcastSummary { subscribers: 1, failed: 0 });
        let captions = messenger.captions_to(1);
        assert_eq!(captions.len(), 2);
        assert!(captions[0].contains("Coin ID: pepe"));
        assert!(captions[1].contains("Coin ID: bonk"));
        let texts = messenger.texts_to(1);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("GM Alice!"));
        assert!(texts[0].contains("Coin ID: odd"));

        service.send_full_digest(&messenger, 1).await.unwrap();
        let nft_captions: Vec<_> = messenger
            .captions_to(1)
            .into_iter()
            .filter(|c| c.contains("TRENDING NFTS"))
            .collect();
        assert_eq!(nft_captions.len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let (service, _) = service_with(StubSource::with(coins(&["pepe"]), vec![]), &[]).await;
        let messenger = RecordingMessenger::new();

        let summary = service.broadcast(DigestKind::Coins, &messenger).await.unwrap();
        assert_eq!(summary, BroadcastSummary { subscribers: 0, failed: 0 });
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_full_digest_order() {
        let (service, source) = service_with(
            StubSource::with(coins(&["pepe", "bonk"]), vec![]),
            &[(9, "Alice")],
        )
        .await;
        let messenger = RecordingMessenger::new();

        service.send_full_digest(&messenger, 9).await.unwrap();

        assert_eq!(source.calls(), 1);
        let sent = messenger.sent();
        assert_eq!(sent.len(), 5);
        assert_eq!(
            sent[0],
            Sent::Text { user_id: 9, text: FETCHING_NOTICE.to_string() }
        );
        assert_eq!(
            sent[1],
            Sent::Text { user_id: 9, text: FETCHED_NOTICE.to_string() }
        );
        assert!(matches!(sent[2], Sent::Photo { .. }));
        assert!(matches!(sent[3], Sent::Photo { .. }));
        assert_eq!(
            sent[4],
            Sent::Text { user_id: 9, text: "Failed to fetch trending NFTs.".to_string() }
        );
    }

    #[tokio::test]
    async fn test_full_digest_requires_name() {
        let (service, source) = service_with(StubSource::with(vec![], vec![]), &[]).await;
        let messenger = RecordingMessenger::new();

        assert!(service.send_full_digest(&messenger, 3).await.is_err());
        assert_eq!(source.calls(), 0);
        assert!(messenger.sent().is_empty());
    }
}
