use std::sync::Arc;

use tracing::{error, info};

use crate::digest::{DigestKind, DigestService};
use crate::platform::Messenger;
use crate::scheduler::Scheduler;

/// Coin digest, daily at 22:59 local time
pub const COIN_DIGEST_CRON: &str = "0 59 22 * * *";
/// NFT digest, daily at 23:15 local time
pub const NFT_DIGEST_CRON: &str = "0 15 23 * * *";

/// Register the two daily digest broadcasts
pub async fn register_digest_jobs(
    scheduler: &Scheduler,
    service: Arc<DigestService>,
    messenger: Arc<dyn Messenger>,
) -> anyhow::Result<()> {
    for (cron_expr, name, kind) in [
        (COIN_DIGEST_CRON, "coin-digest", DigestKind::Coins),
        (NFT_DIGEST_CRON, "nft-digest", DigestKind::Nfts),
    ] {
        let service = service.clone();
        let messenger = messenger.clone();
        scheduler
            .add_cron_job(cron_expr, name, move || {
                let service = service.clone();
                let messenger = messenger.clone();
                Box::pin(async move {
                    run_broadcast(&service, messenger.as_ref(), kind).await;
                })
            })
            .await?;
    }

    Ok(())
}

async fn run_broadcast(service: &DigestService, messenger: &dyn Messenger, kind: DigestKind) {
    match service.broadcast(kind, messenger).await {
        Ok(summary) => info!(
            "Finished {} digest: {} subscriber(s), {} failed",
            kind, summary.subscribers, summary.failed
        ),
        Err(e) => error!("Aborted {} digest: {:#}", kind, e),
    }
}
