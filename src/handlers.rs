use anyhow::Result;
use tracing::{error, info};

use crate::digest::DigestService;
use crate::platform::{IncomingMessage, Messenger};
use crate::subscribers::SubscriberState;

pub const ASK_NAME: &str = "Hello Chief! What would you like to be called?";
/// Keeps captions well under Telegram's 1024 character limit
pub const MAX_NAME_CHARS: usize = 64;

pub const DIGEST_FAILED: &str =
    "Sorry, I couldn't read the trending data right now. I'll try again at the next update.";

/// `/start`: ask an unknown user for a name, or greet a named one and send
/// the full digest.
pub async fn on_greeting(
    service: &DigestService,
    messenger: &dyn Messenger,
    user_id: u64,
) -> Result<()> {
    match service.subscribers().state(user_id).await {
        SubscriberState::Unknown => messenger.send_text(user_id, ASK_NAME).await,
        SubscriberState::Named(name) => {
            messenger
                .send_text(
                    user_id,
                    &format!("Hello {}! I will send you updates twice a day.", name),
                )
                .await?;
            send_digest(service, messenger, user_id).await
        }
    }
}

/// Non-command text is the user's display name. Only the first name
/// triggers a digest; renames are just confirmed.
pub async fn on_free_text(
    service: &DigestService,
    messenger: &dyn Messenger,
    incoming: &IncomingMessage,
) -> Result<()> {
    let user_id = incoming.user_id;
    let name = incoming.text.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return reject_name(service, messenger, user_id, name.is_empty()).await;
    }

    let previous = service.subscribers().set_name(user_id, name).await;
    messenger
        .send_text(
            user_id,
            &format!(
                "Got it! From now on, I will call you {}. I will send you updates twice a day.",
                name
            ),
        )
        .await?;

    match previous {
        None => send_digest(service, messenger, user_id).await,
        Some(_) => {
            info!("Renamed subscriber {}, not resending digest", user_id);
            Ok(())
        }
    }
}

async fn reject_name(
    service: &DigestService,
    messenger: &dyn Messenger,
    user_id: u64,
    blank: bool,
) -> Result<()> {
    let known = service.subscribers().is_known(user_id).await;
    let reply = match (blank, known) {
        (true, false) => ASK_NAME.to_string(),
        (true, true) => "I'll keep calling you by your current name.".to_string(),
        (false, false) => format!(
            "That name is too long, please use at most {} characters. \
             What would you like to be called?",
            MAX_NAME_CHARS
        ),
        (false, true) => format!(
            "That name is too long, please use at most {} characters. \
             I'll keep calling you by your current name.",
            MAX_NAME_CHARS
        ),
    };
    messenger.send_text(user_id, &reply).await
}

async fn send_digest(
    service: &DigestService,
    messenger: &dyn Messenger,
    user_id: u64,
) -> Result<()> {
    if let Err(e) = service.send_full_digest(messenger, user_id).await {
        error!("Failed to send digest to {}: {:#}", user_id, e);
        messenger.send_text(user_id, DIGEST_FAILED).await.ok();
    }
    Ok(())
}
