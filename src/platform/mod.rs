pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

/// A text message received from any platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform-specific user ID; also the private chat the bot replies to.
    /// Messages from group chats never become an `IncomingMessage`.
    pub user_id: u64,
    /// The message text
    pub text: String,
}

/// Outbound side of a chat platform, addressed by user ID
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a plain text notice
    async fn send_text(&self, user_id: u64, text: &str) -> Result<()>;

    /// Send an image by URL with a caption
    async fn send_photo(&self, user_id: u64, photo_url: &str, caption: &str) -> Result<()>;
}
