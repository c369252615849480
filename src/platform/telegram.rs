use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info};

use crate::digest::DigestService;
use crate::handlers;
use crate::platform::{IncomingMessage, Messenger};

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "subscribe to the trending digest.")]
    Start,
    #[command(description = "show this text.")]
    Help,
}

/// Telegram delivery through a teloxide bot; user IDs double as private chat IDs
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn chat_of(user_id: u64) -> ChatId {
    ChatId::from(UserId(user_id))
}

/// Replies are addressed by user ID, which only lands in `chat` when it is
/// the sender's private chat with the bot
fn replies_reach_sender(chat: ChatId, user: UserId) -> bool {
    chat == ChatId::from(user)
}

fn is_private_with_sender(msg: &Message) -> bool {
    let private = msg
        .from
        .as_ref()
        .is_some_and(|user| replies_reach_sender(msg.chat.id, user.id));
    if !private {
        debug!("Ignoring message in non-private chat {}", msg.chat.id);
    }
    private
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, user_id: u64, text: &str) -> Result<()> {
        self.bot
            .send_message(chat_of(user_id), text)
            .await
            .with_context(|| format!("Failed to send message to {}", user_id))?;
        Ok(())
    }

    async fn send_photo(&self, user_id: u64, photo_url: &str, caption: &str) -> Result<()> {
        let url = reqwest::Url::parse(photo_url)
            .with_context(|| format!("Invalid thumbnail URL: {}", photo_url))?;
        self.bot
            .send_photo(chat_of(user_id), InputFile::url(url))
            .caption(caption)
            .await
            .with_context(|| format!("Failed to send photo to {}", user_id))?;
        Ok(())
    }
}

/// Run the Telegram dispatcher until the process is stopped
pub async fn run(bot: Bot, service: Arc<DigestService>) -> Result<()> {
    info!("Starting Telegram platform...");

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        error!("Failed to register bot commands: {}", e);
    }

    let handler = Update::filter_message()
        .filter(|msg: Message| is_private_with_sender(&msg))
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some_and(|t| !t.starts_with('/')))
                .endpoint(handle_text),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![service])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    service: Arc<DigestService>,
) -> ResponseResult<()> {
    let user_id = match msg.from.as_ref() {
        Some(user) => user.id.0,
        None => return Ok(()),
    };

    info!("Telegram command from {}: {:?}", user_id, cmd);

    match cmd {
        Command::Start => {
            let messenger = TelegramMessenger::new(bot);
            if let Err(e) = handlers::on_greeting(&service, &messenger, user_id).await {
                error!("Error handling /start from {}: {:#}", user_id, e);
            }
        }
        Command::Help => {
            bot.send_message(chat_of(user_id), Command::descriptions().to_string())
                .await?;
        }
    }

    Ok(())
}

async fn handle_text(bot: Bot, msg: Message, service: Arc<DigestService>) -> ResponseResult<()> {
    let user_id = match msg.from.as_ref() {
        Some(user) => user.id.0,
        None => return Ok(()),
    };

    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    info!("Telegram message from {}: {}", user_id, text);

    let incoming = IncomingMessage { user_id, text };
    let messenger = TelegramMessenger::new(bot);
    if let Err(e) = handlers::on_free_text(&service, &messenger, &incoming).await {
        error!("Error handling message from {}: {:#}", user_id, e);
    }

    Ok(())
}
