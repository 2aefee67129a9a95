use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{debug, error};

use crate::backend::{ActionsBackend, AssistantBackend};
use crate::dispatch::{InboundMessage, Outbox, Router};
use crate::error::Error;
use crate::usage::UsageStore;

use super::access::AccessControl;
use super::config::TelegramConfig;
use super::delivery::{RateLimiter, chunk_message};

/// Outbox bound to one Telegram chat.
///
/// Long replies are chunked to the 4096-character limit and paced to one
/// send per second; chunks of one reply are delivered in order.
pub struct TelegramOutbox {
    bot: Bot,
    chat_id: ChatId,
    limiter: tokio::sync::Mutex<RateLimiter>,
}

impl TelegramOutbox {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            limiter: tokio::sync::Mutex::new(RateLimiter::new(1000)),
        }
    }
}

impl Outbox for TelegramOutbox {
    async fn send(&self, text: &str) -> Result<(), Error> {
        let mut limiter = self.limiter.lock().await;
        for chunk in chunk_message(text) {
            let delay = limiter.wait_time();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.bot
                .send_message(self.chat_id, chunk)
                .await
                .map_err(|e| Error::Channel(e.to_string()))?;
            limiter.mark_sent();
        }
        Ok(())
    }
}

/// Long-polling Telegram front end over the command router.
///
/// Only private chats are handled; group messages and non-text updates are
/// dropped before they reach the router.
pub struct TelegramAdapter<B, A, U> {
    bot: Bot,
    access: AccessControl,
    router: Router<B, A, U>,
}

impl<B, A, U> TelegramAdapter<B, A, U>
where
    B: ActionsBackend + 'static,
    A: AssistantBackend + 'static,
    U: UsageStore + 'static,
{
    pub fn new(bot: Bot, config: &TelegramConfig, router: Router<B, A, U>) -> Self {
        let access = AccessControl::new(config.dm_policy, config.allowed_users.clone());
        Self {
            bot,
            access,
            router,
        }
    }

    /// Run the bot with long polling. Blocks until shutdown (Ctrl-C).
    pub async fn run(self: Arc<Self>) {
        let handler = Update::filter_message().endpoint(handle_message::<B, A, U>);
        let bot = self.bot.clone();

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![self])
            .default_handler(|_upd| async {})
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_private_message(
        &self,
        chat_id: i64,
        user_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), Error> {
        if !self.access.permits(user_id) {
            debug!(user_id, "telegram message denied by access policy");
            return Ok(());
        }

        let outbox = TelegramOutbox::new(self.bot.clone(), ChatId(chat_id));
        let inbound = InboundMessage {
            conversation_id: chat_id,
            sender_id: user_id,
            message_id,
            text: text.to_string(),
        };
        self.router.handle(&inbound, &outbox).await
    }
}

async fn handle_message<B, A, U>(
    msg: Message,
    adapter: Arc<TelegramAdapter<B, A, U>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    B: ActionsBackend + 'static,
    A: AssistantBackend + 'static,
    U: UsageStore + 'static,
{
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(text) = msg.text().filter(|t| !t.is_empty()) else {
        return Ok(());
    };
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or_default();

    if let Err(e) = adapter
        .handle_private_message(msg.chat.id.0, user_id, msg.id.0 as i64, text)
        .await
    {
        error!(chat_id = msg.chat.id.0, error = %e, "telegram message handler error");
    }
    Ok(())
}
