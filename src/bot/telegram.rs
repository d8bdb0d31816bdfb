//! Long-polling command bot.

use std::collections::HashSet;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{info, warn};

use crate::bot::handler::AdminCommandHandler;

const NOT_ALLOWED_REPLY: &str = "⛔ This bot is not enabled for this chat.";

pub struct CommandBot {
    bot: Bot,
    handler: AdminCommandHandler,
    /// Empty means every chat is allowed.
    allowed_chats: HashSet<i64>,
}

impl CommandBot {
    pub fn new(token: &str, handler: AdminCommandHandler, allowed_chats: HashSet<i64>) -> Self {
        Self {
            bot: Bot::new(token),
            handler,
            allowed_chats,
        }
    }

    fn chat_allowed(&self, chat_id: i64) -> bool {
        self.allowed_chats.is_empty() || self.allowed_chats.contains(&chat_id)
    }

    /// Run the dispatcher until the process exits.
    pub async fn run(self: Arc<Self>) {
        let bot = self.bot.clone();
        info!(
            allowed_chats = self.allowed_chats.len(),
            "Command bot starting (long polling)"
        );

        let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let this = Arc::clone(&self);
            async move { this.on_message(bot, msg).await }
        });

        Dispatcher::builder(bot, handler).build().dispatch().await;
    }

    async fn on_message(&self, bot: Bot, msg: Message) -> ResponseResult<()> {
        let Some(text) = msg.text() else {
            return Ok(());
        };
        if !text.starts_with('/') {
            return Ok(());
        }

        let chat_id = msg.chat.id.0;
        if !self.chat_allowed(chat_id) {
            warn!(chat_id, "[BOT] command from a chat outside the allowlist");
            bot.send_message(msg.chat.id, NOT_ALLOWED_REPLY).await?;
            return Ok(());
        }

        let caller = msg.from.as_ref().map(|user| user.id.0 as i64);
        if let Some(reply) = self.handler.handle(caller, chat_id, text).await {
            bot.send_message(msg.chat.id, reply)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Ok(())
    }
}
