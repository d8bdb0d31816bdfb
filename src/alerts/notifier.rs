use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, Recipient};
use thiserror::Error;

use crate::config::DELIVERY_TIMEOUT_SECS;
use crate::types::{FormattedAlert, LinkButton};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid Telegram API URL {0}")]
    InvalidApiUrl(String),
}

/// Outbound channel for formatted alerts. One attempt per call; the caller
/// decides what a failure means.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, chat_id: &str, alert: &FormattedAlert) -> Result<(), DeliveryError>;
}

/// Sends alerts with a teloxide `Bot` on its own short-timeout client, so a
/// stalled request never outlives the delivery budget.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, token: &str) -> Result<Self, DeliveryError> {
        let api_url = Url::parse(api_base.trim_end_matches('/'))
            .map_err(|e| DeliveryError::InvalidApiUrl(format!("{api_base}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .build()?;
        let bot = Bot::with_client(token, client).set_api_url(api_url);
        Ok(Self { bot })
    }
}

/// Numeric ids go out as chat ids, anything else as a `@channel` username.
fn recipient(chat_id: &str) -> Recipient {
    let chat_id = chat_id.trim();
    match chat_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(chat_id.to_string()),
    }
}

/// One row of URL buttons. Buttons whose URL does not parse are left out.
fn keyboard(buttons: &[LinkButton]) -> Option<InlineKeyboardMarkup> {
    let row: Vec<InlineKeyboardButton> = buttons
        .iter()
        .filter_map(|b| {
            let url = Url::parse(&b.url).ok()?;
            Some(InlineKeyboardButton::url(b.text.clone(), url))
        })
        .collect();
    (!row.is_empty()).then(|| InlineKeyboardMarkup::new([row]))
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, chat_id: &str, alert: &FormattedAlert) -> Result<(), DeliveryError> {
        let request = self
            .bot
            .send_message(recipient(chat_id), alert.text.clone())
            .parse_mode(ParseMode::Html);
        match keyboard(&alert.buttons) {
            Some(markup) => request.reply_markup(markup).await?,
            None => request.await?,
        };
        Ok(())
    }
}
