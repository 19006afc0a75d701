/// Telegram delivery for signal notifications
///
/// One forum group, one thread per notification tier.

use crate::logger::{self, LogTag};
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode, ThreadId};

pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self, String> {
        if bot_token.is_empty() {
            return Err("Bot token is empty".to_string());
        }
        if chat_id.is_empty() {
            return Err("Chat ID is empty".to_string());
        }

        let chat_id_parsed: i64 = chat_id
            .parse()
            .map_err(|e| format!("Invalid chat ID '{}': {}", chat_id, e))?;

        Ok(Self {
            bot: Bot::new(bot_token),
            chat_id: ChatId(chat_id_parsed),
        })
    }

    /// Send an HTML-formatted message into the tier's thread
    pub async fn send_signal(&self, html: &str, thread_id: i32) -> Result<(), String> {
        self.bot
            .send_message(self.chat_id, html)
            .parse_mode(ParseMode::Html)
            .message_thread_id(ThreadId(MessageId(thread_id)))
            .await
            .map_err(|e| format!("Failed to send Telegram message: {}", e))?;

        logger::debug(
            LogTag::Telegram,
            &format!("Sent signal to thread {} (length={})", thread_id, html.len()),
        );

        Ok(())
    }
}
