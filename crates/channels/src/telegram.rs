//! Telegram Bot API transport for the reviewer chat.

use std::time::Duration;

use async_trait::async_trait;
use proto::{ChannelError, ChatTransport, Keyboard, Markup, MessageId, OutgoingMessage, VoiceFile};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, FileId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode,
    ReplyParameters,
};
use tracing::debug;

/// Long-poll wait passed to `getUpdates`.
pub const POLL_TIMEOUT_SECS: u32 = 30;

/// Builds a bot whose HTTP client outlives a full long-poll round.
pub fn build_bot(token: &str) -> Result<Bot, ChannelError> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(POLL_TIMEOUT_SECS) + 15))
        .build()
        .map_err(|e| ChannelError::ConnectionFailed(format!("http client: {e}")))?;
    Ok(Bot::with_client(token, client))
}

/// Sends, edits and deletes messages in one configured chat.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramTransport {
    pub fn new(bot: Bot, chat_id: i64) -> Self {
        Self {
            bot,
            chat_id: ChatId(chat_id),
        }
    }

    /// Underlying bot handle.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_message(&self, message: OutgoingMessage) -> Result<MessageId, ChannelError> {
        let mut request = self.bot.send_message(self.chat_id, message.text);
        if let Some(markup) = message.markup {
            request = request.parse_mode(parse_mode(markup));
        }
        if let Some(keyboard) = message.keyboard.as_ref() {
            request = request.reply_markup(inline_keyboard(keyboard));
        }
        if let Some(reply_to) = message.reply_to {
            request = request.reply_parameters(
                ReplyParameters::new(teloxide::types::MessageId(reply_to))
                    .allow_sending_without_reply(),
            );
        }
        let sent = request
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        debug!(message_id = sent.id.0, "Telegram message sent");
        Ok(sent.id.0)
    }

    async fn edit_message(
        &self,
        message_id: MessageId,
        text: String,
        markup: Markup,
        keyboard: Keyboard,
    ) -> Result<(), ChannelError> {
        self.bot
            .edit_message_text(self.chat_id, teloxide::types::MessageId(message_id), text)
            .parse_mode(parse_mode(markup))
            .reply_markup(inline_keyboard(&keyboard))
            .await
            .map_err(|e| ChannelError::EditFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete_message(&self, message_id: MessageId) -> Result<(), ChannelError> {
        self.bot
            .delete_message(self.chat_id, teloxide::types::MessageId(message_id))
            .await
            .map_err(|e| ChannelError::DeleteFailed(e.to_string()))?;
        Ok(())
    }

    async fn answer_action(
        &self,
        action_id: &str,
        text: Option<String>,
    ) -> Result<(), ChannelError> {
        let mut request = self
            .bot
            .answer_callback_query(CallbackQueryId(action_id.to_string()));
        if let Some(text) = text {
            request = request.text(text);
        }
        request
            .await
            .map_err(|e| ChannelError::SendFailed(format!("answer callback: {e}")))?;
        Ok(())
    }

    async fn download_voice(&self, file_id: &str) -> Result<VoiceFile, ChannelError> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| ChannelError::DownloadFailed(format!("getFile: {e}")))?;
        let mut bytes = Vec::new();
        self.bot
            .download_file(&file.path, &mut bytes)
            .await
            .map_err(|e| ChannelError::DownloadFailed(e.to_string()))?;
        debug!(file_id, size = bytes.len(), "Voice file downloaded");
        Ok(VoiceFile {
            bytes,
            file_path: file.path,
            mime_type: None,
        })
    }
}

/// Telegram parse mode for a markup dialect.
pub fn parse_mode(markup: Markup) -> ParseMode {
    match markup {
        Markup::Markdown => ParseMode::MarkdownV2,
        Markup::Html => ParseMode::Html,
    }
}

/// Converts a keyboard into Telegram callback buttons.
pub fn inline_keyboard(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.data.clone()))
            .collect::<Vec<_>>()
    }))
}
