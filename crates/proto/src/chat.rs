//! Chat boundary: outbound message shapes, inbound reviewer updates and the
//! transport trait implemented by chat adapters.

use async_trait::async_trait;

use crate::approval::Markup;
use crate::error::ChannelError;

/// Chat-platform message identifier.
pub type MessageId = i32;

/// Inline button carrying opaque callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Visible label.
    pub label: String,
    /// Callback data sent back when pressed.
    pub data: String,
}

impl Button {
    /// Creates a callback button.
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Inline keyboard as rows of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Keyboard {
    /// Button rows, top to bottom.
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Creates a keyboard from rows.
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    /// Iterates over every button in row order.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// Message sent to the reviewer chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Message body.
    pub text: String,
    /// Parse mode; `None` sends plain text.
    pub markup: Option<Markup>,
    /// Inline keyboard attached to the message.
    pub keyboard: Option<Keyboard>,
    /// Message this one replies to.
    pub reply_to: Option<MessageId>,
}

impl OutgoingMessage {
    /// Creates a plain-text message.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: None,
            keyboard: None,
            reply_to: None,
        }
    }

    /// Creates a formatted message.
    pub fn formatted(text: impl Into<String>, markup: Markup) -> Self {
        Self {
            text: text.into(),
            markup: Some(markup),
            keyboard: None,
            reply_to: None,
        }
    }

    /// Attaches an inline keyboard.
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Marks the message as a reply.
    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        if message_id > 0 {
            self.reply_to = Some(message_id);
        }
        self
    }
}

/// Raw voice note as downloaded from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceFile {
    /// Audio bytes.
    pub bytes: Vec<u8>,
    /// Platform-side file path (carries the extension).
    pub file_path: String,
    /// MIME type reported by the platform.
    pub mime_type: Option<String>,
}

/// Button press from the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewerAction {
    /// Platform id used to answer the press.
    pub id: String,
    /// Chat the pressed message lives in.
    pub chat_id: i64,
    /// Callback data of the pressed button.
    pub data: String,
}

/// Body of an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Text message.
    Text(String),
    /// Voice note.
    Voice {
        /// Platform file id for download.
        file_id: String,
        /// MIME type reported by the platform.
        mime_type: Option<String>,
    },
    /// Anything else (stickers, photos, service messages).
    Other,
}

/// Inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewerMessage {
    /// Originating chat.
    pub chat_id: i64,
    /// Message content.
    pub body: MessageBody,
}

/// One item of the ordered reviewer update stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewerUpdate {
    /// Inline button press.
    Action(ReviewerAction),
    /// Text or voice message.
    Message(ReviewerMessage),
}

/// Outbound chat operations, bound to the single reviewer chat.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends a message and returns its id.
    async fn send_message(&self, message: OutgoingMessage) -> Result<MessageId, ChannelError>;

    /// Replaces the text and keyboard of an existing message.
    async fn edit_message(
        &self,
        message_id: MessageId,
        text: String,
        markup: Markup,
        keyboard: Keyboard,
    ) -> Result<(), ChannelError>;

    /// Deletes a message.
    async fn delete_message(&self, message_id: MessageId) -> Result<(), ChannelError>;

    /// Acknowledges a button press, optionally showing a notice.
    async fn answer_action(&self, action_id: &str, text: Option<String>)
    -> Result<(), ChannelError>;

    /// Downloads a voice note by platform file id.
    async fn download_voice(&self, file_id: &str) -> Result<VoiceFile, ChannelError>;
}
