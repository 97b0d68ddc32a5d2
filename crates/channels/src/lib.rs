//! Telegram chat transport and reviewer update sources.

pub mod source;
pub mod telegram;
pub mod updates;

/// Update source trait and queue size.
pub use source::{UPDATE_QUEUE_CAPACITY, UpdateSource};
/// Bot API transport.
pub use telegram::{TelegramTransport, build_bot};
/// Update conversion and the two delivery modes.
pub use updates::{
    LongPolling, SECRET_HEADER, WEBHOOK_PATH, WebhookSource, convert_update, webhook_router,
};
