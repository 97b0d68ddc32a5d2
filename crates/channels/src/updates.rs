//! Telegram update intake: conversion, long polling and webhook push.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use proto::{ChannelError, MessageBody, ReviewerAction, ReviewerMessage, ReviewerUpdate};
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, UpdateKind};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::source::{UpdateSource, stopped};
use crate::telegram::POLL_TIMEOUT_SECS;

/// Header Telegram uses to echo the webhook secret.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Route the webhook router serves.
pub const WEBHOOK_PATH: &str = "/webhook";

const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Converts a Telegram update into a reviewer update.
///
/// Returns `None` for update kinds the approver does not handle.
pub fn convert_update(update: Update) -> Option<ReviewerUpdate> {
    match update.kind {
        UpdateKind::Message(message) => Some(ReviewerUpdate::Message(convert_message(&message))),
        UpdateKind::CallbackQuery(query) => {
            let chat_id = query
                .message
                .as_ref()
                .map(|m| m.chat().id.0)
                .unwrap_or_else(|| i64::try_from(query.from.id.0).unwrap_or_default());
            Some(ReviewerUpdate::Action(ReviewerAction {
                id: query.id.to_string(),
                chat_id,
                data: query.data.unwrap_or_default(),
            }))
        }
        _ => None,
    }
}

fn convert_message(message: &Message) -> ReviewerMessage {
    let body = if let Some(text) = message.text() {
        MessageBody::Text(text.to_string())
    } else if let Some(voice) = message.voice() {
        MessageBody::Voice {
            file_id: voice.file.id.to_string(),
            mime_type: voice.mime_type.as_ref().map(|m| m.to_string()),
        }
    } else {
        MessageBody::Other
    };
    ReviewerMessage {
        chat_id: message.chat.id.0,
        body,
    }
}

// ─── Long polling ──────────────────────────────────────────

/// `getUpdates` loop. Removes any registered webhook first.
pub struct LongPolling {
    bot: Bot,
}

impl LongPolling {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl UpdateSource for LongPolling {
    fn name(&self) -> &'static str {
        "long-polling"
    }

    async fn run(
        self,
        tx: mpsc::Sender<ReviewerUpdate>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ChannelError> {
        if let Err(e) = self.bot.delete_webhook().await {
            warn!("Failed to remove webhook before polling: {e}");
        }
        info!("Telegram long polling started");

        let mut offset: i32 = 0;
        loop {
            let request = self
                .bot
                .get_updates()
                .offset(offset)
                .timeout(POLL_TIMEOUT_SECS)
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

            let result = tokio::select! {
                _ = stopped(&mut shutdown) => break,
                result = request.send() => result,
            };

            match result {
                Ok(updates) => {
                    for update in updates {
                        offset = next_offset(offset, update.id.0);
                        let Some(update) = convert_update(update) else {
                            continue;
                        };
                        if tx.send(update).await.is_err() {
                            return Err(ChannelError::Closed);
                        }
                    }
                }
                Err(e) => {
                    warn!("getUpdates failed, retrying in {}s: {e}", RETRY_DELAY.as_secs());
                    tokio::select! {
                        _ = stopped(&mut shutdown) => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("Telegram long polling stopped");
        Ok(())
    }
}

fn next_offset(current: i32, update_id: u32) -> i32 {
    i32::try_from(update_id)
        .map(|id| id.saturating_add(1))
        .unwrap_or(current)
        .max(current)
}

// ─── Webhook push ──────────────────────────────────────────

/// Registers the webhook with Telegram and drops it on shutdown.
///
/// Call [`WebhookSource::register`] before serving; updates themselves arrive
/// through [`webhook_router`].
pub struct WebhookSource {
    bot: Bot,
    url: reqwest::Url,
    secret: String,
}

impl WebhookSource {
    pub fn new(bot: Bot, url: &str, secret: impl Into<String>) -> Result<Self, ChannelError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| ChannelError::ConnectionFailed(format!("invalid webhook url: {e}")))?;
        Ok(Self {
            bot,
            url,
            secret: secret.into(),
        })
    }

    /// Points Telegram at the webhook URL with the secret token.
    pub async fn register(&self) -> Result<(), ChannelError> {
        self.bot
            .set_webhook(self.url.clone())
            .secret_token(self.secret.clone())
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery])
            .await
            .map_err(|e| ChannelError::ConnectionFailed(format!("setWebhook: {e}")))?;
        info!(url = %self.url, "Telegram webhook registered");
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for WebhookSource {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn run(
        self,
        _tx: mpsc::Sender<ReviewerUpdate>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ChannelError> {
        stopped(&mut shutdown).await;

        if let Err(e) = self.bot.delete_webhook().await {
            warn!("Failed to delete webhook: {e}");
        }
        info!("Telegram webhook removed");
        Ok(())
    }
}

#[derive(Clone)]
struct WebhookState {
    secret: String,
    tx: mpsc::Sender<ReviewerUpdate>,
}

/// Router accepting Telegram pushes on [`WEBHOOK_PATH`].
pub fn webhook_router(secret: impl Into<String>, tx: mpsc::Sender<ReviewerUpdate>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(webhook_receive))
        .with_state(WebhookState {
            secret: secret.into(),
            tx,
        })
}

/// POST /webhook: secret-checked Telegram update.
async fn webhook_receive(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if provided != Some(state.secret.as_str()) {
        warn!("Rejecting webhook call with missing or wrong secret");
        return StatusCode::UNAUTHORIZED;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Failed to parse Telegram update: {e}");
            return StatusCode::BAD_REQUEST;
        }
    };

    let Some(update) = convert_update(update) else {
        debug!("Ignoring unsupported update kind");
        return StatusCode::OK;
    };
    if let Err(e) = state.tx.send(update).await {
        error!("Failed to forward Telegram update: {e}");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}
