//! Sequential handling of reviewer button presses and replies.

use std::sync::Arc;

use proto::{
    ApprovalResult, ChatTransport, Decision, MessageBody, MessageId, OutgoingMessage,
    ReviewerAction, ReviewerMessage, ReviewerUpdate, SpeechError, Transcriber,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::action::{Action, parse_callback};
use crate::i18n::{Catalog, Messages};
use crate::notifier::OutcomeNotifier;
use crate::registry::ApprovalRegistry;
use crate::render::prompt_keyboard;

/// Consumes reviewer updates one at a time.
pub struct UpdateDispatcher {
    registry: Arc<ApprovalRegistry>,
    transport: Arc<dyn ChatTransport>,
    catalog: Arc<Catalog>,
    notifier: Arc<OutcomeNotifier>,
    transcriber: Option<Arc<dyn Transcriber>>,
    reviewer_chat: i64,
}

impl UpdateDispatcher {
    pub fn new(
        registry: Arc<ApprovalRegistry>,
        transport: Arc<dyn ChatTransport>,
        catalog: Arc<Catalog>,
        notifier: Arc<OutcomeNotifier>,
        reviewer_chat: i64,
    ) -> Self {
        Self {
            registry,
            transport,
            catalog,
            notifier,
            transcriber: None,
            reviewer_chat,
        }
    }

    /// Enables voice replies.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Processes updates in delivery order until every sender is dropped.
    pub async fn run(self, mut updates: mpsc::Receiver<ReviewerUpdate>) {
        info!(chat_id = self.reviewer_chat, "Update dispatcher started");
        while let Some(update) = updates.recv().await {
            self.handle(update).await;
        }
        info!("Update dispatcher stopped");
    }

    /// Handles a single update.
    pub async fn handle(&self, update: ReviewerUpdate) {
        match update {
            ReviewerUpdate::Action(action) => self.on_action(action).await,
            ReviewerUpdate::Message(message) => self.on_message(message).await,
        }
    }

    async fn on_action(&self, action: ReviewerAction) {
        if action.chat_id != self.reviewer_chat {
            warn!(chat_id = action.chat_id, "Button press from foreign chat");
            let notice = self.default_messages().invalid_chat.clone();
            self.answer(&action.id, Some(notice)).await;
            return;
        }

        let Some((kind, payload)) = parse_callback(&action.data) else {
            debug!(data = %action.data, "Unknown callback data");
            let notice = self.default_messages().invalid_action.clone();
            self.answer(&action.id, Some(notice)).await;
            return;
        };

        let notice = match kind {
            Action::Approve => self.decide(payload, ApprovalResult::approved()).await,
            Action::Deny => self.decide(payload, ApprovalResult::denied("")).await,
            Action::DenyWithMessage => self.start_reason(payload).await,
            Action::CancelDeny => {
                let prompt_id = self.registry.clear_prompt(payload);
                self.delete(prompt_id).await;
                None
            }
            Action::Delete => match payload.parse::<MessageId>() {
                Ok(id) if id > 0 => {
                    self.delete(id).await;
                    None
                }
                _ => Some(self.default_messages().invalid_action.clone()),
            },
        };
        self.answer(&action.id, notice).await;
    }

    /// Resolves from a button press; returns the notice for the press.
    async fn decide(&self, correlation_id: &str, result: ApprovalResult) -> Option<String> {
        let Some((approval, prompt_id)) = self.registry.resolve(correlation_id) else {
            debug!(correlation_id, "Button press on resolved approval");
            return Some(self.default_messages().already_resolved.clone());
        };
        self.delete(prompt_id).await;
        self.notifier.notify(&approval, &result).await;

        let messages = self.catalog.messages(&approval.request.lang);
        Some(if result.decision == Decision::Approve {
            messages.approved_note.clone()
        } else {
            messages.denied_note.clone()
        })
    }

    async fn start_reason(&self, correlation_id: &str) -> Option<String> {
        let Some(approval) = self.registry.get(correlation_id) else {
            return Some(self.default_messages().already_resolved.clone());
        };
        let Some(previous) = self.registry.start_reason(correlation_id) else {
            return Some(self.default_messages().already_resolved.clone());
        };
        self.delete(previous).await;

        let messages = self.catalog.messages(&approval.request.lang);
        let prompt = OutgoingMessage::plain(messages.deny_prompt.clone())
            .reply_to(approval.message_id)
            .with_keyboard(prompt_keyboard(messages, correlation_id));
        match self.transport.send_message(prompt).await {
            Ok(prompt_id) => {
                self.registry.set_prompt_message(correlation_id, prompt_id);
                debug!(correlation_id, prompt_id, "Awaiting denial reason");
                None
            }
            Err(e) => {
                warn!(correlation_id, "Failed to send reason prompt: {e}");
                self.registry.clear_prompt(correlation_id);
                Some(messages.error_note.clone())
            }
        }
    }

    async fn on_message(&self, message: ReviewerMessage) {
        if message.chat_id != self.reviewer_chat {
            warn!(chat_id = message.chat_id, "Ignoring message from foreign chat");
            return;
        }
        let Some((approval, prompt_id)) = self.registry.current_prompt() else {
            debug!("Message without an open reason prompt");
            return;
        };
        let messages = self.catalog.messages(&approval.request.lang);

        let reason = match message.body {
            MessageBody::Text(text) => text.trim().to_string(),
            MessageBody::Voice { file_id, .. } => {
                match self.transcribe(&file_id, self.catalog.default_lang()).await {
                    Ok(text) => text,
                    Err(SpeechError::Disabled) => {
                        self.reply(messages.voice_disabled.clone(), prompt_id).await;
                        return;
                    }
                    Err(e) => {
                        warn!(
                            correlation_id = %approval.correlation_id(),
                            "Transcription failed: {e}"
                        );
                        self.reply(messages.transcription_failed.clone(), prompt_id).await;
                        return;
                    }
                }
            }
            MessageBody::Other => return,
        };

        let Some((approval, prompt_id)) = self.registry.resolve(approval.correlation_id()) else {
            return;
        };
        self.delete(prompt_id).await;
        self.notifier
            .notify(&approval, &ApprovalResult::denied(reason))
            .await;
    }

    async fn transcribe(&self, file_id: &str, lang: &str) -> Result<String, SpeechError> {
        let transcriber = self.transcriber.as_ref().ok_or(SpeechError::Disabled)?;
        let voice = self
            .transport
            .download_voice(file_id)
            .await
            .map_err(|e| SpeechError::Api(e.to_string()))?;
        let clip = speech::normalize_voice(voice)?;
        match transcriber.transcribe(clip, lang).await {
            Err(SpeechError::EmptyResult) => Ok(String::new()),
            other => other,
        }
    }

    async fn reply(&self, text: String, reply_to: MessageId) {
        let message = OutgoingMessage::plain(text).reply_to(reply_to);
        if let Err(e) = self.transport.send_message(message).await {
            warn!("Failed to send notice: {e}");
        }
    }

    async fn delete(&self, message_id: MessageId) {
        if message_id <= 0 {
            return;
        }
        if let Err(e) = self.transport.delete_message(message_id).await {
            warn!(message_id, "Failed to delete message: {e}");
        }
    }

    async fn answer(&self, action_id: &str, text: Option<String>) {
        if let Err(e) = self.transport.answer_action(action_id, text).await {
            warn!("Failed to answer button press: {e}");
        }
    }

    fn default_messages(&self) -> &Messages {
        self.catalog.messages(self.catalog.default_lang())
    }
}
