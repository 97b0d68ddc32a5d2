//! Announces a resolved approval to the chat and to the caller's webhook.

use std::sync::Arc;
use std::time::Duration;

use proto::{ApprovalResult, ChatTransport, DENIED_REASON, Decision, DecisionPayload};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::i18n::{Catalog, Messages};
use crate::registry::Approval;
use crate::render::{escape, resolved_keyboard};

/// Default budget for one webhook POST.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Edits the approval message and fires the decision webhook.
pub struct OutcomeNotifier {
    transport: Arc<dyn ChatTransport>,
    catalog: Arc<Catalog>,
    http: reqwest::Client,
    timeout_message: Option<String>,
}

impl OutcomeNotifier {
    /// Creates a notifier. `timeout_message` replaces the localized timeout note.
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        catalog: Arc<Catalog>,
        callback_timeout: Duration,
        timeout_message: Option<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(callback_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build webhook client, using defaults: {e}");
                reqwest::Client::new()
            });
        Self {
            transport,
            catalog,
            http,
            timeout_message: timeout_message.filter(|m| !m.trim().is_empty()),
        }
    }

    /// Annotates the chat message and spawns the webhook delivery.
    ///
    /// The edit is best-effort; the webhook is sent regardless of its outcome.
    /// The returned handle completes once the single delivery attempt is done.
    pub async fn notify(&self, approval: &Approval, result: &ApprovalResult) -> JoinHandle<()> {
        let request = &approval.request;
        info!(
            correlation_id = %request.correlation_id,
            decision = %result.decision,
            timed_out = result.timed_out,
            waited_secs = (chrono::Utc::now() - approval.created_at).num_seconds(),
            "Approval resolved"
        );

        if approval.message_id > 0 {
            let messages = self.catalog.messages(&request.lang);
            let note = self.note(messages, result);
            let text = if approval.message_text.is_empty() {
                escape(&note, request.markup)
            } else {
                format!(
                    "{}\n\n{}",
                    approval.message_text,
                    escape(&note, request.markup)
                )
            };
            let keyboard = resolved_keyboard(messages, approval.message_id);
            if let Err(e) = self
                .transport
                .edit_message(approval.message_id, text, request.markup, keyboard)
                .await
            {
                warn!(
                    correlation_id = %request.correlation_id,
                    message_id = approval.message_id,
                    "Failed to annotate approval message: {e}"
                );
            }
        }

        let payload = DecisionPayload::new(request, result);
        let url = request.callback.url.clone();
        let http = self.http.clone();
        tokio::spawn(async move { deliver(http, url, payload).await })
    }

    /// Chat annotation for a result.
    pub fn note(&self, messages: &Messages, result: &ApprovalResult) -> String {
        match result.decision {
            Decision::Approve => messages.approved_note.clone(),
            Decision::Deny if result.reason.is_empty() || result.reason == DENIED_REASON => {
                messages.denied_note.clone()
            }
            Decision::Deny => format!("{}: {}", messages.denied_note, result.reason),
            Decision::Error if result.timed_out => self
                .timeout_message
                .clone()
                .unwrap_or_else(|| messages.timeout_note.clone()),
            Decision::Error if !result.reason.trim().is_empty() => {
                format!("⚠️ {}", result.reason.trim())
            }
            Decision::Error | Decision::Pending => messages.error_note.clone(),
        }
    }
}

async fn deliver(http: reqwest::Client, url: String, payload: DecisionPayload) {
    if url.trim().is_empty() {
        debug!(correlation_id = %payload.correlation_id, "No callback URL, skipping webhook");
        return;
    }
    match http.post(&url).json(&payload).send().await {
        Ok(resp) if resp.status().is_success() => {
            debug!(
                correlation_id = %payload.correlation_id,
                status = resp.status().as_u16(),
                "Webhook delivered"
            );
        }
        Ok(resp) => {
            warn!(
                correlation_id = %payload.correlation_id,
                status = resp.status().as_u16(),
                "Webhook rejected by {url}"
            );
        }
        Err(e) => {
            error!(
                correlation_id = %payload.correlation_id,
                "Webhook delivery to {url} failed: {e}"
            );
        }
    }
}
