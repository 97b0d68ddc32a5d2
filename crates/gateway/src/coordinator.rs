//! Admission of approval requests and their per-request timeout.

use std::sync::Arc;
use std::time::Duration;

use proto::{
    ApprovalAck, ApprovalRequest, ApprovalResult, ChatTransport, DEFAULT_TIMEOUT_REASON,
    OutgoingMessage, SubmitError,
};
use tracing::{debug, info, warn};

use crate::i18n::Catalog;
use crate::notifier::OutcomeNotifier;
use crate::registry::ApprovalRegistry;
use crate::render::{decision_keyboard, render_request};

/// Used when the configured approval timeout is zero.
pub const FALLBACK_TIMEOUT: Duration = Duration::from_secs(3600);

/// Picks the longer of the configured timeout and a per-request override.
pub fn effective_timeout(configured: Duration, requested: Option<Duration>) -> Duration {
    let base = if configured.is_zero() {
        FALLBACK_TIMEOUT
    } else {
        configured
    };
    requested.map_or(base, |requested| requested.max(base))
}

/// Submission entry point shared by the HTTP handlers.
#[derive(Clone)]
pub struct ApprovalService {
    registry: Arc<ApprovalRegistry>,
    transport: Arc<dyn ChatTransport>,
    catalog: Arc<Catalog>,
    notifier: Arc<OutcomeNotifier>,
    approval_timeout: Duration,
    timeout_reason: String,
}

impl ApprovalService {
    pub fn new(
        registry: Arc<ApprovalRegistry>,
        transport: Arc<dyn ChatTransport>,
        catalog: Arc<Catalog>,
        notifier: Arc<OutcomeNotifier>,
        approval_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            catalog,
            notifier,
            approval_timeout,
            timeout_reason: DEFAULT_TIMEOUT_REASON.to_string(),
        }
    }

    /// Overrides the reason reported in timeout webhooks.
    pub fn with_timeout_reason(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if !reason.trim().is_empty() {
            self.timeout_reason = reason;
        }
        self
    }

    /// The registry backing this service.
    pub fn registry(&self) -> &Arc<ApprovalRegistry> {
        &self.registry
    }

    /// Catalog used for rendering.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Admits a request, notifies the reviewer and arms its timeout.
    pub async fn submit(
        &self,
        mut request: ApprovalRequest,
        timeout: Option<Duration>,
    ) -> Result<ApprovalAck, SubmitError> {
        if request.lang.trim().is_empty() {
            request.lang = self.catalog.default_lang().to_string();
        }
        let correlation_id = request.correlation_id.clone();
        let approval = self.registry.add(request)?;

        let messages = self.catalog.messages(&approval.request.lang);
        let text = render_request(&approval.request, messages);
        let message = OutgoingMessage::formatted(text.clone(), approval.request.markup)
            .with_keyboard(decision_keyboard(messages, &correlation_id));

        let message_id = match self.transport.send_message(message).await {
            Ok(id) => id,
            Err(e) => {
                warn!(correlation_id = %correlation_id, "Failed to notify reviewer: {e}");
                self.registry.resolve(&correlation_id);
                return Err(SubmitError::Notification(e));
            }
        };
        self.registry.set_message(&correlation_id, message_id, text);

        let wait = effective_timeout(self.approval_timeout, timeout);
        self.arm_timer(correlation_id.clone(), wait);
        info!(
            correlation_id = %correlation_id,
            message_id,
            timeout_secs = wait.as_secs(),
            "Approval pending"
        );
        Ok(ApprovalAck::pending(correlation_id))
    }

    fn arm_timer(&self, correlation_id: String, wait: Duration) {
        let service = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            service.expire(&correlation_id).await;
        });
    }

    /// Resolves `correlation_id` as timed out, unless something else won.
    async fn expire(&self, correlation_id: &str) {
        let Some((approval, prompt_id)) = self.registry.resolve(correlation_id) else {
            debug!(correlation_id, "Timer fired after resolution");
            return;
        };
        if prompt_id > 0
            && let Err(e) = self.transport.delete_message(prompt_id).await
        {
            warn!(correlation_id, "Failed to delete reason prompt: {e}");
        }
        self.notifier
            .notify(&approval, &ApprovalResult::timeout(self.timeout_reason.clone()))
            .await;
    }
}
