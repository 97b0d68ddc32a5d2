//! Approval request/decision types shared by the HTTP surface, the coordinator
//! and the chat adapters.

use serde::{Deserialize, Serialize};

/// Reason reported when the reviewer approves with a button.
pub const APPROVED_REASON: &str = "approved";
/// Reason reported when the reviewer denies without giving a reason.
pub const DENIED_REASON: &str = "denied";
/// Default reason reported when no decision arrives in time.
pub const DEFAULT_TIMEOUT_REASON: &str = "approval timeout";

/// Outcome of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Accepted, resolution happens asynchronously.
    Pending,
    /// The reviewer approved the operation.
    Approve,
    /// The reviewer denied the operation.
    Deny,
    /// Timeout, delivery failure or internal error.
    Error,
}

impl Decision {
    /// Returns the wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::Error => "error",
        }
    }

    /// Returns `true` for decisions that end an approval lifecycle.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markup dialect used to render the chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Markup {
    /// Telegram MarkdownV2.
    #[default]
    Markdown,
    /// Telegram HTML subset.
    Html,
}

impl Markup {
    /// Returns the canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
        }
    }
}

impl std::str::FromStr for Markup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown markup '{other}'")),
        }
    }
}

/// A labelled reference shown under the request (e.g. a link to code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Display label.
    pub text: String,
    /// Target URL.
    pub url: String,
}

/// Where the terminal decision is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Callback {
    /// Webhook URL receiving the decision POST.
    pub url: String,
}

/// Immutable approval request as admitted by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Caller-assigned correlation identifier.
    pub correlation_id: String,
    /// Name of the tool awaiting approval.
    pub tool: String,
    /// Tool arguments.
    pub arguments: serde_json::Map<String, serde_json::Value>,
    /// Why the caller wants to run the tool.
    pub justification: String,
    /// Human-readable description of the action.
    pub approval_request: String,
    /// Caller's assessment of the risk.
    pub risk_assessment: String,
    /// Optional references rendered as links.
    pub links_to_code: Vec<Link>,
    /// Display language for this request.
    pub lang: String,
    /// Markup dialect for this request.
    pub markup: Markup,
    /// Decision webhook.
    pub callback: Callback,
}

/// Terminal outcome of an approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalResult {
    /// Final decision.
    pub decision: Decision,
    /// Human-readable reason.
    pub reason: String,
    /// Set when the timeout resolved the approval.
    pub timed_out: bool,
}

impl ApprovalResult {
    /// Reviewer approved.
    pub fn approved() -> Self {
        Self {
            decision: Decision::Approve,
            reason: APPROVED_REASON.to_string(),
            timed_out: false,
        }
    }

    /// Reviewer denied. Blank reasons collapse to the default.
    pub fn denied(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            DENIED_REASON.to_string()
        } else {
            reason.trim().to_string()
        };
        Self {
            decision: Decision::Deny,
            reason,
            timed_out: false,
        }
    }

    /// No decision arrived in time.
    pub fn timeout(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Error,
            reason: reason.into(),
            timed_out: true,
        }
    }

    /// Internal or delivery failure.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Error,
            reason: reason.into(),
            timed_out: false,
        }
    }
}

/// Body POSTed to the request's callback URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionPayload {
    /// Correlation identifier of the resolved request.
    pub correlation_id: String,
    /// Terminal decision.
    pub decision: Decision,
    /// Human-readable reason.
    pub reason: String,
    /// Tool name from the request.
    pub tool: String,
}

impl DecisionPayload {
    /// Builds the webhook body for a resolved request.
    pub fn new(request: &ApprovalRequest, result: &ApprovalResult) -> Self {
        Self {
            correlation_id: request.correlation_id.clone(),
            decision: result.decision,
            reason: result.reason.clone(),
            tool: request.tool.clone(),
        }
    }
}

/// Synchronous acknowledgement returned to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalAck {
    /// `pending` on success, `error` otherwise.
    pub decision: Decision,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Echo of the correlation identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ApprovalAck {
    /// Request admitted and the reviewer notified.
    pub fn pending(correlation_id: impl Into<String>) -> Self {
        Self {
            decision: Decision::Pending,
            reason: None,
            correlation_id: Some(correlation_id.into()),
        }
    }

    /// Request rejected or failed synchronously.
    pub fn error(reason: impl Into<String>, correlation_id: Option<String>) -> Self {
        Self {
            decision: Decision::Error,
            reason: Some(reason.into()),
            correlation_id,
        }
    }
}
