//! Inline-button callback data: `action` or `action:payload`.

/// Longest correlation id whose callback data still fits Telegram's 64-byte limit.
pub const MAX_CORRELATION_ID_LEN: usize = 48;

/// Reviewer action encoded in a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Approve the request.
    Approve,
    /// Deny with the default reason.
    Deny,
    /// Ask for a free-text or voice reason.
    DenyWithMessage,
    /// Withdraw the reason prompt.
    CancelDeny,
    /// Delete a resolved message.
    Delete,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
            Self::DenyWithMessage => "deny_reason",
            Self::CancelDeny => "deny_cancel",
            Self::Delete => "delete",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "approve" => Some(Self::Approve),
            "deny" => Some(Self::Deny),
            "deny_reason" => Some(Self::DenyWithMessage),
            "deny_cancel" => Some(Self::CancelDeny),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Builds callback data for this action.
    pub fn callback_data(self, payload: &str) -> String {
        if payload.is_empty() {
            self.as_str().to_string()
        } else {
            format!("{}:{payload}", self.as_str())
        }
    }
}

/// Splits callback data into a known action and its payload.
pub fn parse_callback(data: &str) -> Option<(Action, &str)> {
    let (name, payload) = data.split_once(':').unwrap_or((data, ""));
    Action::from_name(name).map(|action| (action, payload))
}
