//! Approval lifecycle: registry, rendering, timeouts, reviewer updates and the
//! HTTP submission surface.

pub mod action;
pub mod coordinator;
pub mod dispatcher;
pub mod i18n;
pub mod notifier;
pub mod registry;
pub mod render;
pub mod server;

#[cfg(test)]
mod test_support;

/// Callback data codec.
pub use action::{Action, MAX_CORRELATION_ID_LEN, parse_callback};
/// Submission service and timeout policy.
pub use coordinator::{ApprovalService, FALLBACK_TIMEOUT, effective_timeout};
/// Reviewer update consumer.
pub use dispatcher::UpdateDispatcher;
/// Localized strings.
pub use i18n::{Catalog, Messages};
/// Chat and webhook announcement of outcomes.
pub use notifier::{DEFAULT_CALLBACK_TIMEOUT, OutcomeNotifier};
/// In-flight approval store.
pub use registry::{Approval, ApprovalRegistry};
/// HTTP router and readiness flag.
pub use server::{ReadyFlag, router};
