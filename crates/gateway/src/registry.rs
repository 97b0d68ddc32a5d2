//! In-memory registry of in-flight approvals.
//!
//! The registry is the single owner of approval state. Every operation takes
//! the one internal lock for its whole duration and never performs I/O, so
//! callers always receive owned copies and do their network work afterwards.
//!
//! Resolution and removal are the same step: [`ApprovalRegistry::resolve`]
//! hands the approval to exactly one caller, and every later lookup for that
//! correlation id (a duplicate button press, a stale prompt, the timeout task)
//! finds nothing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use proto::{ApprovalRequest, MessageId, RegistryError};

/// Registry-owned state of one in-flight approval.
#[derive(Debug, Clone)]
pub struct Approval {
    /// The admitted request.
    pub request: ApprovalRequest,
    /// Admission time.
    pub created_at: DateTime<Utc>,
    /// Chat message id once the notification is sent (0 before).
    pub message_id: MessageId,
    /// Rendered notification text, reused for the result annotation.
    pub message_text: String,
    /// Set while the reviewer is being asked for a denial reason.
    pub awaiting_reason: bool,
}

impl Approval {
    /// Correlation id shortcut.
    pub fn correlation_id(&self) -> &str {
        &self.request.correlation_id
    }
}

/// The single outstanding deny-reason prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PromptHolder {
    correlation_id: String,
    message_id: MessageId,
}

#[derive(Debug, Default)]
struct State {
    approvals: HashMap<String, Approval>,
    prompt: Option<PromptHolder>,
}

/// Concurrency-safe store of in-flight approvals.
#[derive(Debug, Default)]
pub struct ApprovalRegistry {
    state: Mutex<State>,
}

impl ApprovalRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a new request. Fails if the correlation id is already in flight.
    pub fn add(&self, request: ApprovalRequest) -> Result<Approval, RegistryError> {
        let mut state = self.state.lock();
        if state.approvals.contains_key(&request.correlation_id) {
            return Err(RegistryError::AlreadyExists(request.correlation_id));
        }
        let approval = Approval {
            request,
            created_at: Utc::now(),
            message_id: 0,
            message_text: String::new(),
            awaiting_reason: false,
        };
        state
            .approvals
            .insert(approval.request.correlation_id.clone(), approval.clone());
        Ok(approval)
    }

    /// Returns a copy of the approval, if still in flight.
    pub fn get(&self, correlation_id: &str) -> Option<Approval> {
        self.state.lock().approvals.get(correlation_id).cloned()
    }

    /// Attaches notification metadata. No-op once resolved.
    pub fn set_message(&self, correlation_id: &str, message_id: MessageId, message_text: String) {
        let mut state = self.state.lock();
        if let Some(approval) = state.approvals.get_mut(correlation_id) {
            approval.message_id = message_id;
            approval.message_text = message_text;
        }
    }

    /// Makes `correlation_id` the deny-reason prompt holder.
    ///
    /// Returns `None` if the approval is gone. Otherwise returns the prompt
    /// message id of a different, superseded holder (0 if there was none),
    /// which the caller should delete.
    pub fn start_reason(&self, correlation_id: &str) -> Option<MessageId> {
        let mut state = self.state.lock();
        if !state.approvals.contains_key(correlation_id) {
            return None;
        }

        let mut previous = 0;
        if let Some(holder) = state.prompt.take() {
            // A repeated press on the holder hands back its own stale prompt.
            if holder.correlation_id != correlation_id
                && let Some(old) = state.approvals.get_mut(&holder.correlation_id)
            {
                old.awaiting_reason = false;
            }
            previous = holder.message_id;
        }

        if let Some(approval) = state.approvals.get_mut(correlation_id) {
            approval.awaiting_reason = true;
        }
        state.prompt = Some(PromptHolder {
            correlation_id: correlation_id.to_string(),
            message_id: 0,
        });
        Some(previous)
    }

    /// Records the prompt message id, unless the holder changed meanwhile.
    pub fn set_prompt_message(&self, correlation_id: &str, message_id: MessageId) {
        let mut state = self.state.lock();
        if let Some(holder) = state.prompt.as_mut()
            && holder.correlation_id == correlation_id
        {
            holder.message_id = message_id;
        }
    }

    /// Cancels the prompt held by `correlation_id`.
    ///
    /// Returns the prompt message id to delete, or 0 if `correlation_id` is
    /// not the holder (nothing is changed then).
    pub fn clear_prompt(&self, correlation_id: &str) -> MessageId {
        let mut state = self.state.lock();
        match &state.prompt {
            Some(holder) if holder.correlation_id == correlation_id => {}
            _ => return 0,
        }
        let holder = state.prompt.take();
        if let Some(approval) = state.approvals.get_mut(correlation_id) {
            approval.awaiting_reason = false;
        }
        holder.map_or(0, |h| h.message_id)
    }

    /// Returns the prompt holder and its prompt message id, if it is still
    /// awaiting a reason.
    pub fn current_prompt(&self) -> Option<(Approval, MessageId)> {
        let state = self.state.lock();
        let holder = state.prompt.as_ref()?;
        let approval = state.approvals.get(&holder.correlation_id)?;
        if !approval.awaiting_reason {
            return None;
        }
        Some((approval.clone(), holder.message_id))
    }

    /// Terminal step: removes the approval and hands it to the caller.
    ///
    /// At most one caller ever receives `Some` for a given correlation id. The
    /// second element is the prompt message id to delete when the approval was
    /// the prompt holder (0 otherwise).
    pub fn resolve(&self, correlation_id: &str) -> Option<(Approval, MessageId)> {
        let mut state = self.state.lock();
        let mut approval = state.approvals.remove(correlation_id)?;
        let mut prompt_id = 0;
        if state
            .prompt
            .as_ref()
            .is_some_and(|h| h.correlation_id == correlation_id)
        {
            prompt_id = state.prompt.take().map_or(0, |h| h.message_id);
        }
        approval.awaiting_reason = false;
        Some((approval, prompt_id))
    }

    /// Number of in-flight approvals.
    pub fn len(&self) -> usize {
        self.state.lock().approvals.len()
    }

    /// Returns `true` when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::sample_request;

    #[test]
    fn add_and_get_round_trip() {
        let registry = ApprovalRegistry::new();
        let approval = registry.add(sample_request("req-1")).expect("add");
        assert_eq!(approval.correlation_id(), "req-1");
        assert_eq!(approval.message_id, 0);

        let fetched = registry.get("req-1").expect("approval present");
        assert_eq!(fetched.request.tool, "kubectl_delete");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn add_rejects_in_flight_duplicate() {
        let registry = ApprovalRegistry::new();
        registry.add(sample_request("req-1")).expect("first add");
        let err = registry.add(sample_request("req-1")).expect_err("duplicate");
        assert_eq!(err, RegistryError::AlreadyExists("req-1".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolved_id_can_be_reused() {
        let registry = ApprovalRegistry::new();
        registry.add(sample_request("req-1")).expect("add");
        registry.resolve("req-1").expect("resolve");
        registry.add(sample_request("req-1")).expect("re-add after resolve");
    }

    #[test]
    fn concurrent_adds_with_distinct_ids_all_succeed() {
        let registry = Arc::new(ApprovalRegistry::new());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.add(sample_request(&format!("req-{i}"))))
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread").expect("add");
        }
        assert_eq!(registry.len(), 32);
        for i in 0..32 {
            assert!(registry.get(&format!("req-{i}")).is_some());
        }
    }

    #[test]
    fn concurrent_resolve_has_exactly_one_winner() {
        for _ in 0..50 {
            let registry = Arc::new(ApprovalRegistry::new());
            registry.add(sample_request("race")).expect("add");
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let registry = registry.clone();
                    std::thread::spawn(move || registry.resolve("race").is_some())
                })
                .collect();
            let winners = handles
                .into_iter()
                .map(|h| h.join().expect("thread"))
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
            assert!(registry.get("race").is_none());
        }
    }

    #[test]
    fn set_message_is_noop_after_resolve() {
        let registry = ApprovalRegistry::new();
        registry.add(sample_request("req-1")).expect("add");
        registry.set_message("req-1", 10, "text".to_string());
        assert_eq!(registry.get("req-1").expect("present").message_id, 10);

        registry.resolve("req-1").expect("resolve");
        registry.set_message("req-1", 11, "later".to_string());
        assert!(registry.get("req-1").is_none());
    }

    #[test]
    fn start_reason_fails_for_unknown_id() {
        let registry = ApprovalRegistry::new();
        assert_eq!(registry.start_reason("nope"), None);
        assert!(registry.current_prompt().is_none());
    }

    #[test]
    fn start_reason_supersedes_previous_holder() {
        let registry = ApprovalRegistry::new();
        registry.add(sample_request("A")).expect("add A");
        registry.add(sample_request("B")).expect("add B");

        assert_eq!(registry.start_reason("A"), Some(0));
        registry.set_prompt_message("A", 77);

        let previous = registry.start_reason("B").expect("B present");
        assert_eq!(previous, 77);

        let (holder, prompt_id) = registry.current_prompt().expect("prompt");
        assert_eq!(holder.correlation_id(), "B");
        assert_eq!(prompt_id, 0);
        assert!(!registry.get("A").expect("A still pending").awaiting_reason);
        assert!(registry.get("B").expect("B").awaiting_reason);
    }

    #[test]
    fn set_prompt_message_ignores_superseded_holder() {
        let registry = ApprovalRegistry::new();
        registry.add(sample_request("A")).expect("add A");
        registry.add(sample_request("B")).expect("add B");
        registry.start_reason("A").expect("A");
        registry.start_reason("B").expect("B");

        registry.set_prompt_message("A", 5);
        let (_, prompt_id) = registry.current_prompt().expect("prompt");
        assert_eq!(prompt_id, 0);

        registry.set_prompt_message("B", 6);
        let (_, prompt_id) = registry.current_prompt().expect("prompt");
        assert_eq!(prompt_id, 6);
    }

    #[test]
    fn clear_prompt_on_non_holder_changes_nothing() {
        let registry = ApprovalRegistry::new();
        registry.add(sample_request("A")).expect("add A");
        registry.add(sample_request("B")).expect("add B");
        registry.start_reason("A").expect("A");
        registry.set_prompt_message("A", 9);

        assert_eq!(registry.clear_prompt("B"), 0);
        assert_eq!(registry.clear_prompt("missing"), 0);

        let (holder, prompt_id) = registry.current_prompt().expect("still held");
        assert_eq!(holder.correlation_id(), "A");
        assert_eq!(prompt_id, 9);
    }

    #[test]
    fn clear_prompt_on_holder_returns_message_id() {
        let registry = ApprovalRegistry::new();
        registry.add(sample_request("A")).expect("add A");
        registry.start_reason("A").expect("A");
        registry.set_prompt_message("A", 9);

        assert_eq!(registry.clear_prompt("A"), 9);
        assert!(registry.current_prompt().is_none());
        assert!(!registry.get("A").expect("A").awaiting_reason);
        assert_eq!(registry.clear_prompt("A"), 0);
    }

    #[test]
    fn resolve_returns_prompt_id_only_for_holder() {
        let registry = ApprovalRegistry::new();
        registry.add(sample_request("A")).expect("add A");
        registry.add(sample_request("B")).expect("add B");
        registry.start_reason("A").expect("A");
        registry.set_prompt_message("A", 12);

        let (_, prompt_id) = registry.resolve("B").expect("resolve B");
        assert_eq!(prompt_id, 0);
        assert!(registry.current_prompt().is_some());

        let (approval, prompt_id) = registry.resolve("A").expect("resolve A");
        assert_eq!(prompt_id, 12);
        assert!(!approval.awaiting_reason);
        assert!(registry.current_prompt().is_none());
        assert!(registry.resolve("A").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn restarting_prompt_on_holder_returns_own_prompt() {
        let registry = ApprovalRegistry::new();
        registry.add(sample_request("A")).expect("add A");
        registry.start_reason("A").expect("A");
        registry.set_prompt_message("A", 3);

        assert_eq!(registry.start_reason("A"), Some(3));
        let (holder, prompt_id) = registry.current_prompt().expect("prompt");
        assert_eq!(holder.correlation_id(), "A");
        assert_eq!(prompt_id, 0);
    }
}
