//! # Composer
//!
//! Pending input text plus the in-flight gate for outbound messages.

use chrono::{DateTime, Utc};

use crate::error::{TiggyError, TiggyResult};
use crate::types::ThreadId;

/// Snapshot taken when a send is accepted, used to roll the thread back if
/// the backend rejects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub thread_id: ThreadId,
    pub message_id: String,
    pub text: String,
    pub previous_title: String,
    pub previous_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    input: String,
    pending: Option<PendingSend>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn push_char(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn pop_char(&mut self) {
        self.input.pop();
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    pub fn is_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingSend> {
        self.pending.as_ref()
    }

    /// Resolve the text a submit would send.
    ///
    /// Uses `explicit` when given, otherwise the pending input. Blank text and
    /// a send already in flight are both rejected.
    pub fn resolve(&self, explicit: Option<&str>) -> TiggyResult<String> {
        if self.is_in_flight() {
            return Err(TiggyError::validation("a message is already being sent"));
        }

        let text = explicit.unwrap_or(&self.input);
        if text.trim().is_empty() {
            return Err(TiggyError::validation("message is empty"));
        }

        Ok(text.to_string())
    }

    pub(crate) fn begin(&mut self, pending: PendingSend) {
        self.input.clear();
        self.pending = Some(pending);
    }

    pub(crate) fn finish(&mut self) -> Option<PendingSend> {
        self.pending.take()
    }

    pub(crate) fn retarget(&mut self, from: &ThreadId, to: &ThreadId) {
        if let Some(pending) = self.pending.as_mut() {
            if &pending.thread_id == from {
                pending.thread_id = to.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PendingSend {
        PendingSend {
            thread_id: ThreadId::new("c1"),
            message_id: "m1".to_string(),
            text: "hi".to_string(),
            previous_title: "New Chat".to_string(),
            previous_updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_prefers_explicit_text() {
        let mut composer = Composer::new();
        composer.set_input("typed");
        assert_eq!(composer.resolve(Some("suggested")).unwrap(), "suggested");
        assert_eq!(composer.resolve(None).unwrap(), "typed");
    }

    #[test]
    fn test_resolve_rejects_blank() {
        let mut composer = Composer::new();
        assert!(matches!(composer.resolve(None), Err(TiggyError::Validation(_))));

        composer.set_input("   \n\t");
        assert!(matches!(composer.resolve(None), Err(TiggyError::Validation(_))));
        assert!(matches!(composer.resolve(Some(" ")), Err(TiggyError::Validation(_))));
    }

    #[test]
    fn test_resolve_rejects_while_in_flight() {
        let mut composer = Composer::new();
        composer.begin(pending());
        composer.set_input("next question");
        assert!(composer.resolve(None).is_err());

        composer.finish();
        assert!(composer.resolve(None).is_ok());
    }

    #[test]
    fn test_begin_clears_input() {
        let mut composer = Composer::new();
        composer.set_input("hi");
        composer.begin(pending());
        assert!(composer.input().is_empty());
        assert!(composer.is_in_flight());
    }
}
