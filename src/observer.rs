//! State transition notifications.
//!
//! Every transition of the [`AuthStateStore`](crate::state::AuthStateStore)
//! is forwarded to the attached observers, which is how a UI layer learns that
//! the state changed. Events never carry the token or the record.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Receives a copy of every transition. Implement this to drive a UI or to
/// forward events to a log.
pub trait StateObserver: Send {
    fn on_transition(&mut self, event: &TransitionEvent);
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// The persisted state was read for the first time.
    Loaded,
    /// Protection was turned on.
    Enabled,
    /// Protection was turned off or reset after key invalidation.
    Disabled,
    /// The in-memory token was replaced.
    TokenRandomized,
}

/// A single state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Which transition happened.
    pub kind: TransitionKind,
    /// Whether protection is enabled after the transition.
    pub enabled: bool,
    /// When the transition was applied.
    pub timestamp: DateTime<Utc>,
}

impl TransitionEvent {
    pub(crate) fn now(kind: TransitionKind, enabled: bool) -> Self {
        Self {
            kind,
            enabled,
            timestamp: Utc::now(),
        }
    }
}

/// An append-only, shareable history of transitions.
///
/// Clones share the same history, so one clone can be attached as an
/// observer while another is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct TransitionLog {
    events: Arc<Mutex<Vec<TransitionEvent>>>,
}

impl TransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Just the kinds of the recorded events, oldest first.
    pub fn kinds(&self) -> Vec<TransitionKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateObserver for TransitionLog {
    fn on_transition(&mut self, event: &TransitionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_history() {
        let log = TransitionLog::new();
        let mut attached = log.clone();
        attached.on_transition(&TransitionEvent::now(TransitionKind::Enabled, true));
        assert_eq!(log.len(), 1);
        assert_eq!(log.kinds(), vec![TransitionKind::Enabled]);
    }

    #[test]
    fn event_serializes_without_secrets() {
        let json =
            serde_json::to_string(&TransitionEvent::now(TransitionKind::Disabled, false)).unwrap();
        assert!(json.contains("\"kind\":\"disabled\""));
        assert!(json.contains("\"enabled\":false"));
    }
}
