// common/src/models/chat.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of past exchanges sent along with each new question
pub const HISTORY_LIMIT: usize = 2;

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub user: String,
    pub assistant: String,
}

impl Interaction {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Bounded FIFO of recent exchanges; the oldest is evicted on overflow
#[derive(Debug, Clone)]
pub struct InteractionHistory {
    entries: VecDeque<Interaction>,
    capacity: usize,
}

impl Default for InteractionHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_LIMIT)
    }
}

impl InteractionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, interaction: Interaction) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(interaction);
    }

    /// Oldest first, as sent on the wire
    pub fn to_vec(&self) -> Vec<Interaction> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Sent,
    Received,
}

/// A bubble in the rendered conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub kind: MessageKind,
    /// Received bubbles that report a failure instead of an answer
    pub error: bool,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn sent(text: impl Into<String>) -> Self {
        Self::build(text.into(), MessageKind::Sent, false)
    }

    pub fn received(text: impl Into<String>) -> Self {
        Self::build(text.into(), MessageKind::Received, false)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::build(text.into(), MessageKind::Received, true)
    }

    fn build(text: String, kind: MessageKind, error: bool) -> Self {
        Self {
            text,
            kind,
            error,
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_evicts_oldest() {
        let mut history = InteractionHistory::default();
        history.push(Interaction::new("q1", "a1"));
        history.push(Interaction::new("q2", "a2"));
        history.push(Interaction::new("q3", "a3"));

        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(
            history.to_vec(),
            vec![Interaction::new("q2", "a2"), Interaction::new("q3", "a3")]
        );
    }

    #[test]
    fn test_history_never_exceeds_limit() {
        let mut history = InteractionHistory::default();
        for i in 0..10 {
            history.push(Interaction::new(format!("q{}", i), format!("a{}", i)));
            assert!(history.len() <= HISTORY_LIMIT);
        }
        assert_eq!(history.to_vec()[0].user, "q8");
    }

    #[test]
    fn test_zero_capacity_history_stays_empty() {
        let mut history = InteractionHistory::with_capacity(0);
        history.push(Interaction::new("q", "a"));
        assert!(history.is_empty());
    }

    #[test]
    fn test_error_bubble_is_received() {
        let message = ChatMessage::error("boom");
        assert_eq!(message.kind, MessageKind::Received);
        assert!(message.error);
        assert!(!ChatMessage::received("ok").error);
    }
}
