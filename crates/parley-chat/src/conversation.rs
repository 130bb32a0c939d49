//! Append-only conversation log.

use parley_core::types::{Role, Turn};

/// Ordered turns of one session. Turns are never edited once appended.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent assistant turn, if any.
    pub fn last_assistant(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == Role::Assistant)
    }

    /// Drop every turn.
    pub fn reset(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut log = ConversationLog::new();
        log.append(Turn::user("one", "10:00"));
        log.append(Turn::assistant("two", "10:00"));
        log.append(Turn::user("three", "10:01"));

        let texts: Vec<&str> = log.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_last_assistant() {
        let mut log = ConversationLog::new();
        assert!(log.last_assistant().is_none());

        log.append(Turn::user("q1", "10:00"));
        log.append(Turn::assistant("a1", "10:00"));
        log.append(Turn::user("q2", "10:02"));
        assert_eq!(log.last_assistant().unwrap().text, "a1");
    }

    #[test]
    fn test_reset_empties_log() {
        let mut log = ConversationLog::new();
        log.append(Turn::user("q", "10:00"));
        log.reset();
        assert!(log.is_empty());
        assert_eq!(log.turns().len(), 0);
    }
}
