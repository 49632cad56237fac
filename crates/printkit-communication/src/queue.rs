//! Ordered command queue with priority insertion
//!
//! Entries are FIFO within a priority class. Front-priority entries jump
//! ahead of normal ones but preserve order among themselves; safety
//! commands are inserted this way.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Priority class of a queued line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    /// Appended at the tail
    Normal,
    /// Inserted ahead of normal entries
    Front,
}

/// A queued outgoing line (no terminator) and its priority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// The command text
    pub line: String,
    /// Priority class the entry was queued with
    pub priority: Priority,
}

/// Ordered queue of outgoing command lines
#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: VecDeque<QueueEntry>,
    // Number of front-priority entries at the head of the deque.
    front_len: usize,
}

impl CommandQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line at the tail
    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push_back(QueueEntry {
            line: line.into(),
            priority: Priority::Normal,
        });
    }

    /// Insert a line ahead of any normal entries, behind other front entries
    pub fn push_front(&mut self, line: impl Into<String>) {
        self.entries.insert(
            self.front_len,
            QueueEntry {
                line: line.into(),
                priority: Priority::Front,
            },
        );
        self.front_len += 1;
    }

    /// Remove and return the head entry
    pub fn pop(&mut self) -> Option<QueueEntry> {
        let entry = self.entries.pop_front()?;
        if self.front_len > 0 {
            self.front_len -= 1;
        }
        Some(entry)
    }

    /// Discard all entries
    pub fn clear(&mut self) {
        self.entries.clear();
        self.front_len = 0;
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are queued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut CommandQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.pop().map(|e| e.line)).collect()
    }

    #[test]
    fn fifo_within_normal_priority() {
        let mut queue = CommandQueue::new();
        queue.push("G28");
        queue.push("G1 X10");
        queue.push("G1 Y10");
        assert_eq!(drain(&mut queue), vec!["G28", "G1 X10", "G1 Y10"]);
    }

    #[test]
    fn front_jumps_normal_entries() {
        let mut queue = CommandQueue::new();
        queue.push("G1 X1");
        queue.push("G1 X2");
        queue.push_front("M112");
        assert_eq!(drain(&mut queue), vec!["M112", "G1 X1", "G1 X2"]);
    }

    #[test]
    fn front_entries_keep_their_own_order() {
        let mut queue = CommandQueue::new();
        queue.push("G1 X1");
        queue.push_front("M112");
        queue.push_front("M108");
        assert_eq!(drain(&mut queue), vec!["M112", "M108", "G1 X1"]);
    }

    #[test]
    fn normal_push_lands_behind_front_entries() {
        let mut queue = CommandQueue::new();
        queue.push_front("M112");
        queue.push("G28");
        assert_eq!(drain(&mut queue), vec!["M112", "G28"]);
    }

    #[test]
    fn pop_after_mixed_priorities_tracks_front_count() {
        let mut queue = CommandQueue::new();
        queue.push_front("A");
        queue.push_front("B");
        queue.push("C");
        assert_eq!(queue.pop().unwrap().line, "A");
        // A new front entry still lands behind the remaining front entry.
        queue.push_front("D");
        assert_eq!(drain(&mut queue), vec!["B", "D", "C"]);
    }

    #[test]
    fn clear_discards_everything() {
        let mut queue = CommandQueue::new();
        queue.push("G28");
        queue.push_front("M112");
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
        // The front cursor is reset as well.
        queue.push("G1 X1");
        queue.push_front("M112");
        assert_eq!(drain(&mut queue), vec!["M112", "G1 X1"]);
    }

    #[test]
    fn entries_record_priority() {
        let mut queue = CommandQueue::new();
        queue.push("G28");
        queue.push_front("M112");
        assert_eq!(queue.pop().unwrap().priority, Priority::Front);
        assert_eq!(queue.pop().unwrap().priority, Priority::Normal);
    }
}
