//! Bounded, sequence-ordered store of broadcast messages
//!
//! Messages get a server-assigned, strictly increasing sequence id and live
//! in a ring buffer of fixed capacity. Eviction is strictly FIFO: when the
//! buffer is full the lowest-sequence entry is dropped first. Steady-state
//! polling hands out at most one message per call; replay hands a newly
//! (re)connected session everything it has not seen in one response.

use std::collections::VecDeque;

use tokio::sync::RwLock;

use crate::current_timestamp;

/// An immutable broadcast message held in the ring buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastMessage {
    /// Server-assigned sequence id, strictly increasing, never reused
    pub sequence: u64,
    /// Display name of the sender
    pub sender_name: String,
    /// Message text
    pub body: String,
    /// Milliseconds since UNIX epoch at append time
    pub timestamp: u64,
}

impl BroadcastMessage {
    /// Render the message as a delivery line
    pub fn render(&self) -> String {
        format!("{}: {}", self.sender_name, self.body)
    }
}

#[derive(Debug)]
struct StoreInner {
    messages: VecDeque<BroadcastMessage>,
    next_sequence: u64,
}

/// Ring buffer of broadcast messages
#[derive(Debug)]
pub struct MessageStore {
    inner: RwLock<StoreInner>,
    capacity: usize,
}

impl MessageStore {
    /// Create a store holding at most `capacity` messages
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                messages: VecDeque::with_capacity(capacity),
                next_sequence: 0,
            }),
            capacity,
        }
    }

    /// Append a message, assigning it the next sequence id
    ///
    /// Evicts the oldest entry first when the buffer is at capacity.
    pub async fn append(&self, sender_name: impl Into<String>, body: impl Into<String>) -> u64 {
        let mut inner = self.inner.write().await;
        inner.next_sequence += 1;
        let sequence = inner.next_sequence;
        if inner.messages.len() == self.capacity {
            inner.messages.pop_front();
        }
        inner.messages.push_back(BroadcastMessage {
            sequence,
            sender_name: sender_name.into(),
            body: body.into(),
            timestamp: current_timestamp(),
        });
        sequence
    }

    /// Number of buffered messages
    pub async fn len(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.messages.is_empty()
    }

    /// Lowest-sequence message above `cursor`, rendered for delivery
    ///
    /// Returns the message's sequence id alongside its delivery line so the
    /// caller can advance the session cursor to exactly that point.
    pub async fn next_after(&self, cursor: u64) -> Option<(u64, String)> {
        let inner = self.inner.read().await;
        inner
            .messages
            .iter()
            .find(|m| m.sequence > cursor)
            .map(|m| (m.sequence, m.render()))
    }

    /// All buffered messages above `cursor`, concatenated in order
    ///
    /// Returns the rendered block and the buffer's maximum sequence id, or
    /// None when there is nothing to replay.
    pub async fn replay_after(&self, cursor: u64) -> Option<(String, u64)> {
        let inner = self.inner.read().await;
        let lines: Vec<String> = inner
            .messages
            .iter()
            .filter(|m| m.sequence > cursor)
            .map(|m| m.render())
            .collect();
        if lines.is_empty() {
            return None;
        }
        let max_sequence = inner.messages.back().map(|m| m.sequence).unwrap_or(cursor);
        Some((lines.join("\n"), max_sequence))
    }

    /// Snapshot of buffered sequence ids, oldest first
    pub async fn sequences(&self) -> Vec<u64> {
        let inner = self.inner.read().await;
        inner.messages.iter().map(|m| m.sequence).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequences_strictly_increase() {
        let store = MessageStore::new(8);
        let first = store.append("alice", "one").await;
        let second = store.append("bob", "two").await;
        let third = store.append("alice", "three").await;
        assert!(first < second && second < third);
    }

    #[tokio::test]
    async fn test_capacity_bound_and_fifo_eviction() {
        let store = MessageStore::new(3);
        for i in 0..10 {
            store.append("alice", format!("msg {}", i)).await;
            assert!(store.len().await <= 3);
        }

        // Only the 3 most recent survive, in ascending sequence order
        let sequences = store.sequences().await;
        assert_eq!(sequences, vec![8, 9, 10]);
    }

    #[tokio::test]
    async fn test_next_after_skips_delivered() {
        let store = MessageStore::new(8);
        store.append("alice", "one").await;
        let second = store.append("bob", "two").await;

        let (seq, line) = store.next_after(0).await.unwrap();
        assert_eq!(seq, 1);
        assert_eq!(line, "alice: one");

        let (seq, line) = store.next_after(seq).await.unwrap();
        assert_eq!(seq, second);
        assert_eq!(line, "bob: two");

        assert!(store.next_after(second).await.is_none());
    }

    #[tokio::test]
    async fn test_replay_concatenates_in_order() {
        let store = MessageStore::new(8);
        store.append("alice", "one").await;
        store.append("bob", "two").await;
        store.append("alice", "three").await;

        let (text, max) = store.replay_after(0).await.unwrap();
        assert_eq!(text, "alice: one\nbob: two\nalice: three");
        assert_eq!(max, 3);

        let (text, max) = store.replay_after(1).await.unwrap();
        assert_eq!(text, "bob: two\nalice: three");
        assert_eq!(max, 3);

        assert!(store.replay_after(3).await.is_none());
    }

    #[tokio::test]
    async fn test_replay_empty_store() {
        let store = MessageStore::new(4);
        assert!(store.replay_after(0).await.is_none());
        assert!(store.sequences().await.is_empty());
    }

    #[tokio::test]
    async fn test_evicted_sequences_are_not_reused() {
        let store = MessageStore::new(2);
        for _ in 0..5 {
            store.append("alice", "x").await;
        }
        // Evictions do not roll the counter back
        let seq = store.append("alice", "y").await;
        assert_eq!(seq, 6);
    }
}
