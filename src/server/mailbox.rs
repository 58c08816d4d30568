//! Per-recipient queues of private messages
//!
//! Entries are addressed by display name, not identity id: a message for a
//! name with no connected session waits until some session claims that name.
//! That permits name collision across sessions and is a documented
//! limitation of the protocol, not something the mailbox tries to fix.

use std::collections::{HashMap, VecDeque};

use tokio::sync::RwLock;

/// Render a private message body with its sender attribution
pub fn format_private(sender_name: &str, msg: &str) -> String {
    format!("***{}***: {}", sender_name, msg)
}

/// Per-recipient-name private message queues
#[derive(Debug, Default)]
pub struct Mailbox {
    queues: RwLock<HashMap<String, VecDeque<String>>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a formatted entry for `recipient_name`, creating the queue lazily
    pub async fn deposit(&self, recipient_name: impl Into<String>, formatted_body: String) {
        let mut queues = self.queues.write().await;
        queues
            .entry(recipient_name.into())
            .or_default()
            .push_back(formatted_body);
    }

    /// Pop the oldest pending entry for `recipient_name`
    ///
    /// At-most-once: a popped entry is gone. Empty queues are dropped so the
    /// map does not grow with one-off recipients.
    pub async fn take_next(&self, recipient_name: &str) -> Option<String> {
        let mut queues = self.queues.write().await;
        let queue = queues.get_mut(recipient_name)?;
        let entry = queue.pop_front();
        if queue.is_empty() {
            queues.remove(recipient_name);
        }
        entry
    }

    /// Number of entries pending for `recipient_name`
    pub async fn pending(&self, recipient_name: &str) -> usize {
        let queues = self.queues.read().await;
        queues.get(recipient_name).map(|q| q.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deposit_take_order() {
        let mailbox = Mailbox::new();
        mailbox
            .deposit("bob", format_private("alice", "first"))
            .await;
        mailbox
            .deposit("bob", format_private("carol", "second"))
            .await;

        assert_eq!(mailbox.pending("bob").await, 2);
        assert_eq!(
            mailbox.take_next("bob").await.as_deref(),
            Some("***alice***: first")
        );
        assert_eq!(
            mailbox.take_next("bob").await.as_deref(),
            Some("***carol***: second")
        );
        assert!(mailbox.take_next("bob").await.is_none());
    }

    #[tokio::test]
    async fn test_take_is_at_most_once() {
        let mailbox = Mailbox::new();
        mailbox.deposit("bob", format_private("alice", "hello")).await;

        assert_eq!(
            mailbox.take_next("bob").await.as_deref(),
            Some("***alice***: hello")
        );
        // Immediate second poll yields nothing
        assert!(mailbox.take_next("bob").await.is_none());
        assert_eq!(mailbox.pending("bob").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_recipient() {
        let mailbox = Mailbox::new();
        assert!(mailbox.take_next("nobody").await.is_none());
    }

    #[test]
    fn test_private_formatting() {
        assert_eq!(format_private("alice", "hello"), "***alice***: hello");
    }
}
