// Notification queue abstraction
// Downstream consumers learn about finished transcriptions through a FIFO
// queue; sends are best effort and never fail the pipeline.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// One queued notification
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub queue: String,
    pub payload: Value,
    /// Messages sharing a group key are delivered in order
    pub group_key: String,
    /// Duplicate suppression within the delivery window
    pub dedup_key: String,
}

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn send(
        &self,
        queue: &str,
        payload: Value,
        group_key: &str,
        dedup_key: &str,
    ) -> Result<()>;
}

/// In-process queue over an unbounded channel. Stands in for a hosted FIFO
/// queue in tests and single-node deployments.
pub struct InProcessQueue {
    sender: mpsc::UnboundedSender<QueueMessage>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<QueueMessage>>>,
}

impl InProcessQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Take the consuming end. Callable once.
    pub fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<QueueMessage>> {
        self.receiver.lock().ok()?.take()
    }
}

impl Default for InProcessQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationQueue for InProcessQueue {
    async fn send(
        &self,
        queue: &str,
        payload: Value,
        group_key: &str,
        dedup_key: &str,
    ) -> Result<()> {
        self.sender
            .send(QueueMessage {
                queue: queue.to_string(),
                payload,
                group_key: group_key.to_string(),
                dedup_key: dedup_key.to_string(),
            })
            .context("Queue receiver dropped")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn delivers_messages_in_order() {
        let queue = InProcessQueue::new();
        let mut receiver = queue.take_receiver().unwrap();

        queue
            .send("q", json!({"session_id": "a"}), "a", "a-1")
            .await
            .unwrap();
        queue
            .send("q", json!({"session_id": "b"}), "b", "b-1")
            .await
            .unwrap();

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.payload["session_id"], "a");
        assert_eq!(first.group_key, "a");

        let second = receiver.recv().await.unwrap();
        assert_eq!(second.dedup_key, "b-1");
    }

    #[tokio::test]
    async fn receiver_is_single_take() {
        let queue = InProcessQueue::new();
        assert!(queue.take_receiver().is_some());
        assert!(queue.take_receiver().is_none());
    }
}
