//! Thread-safe registry of broadcast channels keyed by topic, with per-user presence.
//!
//! Instructors subscribe to their own notification topic from the dashboard;
//! the attendance engine publishes into it after a scan commits. Publishing to a
//! topic nobody listens on is a no-op, so kiosks never wait on a dashboard.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

type Topic = String;
type Sender = broadcast::Sender<String>;
type Receiver = broadcast::Receiver<String>;

/// Per-topic channel capacity. Slow subscribers lag and drop old frames.
const CHANNEL_CAPACITY: usize = 100;

#[derive(Clone, Default)]
pub struct WebSocketManager {
    inner: Arc<RwLock<HashMap<Topic, Sender>>>,
    /// topic -> (user_id -> open socket count)
    presence: Arc<RwLock<HashMap<Topic, HashMap<i64, usize>>>>,
}

impl WebSocketManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the given topic, creating its channel on first use.
    pub async fn subscribe(&self, topic: &str) -> Receiver {
        let mut map = self.inner.write().await;
        map.entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Sends `msg` to every current subscriber of `topic`.
    ///
    /// Topics left without receivers are dropped after the send.
    pub async fn broadcast<T: Into<String>>(&self, topic: &str, msg: T) {
        let mut map = self.inner.write().await;
        if let Some(sender) = map.get(topic) {
            let _ = sender.send(msg.into());
            if sender.receiver_count() == 0 {
                tracing::debug!(topic, "dropping ws topic without subscribers");
                map.remove(topic);
            }
        }
    }

    /// Number of live receivers on `topic` (0 when the topic does not exist).
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .read()
            .await
            .get(topic)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    pub async fn register(&self, topic: &str, user_id: i64) {
        let mut p = self.presence.write().await;
        let entry = p.entry(topic.to_string()).or_default();
        *entry.entry(user_id).or_insert(0) += 1;
    }

    pub async fn unregister(&self, topic: &str, user_id: i64) {
        let mut p = self.presence.write().await;
        if let Some(users) = p.get_mut(topic) {
            if let Some(cnt) = users.get_mut(&user_id) {
                if *cnt > 1 {
                    *cnt -= 1;
                } else {
                    users.remove(&user_id);
                }
            }
            if users.is_empty() {
                p.remove(topic);
            }
        }
    }

    /// `true` while `user_id` holds at least one socket on `topic`.
    pub async fn is_user_present_on(&self, topic: &str, user_id: i64) -> bool {
        let p = self.presence.read().await;
        p.get(topic).and_then(|m| m.get(&user_id)).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::notification_topic;
    use tokio::time::{Duration, timeout};

    #[tokio::test]
    async fn notification_reaches_every_open_dashboard() {
        let manager = WebSocketManager::new();
        let topic = notification_topic(7);

        let mut tab_a = manager.subscribe(&topic).await;
        let mut tab_b = manager.subscribe(&topic).await;
        assert_eq!(manager.subscriber_count(&topic).await, 2);

        manager.broadcast(&topic, "scan").await;

        for rx in [&mut tab_a, &mut tab_b] {
            let msg = timeout(Duration::from_millis(50), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(msg, "scan");
        }
    }

    #[tokio::test]
    async fn publishing_without_listeners_is_silent() {
        let manager = WebSocketManager::new();
        manager.broadcast(&notification_topic(1), "nobody home").await;
        assert_eq!(manager.subscriber_count(&notification_topic(1)).await, 0);
    }

    #[tokio::test]
    async fn closed_topics_are_reclaimed_on_next_send() {
        let manager = WebSocketManager::new();
        let topic = "ephemeral";
        {
            let _rx = manager.subscribe(topic).await;
        }
        manager.broadcast(topic, "cleanup").await;
        assert!(!manager.inner.read().await.contains_key(topic));
    }

    #[tokio::test]
    async fn presence_is_refcounted_per_socket() {
        let m = WebSocketManager::new();
        let topic = "p";
        m.register(topic, 7).await;
        m.register(topic, 7).await;
        m.unregister(topic, 7).await;
        assert!(m.is_user_present_on(topic, 7).await);
        m.unregister(topic, 7).await;
        assert!(!m.is_user_present_on(topic, 7).await);
    }
}
