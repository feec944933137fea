//! Membership feed seam and an in-process implementation.

use super::error::PresenceError;
use super::event::{PresenceEvent, PresenceMeta, PresenceState};
use crate::core::RoomId;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Live feed of presence events on one channel.
pub type PresenceSubscription = broadcast::Receiver<PresenceEvent>;

#[async_trait]
pub trait MembershipFeed: Send + Sync {
    async fn join_channel(&self, room_id: &RoomId)
        -> Result<Arc<dyn PresenceChannel>, PresenceError>;
}

/// Handle on a room's presence channel.
#[async_trait]
pub trait PresenceChannel: Send + Sync {
    fn topic(&self) -> &str;

    /// Complete the subscribe handshake and start receiving events.
    async fn subscribe(&self) -> Result<PresenceSubscription, PresenceError>;

    /// Announce (or re-announce) `meta` under `key`.
    async fn track(&self, key: &str, meta: PresenceMeta) -> Result<(), PresenceError>;

    async fn untrack(&self, key: &str) -> Result<(), PresenceError>;

    /// Untrack everything this handle tracked and leave the channel.
    async fn unsubscribe(&self) -> Result<(), PresenceError>;

    async fn presence_state(&self) -> Result<PresenceState, PresenceError>;
}

struct Topic {
    tx: broadcast::Sender<PresenceEvent>,
    members: RwLock<PresenceState>,
}

impl Topic {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            members: RwLock::new(HashMap::new()),
        }
    }

    fn publish(&self, event: PresenceEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

/// Broadcast-backed feed shared by every session in the process.
#[derive(Clone)]
pub struct InMemoryMembershipFeed {
    topics: Arc<Mutex<HashMap<String, Arc<Topic>>>>,
    capacity: usize,
    stall_subscribe: bool,
}

impl Default for InMemoryMembershipFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMembershipFeed {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            capacity: 64,
            stall_subscribe: false,
        }
    }

    /// A feed whose subscribe handshake never completes.
    pub fn stalled() -> Self {
        Self {
            stall_subscribe: true,
            ..Self::new()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Publish a raw event on a room's channel. Returns the receiver count.
    pub fn inject(&self, room_id: &RoomId, event: PresenceEvent) -> usize {
        self.topic(&room_id.presence_topic()).tx.send(event).unwrap_or(0)
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        self.topics
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Topic::new(self.capacity)))
            .clone()
    }
}

#[async_trait]
impl MembershipFeed for InMemoryMembershipFeed {
    async fn join_channel(
        &self,
        room_id: &RoomId,
    ) -> Result<Arc<dyn PresenceChannel>, PresenceError> {
        let name = room_id.presence_topic();
        let topic = self.topic(&name);
        Ok(Arc::new(InMemoryPresenceChannel {
            name,
            topic,
            stall_subscribe: self.stall_subscribe,
            tracked: Mutex::new(HashSet::new()),
        }))
    }
}

struct InMemoryPresenceChannel {
    name: String,
    topic: Arc<Topic>,
    stall_subscribe: bool,
    tracked: Mutex<HashSet<String>>,
}

#[async_trait]
impl PresenceChannel for InMemoryPresenceChannel {
    fn topic(&self) -> &str {
        &self.name
    }

    async fn subscribe(&self) -> Result<PresenceSubscription, PresenceError> {
        if self.stall_subscribe {
            std::future::pending::<()>().await;
        }
        Ok(self.topic.tx.subscribe())
    }

    async fn track(&self, key: &str, meta: PresenceMeta) -> Result<(), PresenceError> {
        self.topic
            .members
            .write()
            .insert(key.to_string(), vec![meta.clone()]);
        self.tracked.lock().insert(key.to_string());
        self.topic.publish(PresenceEvent::Join {
            key: key.to_string(),
            new_presences: vec![meta],
        });
        Ok(())
    }

    async fn untrack(&self, key: &str) -> Result<(), PresenceError> {
        self.tracked.lock().remove(key);
        let left = self.topic.members.write().remove(key);
        if let Some(left_presences) = left {
            self.topic.publish(PresenceEvent::Leave {
                key: key.to_string(),
                left_presences,
            });
        }
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<(), PresenceError> {
        let keys: Vec<String> = self.tracked.lock().drain().collect();
        for key in keys {
            self.untrack(&key).await?;
        }
        Ok(())
    }

    async fn presence_state(&self) -> Result<PresenceState, PresenceError> {
        Ok(self.topic.members.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn track_and_untrack_are_broadcast() {
        let feed = InMemoryMembershipFeed::new();
        let room = RoomId::new("room");
        let channel = feed.join_channel(&room).await.unwrap();
        let mut rx = channel.subscribe().await.unwrap();

        channel
            .track("ana", PresenceMeta::new("ana", None, None))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().name(), "join");
        assert_eq!(channel.presence_state().await.unwrap().len(), 1);

        channel.untrack("ana").await.unwrap();
        assert_eq!(rx.recv().await.unwrap().name(), "leave");
        assert!(channel.presence_state().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let feed = InMemoryMembershipFeed::new();
        let one = feed.join_channel(&RoomId::new("one")).await.unwrap();
        let two = feed.join_channel(&RoomId::new("two")).await.unwrap();

        one.track("ana", PresenceMeta::new("ana", None, None))
            .await
            .unwrap();

        assert!(two.presence_state().await.unwrap().is_empty());
        assert_eq!(two.topic(), "presence:two");
    }

    #[tokio::test]
    async fn unsubscribe_untracks_own_keys_only() {
        let feed = InMemoryMembershipFeed::new();
        let room = RoomId::new("room");
        let mine = feed.join_channel(&room).await.unwrap();
        let theirs = feed.join_channel(&room).await.unwrap();
        mine.track("ana", PresenceMeta::new("ana", None, None))
            .await
            .unwrap();
        theirs
            .track("bob", PresenceMeta::new("bob", None, None))
            .await
            .unwrap();

        mine.unsubscribe().await.unwrap();

        let state = theirs.presence_state().await.unwrap();
        assert!(state.contains_key("bob"));
        assert!(!state.contains_key("ana"));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_feed_never_completes_subscribe() {
        let feed = InMemoryMembershipFeed::stalled();
        let channel = feed.join_channel(&RoomId::new("room")).await.unwrap();

        let result =
            tokio::time::timeout(std::time::Duration::from_secs(1), channel.subscribe()).await;
        assert!(result.is_err());
    }
}
