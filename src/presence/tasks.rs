//! Background presence tasks owned by a room session.

use super::error::PresenceError;
use super::event::PresenceEvent;
use super::feed::{PresenceChannel, PresenceSubscription};
use super::synchronizer::PresenceSynchronizer;
use crate::core::RoomId;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument};

const LOG_TARGET: &str = "codenames_core::presence";

/// Spawn a Tokio task inside a span carrying its name.
pub fn spawn_named_task<F, S>(name: S, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Into<String>,
{
    let name_owned = name.into();
    let span = tracing::info_span!("task", task_name = %name_owned);
    tokio::spawn(future.instrument(span))
}

/// Subscribe to the channel, failing with `Timeout` if the handshake stalls.
pub async fn subscribe_with_timeout(
    channel: &dyn PresenceChannel,
    limit: Duration,
) -> Result<PresenceSubscription, PresenceError> {
    match timeout(limit, channel.subscribe()).await {
        Ok(result) => result,
        Err(_) => Err(PresenceError::Timeout(limit)),
    }
}

/// Fetch the channel's full membership and merge it as a sync.
pub async fn resync(
    channel: &dyn PresenceChannel,
    sync: &RwLock<PresenceSynchronizer>,
) -> Result<(), PresenceError> {
    let state = channel.presence_state().await?;
    sync.write().apply(&PresenceEvent::Sync { state })
}

/// Apply feed events to the synchronizer until cancelled or the feed closes.
///
/// Errors never end the loop: malformed events are logged and dropped, and a
/// lagged receiver resynchronizes from the channel's presence state.
pub fn spawn_presence_listener(
    room_id: RoomId,
    channel: Arc<dyn PresenceChannel>,
    mut events: PresenceSubscription,
    sync: Arc<RwLock<PresenceSynchronizer>>,
    token: CancellationToken,
) -> JoinHandle<()> {
    spawn_named_task(format!("presence-listener:{room_id}"), async move {
        loop {
            let received = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                received = events.recv() => received,
            };

            match received {
                Ok(event) => {
                    let name = event.name();
                    if let Err(err) = sync.write().apply(&event) {
                        warn!(target: LOG_TARGET, room = %room_id, event = name, error = %err, "presence event dropped");
                    } else {
                        debug!(target: LOG_TARGET, room = %room_id, event = name, "presence event applied");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: LOG_TARGET, room = %room_id, skipped, "presence listener lagged; resyncing");
                    if let Err(err) = resync(channel.as_ref(), &sync).await {
                        warn!(target: LOG_TARGET, room = %room_id, error = %err, "presence resync failed");
                    }
                }
                Err(RecvError::Closed) => {
                    debug!(target: LOG_TARGET, room = %room_id, "presence feed closed");
                    break;
                }
            }
        }
    })
}

/// Re-announce the local presence every `period` until cancelled.
///
/// A missed tick is delayed rather than bursted, so a slow feed sees at
/// most one announcement per period.
pub fn spawn_heartbeat(
    room_id: RoomId,
    channel: Arc<dyn PresenceChannel>,
    sync: Arc<RwLock<PresenceSynchronizer>>,
    period: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    spawn_named_task(format!("presence-heartbeat:{room_id}"), async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let (key, meta) = {
                let sync = sync.read();
                (sync.local().username.clone(), sync.local_meta())
            };
            match channel.track(&key, meta).await {
                Ok(()) => debug!(target: LOG_TARGET, room = %room_id, user = %key, "presence heartbeat"),
                Err(err) => {
                    warn!(target: LOG_TARGET, room = %room_id, user = %key, error = %err, "presence heartbeat failed")
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Role, Team};
    use crate::presence::event::PresenceMeta;
    use crate::presence::feed::{InMemoryMembershipFeed, MembershipFeed};

    async fn channel(feed: &InMemoryMembershipFeed) -> Arc<dyn PresenceChannel> {
        feed.join_channel(&RoomId::new("room")).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_times_out_on_stalled_feed() {
        let feed = InMemoryMembershipFeed::stalled();
        let channel = channel(&feed).await;

        let result = subscribe_with_timeout(channel.as_ref(), Duration::from_secs(10)).await;
        assert_eq!(
            result.err(),
            Some(PresenceError::Timeout(Duration::from_secs(10)))
        );
    }

    #[tokio::test]
    async fn listener_survives_malformed_events() {
        let feed = InMemoryMembershipFeed::new();
        let channel = channel(&feed).await;
        let events = channel.subscribe().await.unwrap();
        let mut probe = channel.subscribe().await.unwrap();
        let sync = Arc::new(RwLock::new(PresenceSynchronizer::new("me")));
        let token = CancellationToken::new();
        let handle = spawn_presence_listener(
            RoomId::new("room"),
            channel.clone(),
            events,
            sync.clone(),
            token.clone(),
        );

        feed.inject(
            &RoomId::new("room"),
            PresenceEvent::Join {
                key: "bad".into(),
                new_presences: vec![PresenceMeta::new("", None, None)],
            },
        );
        channel
            .track("ana", PresenceMeta::new("ana", Some(Team::Red), Some(Role::Spymaster)))
            .await
            .unwrap();
        probe.recv().await.unwrap();
        probe.recv().await.unwrap();

        for _ in 0..50 {
            if sync.read().entry("ana").is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(sync.read().entry("ana").map_or(false, |entry| entry.online));

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_retracks_every_period_until_cancelled() {
        let feed = InMemoryMembershipFeed::new();
        let channel = channel(&feed).await;
        let mut probe = channel.subscribe().await.unwrap();
        let sync = Arc::new(RwLock::new(PresenceSynchronizer::new("me")));
        sync.write().assign_local(Some(Team::Blue), Some(Role::Operative));
        let token = CancellationToken::new();
        let handle = spawn_heartbeat(
            RoomId::new("room"),
            channel.clone(),
            sync,
            Duration::from_secs(5),
            token.clone(),
        );

        for _ in 0..2 {
            match probe.recv().await.unwrap() {
                PresenceEvent::Join { key, new_presences } => {
                    assert_eq!(key, "me");
                    assert_eq!(new_presences[0].team, Some(Team::Blue));
                }
                other => panic!("Expected join, got {other:?}"),
            }
        }

        token.cancel();
        handle.await.unwrap();
        assert!(probe.try_recv().is_err());
    }
}
