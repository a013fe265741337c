//! Connection registry: per-user live channel tracking and fan-out
//!
//! One registry instance per process, constructed explicitly and handed
//! to the API layer. State is in-memory only; on restart clients
//! reconnect and re-register.

use crate::error::{FrontpageError, Result};
use crate::notify::event::NotificationEvent;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifier for one registered channel
pub type ChannelId = Uuid;

/// A live output channel for one user session
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short label for logging ("sse", "push")
    fn kind(&self) -> &'static str;

    /// Write one event to the client
    ///
    /// An error means the channel is dead; the registry prunes it.
    async fn deliver(&self, event: &NotificationEvent) -> Result<()>;
}

/// SSE channel backed by a bounded in-process queue
///
/// The HTTP handler drains the receiver into the event stream. A full
/// queue counts as a failed delivery rather than blocking fan-out.
pub struct SseChannel {
    tx: mpsc::Sender<NotificationEvent>,
}

impl SseChannel {
    pub fn new(tx: mpsc::Sender<NotificationEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl NotificationChannel for SseChannel {
    fn kind(&self) -> &'static str {
        "sse"
    }

    async fn deliver(&self, event: &NotificationEvent) -> Result<()> {
        self.tx
            .try_send(event.clone())
            .map_err(|e| FrontpageError::ChannelClosed(e.to_string()))
    }
}

/// Browser push subscription object as registered by the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default)]
    pub keys: HashMap<String, String>,
}

/// Push channel delivering via the subscription's push service endpoint
///
/// Payload encryption is the push gateway's concern; this channel posts a
/// TTL-tagged wakeup and treats any non-2xx status as a dead subscription.
pub struct PushChannel {
    subscription: PushSubscription,
    client: reqwest::Client,
}

impl PushChannel {
    pub fn new(subscription: PushSubscription, client: reqwest::Client) -> Self {
        Self {
            subscription,
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.subscription.endpoint
    }
}

#[async_trait]
impl NotificationChannel for PushChannel {
    fn kind(&self) -> &'static str {
        "push"
    }

    async fn deliver(&self, event: &NotificationEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.subscription.endpoint)
            .header("TTL", "60")
            .json(event)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FrontpageError::ChannelClosed(format!(
                "push endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

struct RegisteredChannel {
    id: ChannelId,
    kind: &'static str,
    channel: Arc<dyn NotificationChannel>,
}

/// Outcome of one fan-out call
///
/// Callers can observe whether anyone actually received the event instead
/// of a bare ok/err.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Channels that accepted the event
    pub delivered: usize,
    /// Dead channels pruned during this call
    pub channels_removed: usize,
}

/// Process-wide registry of live connections, keyed by user id
#[derive(Default)]
pub struct ConnectionRegistry {
    channels: RwLock<HashMap<String, Vec<RegisteredChannel>>>,
    last_seen: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new channel for a user; existing channels are kept
    /// (multi-tab / multi-device)
    pub async fn add_connection(
        &self,
        user_id: &str,
        channel: Arc<dyn NotificationChannel>,
    ) -> ChannelId {
        let id = Uuid::new_v4();
        let kind = channel.kind();

        let mut channels = self.channels.write().await;
        channels
            .entry(user_id.to_string())
            .or_default()
            .push(RegisteredChannel { id, kind, channel });
        drop(channels);

        self.update_ping(user_id).await;
        debug!(user_id, channel_id = %id, kind, "connection registered");
        id
    }

    /// Deregister one channel; the user entry is cleared when it was the
    /// last one, so the map never grows with empty sets
    pub async fn remove_connection(&self, user_id: &str, channel_id: ChannelId) -> bool {
        let mut channels = self.channels.write().await;
        let Some(user_channels) = channels.get_mut(user_id) else {
            return false;
        };

        let before = user_channels.len();
        user_channels.retain(|registered| registered.id != channel_id);
        let removed = user_channels.len() < before;

        if user_channels.is_empty() {
            channels.remove(user_id);
            drop(channels);
            self.last_seen.write().await.remove(user_id);
        }

        if removed {
            debug!(user_id, channel_id = %channel_id, "connection removed");
        }
        removed
    }

    /// Fan one event out to every live channel of a user
    ///
    /// Channels are tried in insertion order. A failing channel is pruned
    /// and its error swallowed; remaining channels still receive the
    /// event. Zero registered channels is a silent no-op.
    pub async fn send_notification(
        &self,
        user_id: &str,
        event: &NotificationEvent,
    ) -> DeliveryReport {
        // Snapshot under the read lock; network writes happen outside it.
        let targets: Vec<(ChannelId, Arc<dyn NotificationChannel>)> = {
            let channels = self.channels.read().await;
            match channels.get(user_id) {
                Some(user_channels) => user_channels
                    .iter()
                    .map(|registered| (registered.id, registered.channel.clone()))
                    .collect(),
                None => {
                    debug!(user_id, kind = %event.kind, "no live connections, event dropped");
                    return DeliveryReport::default();
                }
            }
        };

        let mut report = DeliveryReport::default();
        let mut dead = Vec::new();

        for (channel_id, channel) in targets {
            match channel.deliver(event).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        user_id,
                        channel_id = %channel_id,
                        kind = channel.kind(),
                        "delivery failed, pruning channel: {}",
                        e
                    );
                    dead.push(channel_id);
                }
            }
        }

        for channel_id in dead {
            if self.remove_connection(user_id, channel_id).await {
                report.channels_removed += 1;
            }
        }

        report
    }

    /// Record last-seen liveness for a user's connections
    pub async fn update_ping(&self, user_id: &str) {
        let mut last_seen = self.last_seen.write().await;
        last_seen.insert(user_id.to_string(), Utc::now());
    }

    /// Drop stream channels of users whose last ping is older than `max_idle`
    ///
    /// Catches SSE connections whose close event never fired (abrupt
    /// network loss). Push subscriptions are exempt: they have no close
    /// event to miss and are pruned on failed delivery instead, so a user
    /// with only push channels stays registered across any idle period.
    /// Returns the number of channels removed.
    ///
    /// Lock order is `channels` before `last_seen`, as everywhere else in
    /// this type.
    pub async fn prune_stale(&self, max_idle: std::time::Duration) -> usize {
        let cutoff = Utc::now()
            - Duration::from_std(max_idle).unwrap_or_else(|_| Duration::seconds(120));

        let mut channels = self.channels.write().await;
        let mut last_seen = self.last_seen.write().await;

        let stale_users: Vec<String> = channels
            .keys()
            .filter(|user| match last_seen.get(*user) {
                Some(seen) => *seen < cutoff,
                None => true,
            })
            .cloned()
            .collect();

        let mut removed = 0;
        for user in &stale_users {
            if let Some(user_channels) = channels.get_mut(user) {
                let before = user_channels.len();
                user_channels.retain(|registered| registered.kind == "push");
                removed += before - user_channels.len();

                if user_channels.is_empty() {
                    channels.remove(user);
                    last_seen.remove(user);
                }
            }
        }

        if removed > 0 {
            debug!(removed, "pruned stale connections");
        }
        removed
    }

    /// Number of users with at least one live connection
    pub async fn user_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Total number of live channels across all users
    pub async fn connection_count(&self) -> usize {
        let channels = self.channels.read().await;
        channels.values().map(Vec::len).sum()
    }

    /// Drop all registry state (process shutdown)
    pub async fn shutdown(&self) {
        self.channels.write().await.clear();
        self.last_seen.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Channel that always fails, standing in for a disconnected client
    struct BrokenChannel;

    #[async_trait]
    impl NotificationChannel for BrokenChannel {
        fn kind(&self) -> &'static str {
            "broken"
        }

        async fn deliver(&self, _event: &NotificationEvent) -> Result<()> {
            Err(FrontpageError::ChannelClosed("gone".to_string()))
        }
    }

    fn sse_pair(capacity: usize) -> (Arc<SseChannel>, mpsc::Receiver<NotificationEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(SseChannel::new(tx)), rx)
    }

    #[tokio::test]
    async fn test_add_then_remove_clears_user_entry() {
        let registry = ConnectionRegistry::new();
        let (channel, _rx) = sse_pair(4);

        let id = registry.add_connection("alice", channel).await;
        assert_eq!(registry.user_count().await, 1);

        assert!(registry.remove_connection("alice", id).await);
        assert_eq!(registry.user_count().await, 0);
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_multiple_channels_per_user() {
        let registry = ConnectionRegistry::new();
        let (tab_one, mut rx_one) = sse_pair(4);
        let (tab_two, mut rx_two) = sse_pair(4);

        registry.add_connection("alice", tab_one).await;
        registry.add_connection("alice", tab_two).await;
        assert_eq!(registry.connection_count().await, 2);

        let report = registry
            .send_notification("alice", &NotificationEvent::follow("bob"))
            .await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.channels_removed, 0);

        assert_eq!(rx_one.recv().await.unwrap().kind, "follow");
        assert_eq!(rx_two.recv().await.unwrap().kind, "follow");
    }

    #[tokio::test]
    async fn test_send_to_unknown_user_is_silent_noop() {
        let registry = ConnectionRegistry::new();
        let report = registry
            .send_notification("nobody", &NotificationEvent::follow("bob"))
            .await;
        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test]
    async fn test_failing_channel_pruned_other_still_delivered() {
        let registry = ConnectionRegistry::new();
        let (healthy, mut rx) = sse_pair(4);

        registry.add_connection("alice", Arc::new(BrokenChannel)).await;
        registry.add_connection("alice", healthy).await;

        let report = registry
            .send_notification("alice", &NotificationEvent::like("art-1", "bob"))
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.channels_removed, 1);
        assert_eq!(registry.connection_count().await, 1);
        assert_eq!(rx.recv().await.unwrap().kind, "like");
    }

    #[tokio::test]
    async fn test_full_sse_queue_counts_as_dead() {
        let registry = ConnectionRegistry::new();
        let (channel, _rx) = sse_pair(1);
        registry.add_connection("alice", channel).await;

        let first = registry
            .send_notification("alice", &NotificationEvent::follow("bob"))
            .await;
        assert_eq!(first.delivered, 1);

        // Receiver never drains; the second send overflows and prunes.
        let second = registry
            .send_notification("alice", &NotificationEvent::follow("carol"))
            .await;
        assert_eq!(second.delivered, 0);
        assert_eq!(second.channels_removed, 1);
        assert_eq!(registry.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_prune_stale_removes_silent_users() {
        let registry = ConnectionRegistry::new();
        let (channel, _rx) = sse_pair(4);
        registry.add_connection("alice", channel).await;

        // Fresh ping: nothing to prune.
        assert_eq!(registry.prune_stale(std::time::Duration::from_secs(60)).await, 0);

        // Zero tolerance: everything is stale.
        assert_eq!(registry.prune_stale(std::time::Duration::from_secs(0)).await, 1);
        assert_eq!(registry.user_count().await, 0);
    }

    fn push_channel(endpoint: &str) -> Arc<PushChannel> {
        Arc::new(PushChannel::new(
            PushSubscription {
                endpoint: endpoint.to_string(),
                keys: HashMap::new(),
            },
            reqwest::Client::new(),
        ))
    }

    #[tokio::test]
    async fn test_push_subscriptions_survive_the_stale_sweep() {
        let registry = ConnectionRegistry::new();
        let (sse, _rx) = sse_pair(4);

        registry.add_connection("alice", sse).await;
        registry
            .add_connection("alice", push_channel("https://push.example/sub/a"))
            .await;

        // Zero tolerance: the silent SSE stream goes, the subscription stays.
        let removed = registry.prune_stale(std::time::Duration::from_secs(0)).await;
        assert_eq!(removed, 1);
        assert_eq!(registry.user_count().await, 1);
        assert_eq!(registry.connection_count().await, 1);

        // A push-only user is never swept, no matter how long idle.
        let removed = registry.prune_stale(std::time::Duration::from_secs(0)).await;
        assert_eq!(removed, 0);
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_complete() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (channel, _rx) = sse_pair(4);
        registry.add_connection("alice", channel).await;

        let a = registry.clone();
        let b = registry.clone();
        let (removed_a, removed_b) = tokio::join!(
            async move { a.prune_stale(std::time::Duration::from_secs(0)).await },
            async move { b.prune_stale(std::time::Duration::from_secs(0)).await },
        );

        assert_eq!(removed_a + removed_b, 1);
        assert_eq!(registry.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_push_delivery_posts_event_and_prunes_dead_endpoint() {
        use axum::extract::State;
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::post;
        use axum::{Json, Router};
        use serde_json::Value;

        let (seen_tx, mut seen_rx) = mpsc::channel::<(HeaderMap, Value)>(4);

        let app = Router::new()
            .route(
                "/wakeup",
                post(
                    |State(tx): State<mpsc::Sender<(HeaderMap, Value)>>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        let _ = tx.send((headers, body)).await;
                        StatusCode::CREATED
                    },
                ),
            )
            .route("/gone", post(|| async { StatusCode::GONE }))
            .with_state(seen_tx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let registry = ConnectionRegistry::new();
        registry
            .add_connection("alice", push_channel(&format!("http://{}/wakeup", addr)))
            .await;
        registry
            .add_connection("alice", push_channel(&format!("http://{}/gone", addr)))
            .await;

        let report = registry
            .send_notification("alice", &NotificationEvent::follow("bob"))
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.channels_removed, 1);
        assert_eq!(registry.connection_count().await, 1);

        let (headers, body) = seen_rx.recv().await.unwrap();
        assert_eq!(headers.get("TTL").unwrap(), "60");
        assert_eq!(body["type"], "follow");
    }

    #[tokio::test]
    async fn test_shutdown_clears_everything() {
        let registry = ConnectionRegistry::new();
        let (channel, _rx) = sse_pair(4);
        registry.add_connection("alice", channel).await;

        registry.shutdown().await;
        assert_eq!(registry.user_count().await, 0);
        assert_eq!(registry.connection_count().await, 0);
    }
}
