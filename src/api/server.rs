//! HTTP API server with SSE support
//!
//! Sits behind the platform's session-terminating proxy: the proxy
//! resolves the session and forwards the user identity in a header.
//! Internal endpoints (dispatch, job trigger, content creation) require
//! the shared secret from config instead.

use crate::cache::{TagCache, FRONTPAGE_TAG};
use crate::config::ApiConfig;
use crate::error::{FrontpageError, Result};
use crate::jobs::{ProminenceRescorer, RescoreOutcome};
use crate::notify::{
    ChannelId, ConnectionRegistry, DeliveryReport, NotificationEvent, PushChannel,
    PushSubscription, SseChannel,
};
use crate::storage::ContentStore;
use crate::types::{ContentDraft, ContentItem};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt as _};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

/// Header carrying the authenticated user id, injected by the proxy
const USER_HEADER: &str = "x-frontpage-user";

/// Header carrying the shared secret for internal callers
const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// Items in the cached frontpage listing
const FRONTPAGE_LIMIT: usize = 50;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: Arc<ConnectionRegistry>,
    pub store: Arc<dyn ContentStore>,
    pub cache: Arc<TagCache>,
    pub rescorer: Arc<ProminenceRescorer>,
    /// Scoring table used for creation-time initial scores
    pub scoring: crate::config::ScoringConfig,
    /// Shared client for push deliveries
    pub push_client: reqwest::Client,
}

/// API server
pub struct ApiServer {
    state: AppState,
    /// Shutdown signal for background tasks
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
    /// Stale-connection sweep handle for cleanup
    sweep_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(
        config: ApiConfig,
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn ContentStore>,
        cache: Arc<TagCache>,
        rescorer: Arc<ProminenceRescorer>,
        scoring: crate::config::ScoringConfig,
    ) -> Self {
        let state = AppState {
            config,
            registry,
            store,
            cache,
            rescorer,
            scoring,
            push_client: reqwest::Client::new(),
        };

        let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

        Self {
            state,
            shutdown_tx,
            sweep_handle: None,
        }
    }

    /// Build router
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            // Live connections
            .route("/notifications/stream", get(stream_handler))
            .route("/notifications/ping", post(ping_handler))
            .route("/notifications/send", post(send_notification_handler))
            // Push subscriptions
            .route("/push/subscriptions", post(subscribe_push_handler))
            .route("/push/subscriptions/:id", delete(unsubscribe_push_handler))
            // Scoring
            .route("/jobs/rescore", post(rescore_handler))
            .route("/content", post(create_content_handler))
            .route("/frontpage", get(frontpage_handler))
            // Health check
            .route("/health", get(health_handler))
            // State
            .with_state(state)
            // Middleware
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Start serving
    ///
    /// Spawns the stale-connection sweep, binds the configured address and
    /// runs until the listener fails or the process exits.
    pub async fn serve(mut self) -> anyhow::Result<()> {
        let state = self.state.clone();
        let router = Self::build_router(state.clone());

        // Sweep connections whose close event never fired
        let registry = state.registry.clone();
        let stale_after = state.config.stale_after;
        let sweep_interval = state.config.sweep_interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let sweep_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let pruned = registry.prune_stale(stale_after).await;
                        if pruned > 0 {
                            debug!(pruned, "stale connection sweep");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Sweep task received shutdown signal");
                        break;
                    }
                }
            }
        });
        self.sweep_handle = Some(sweep_handle);

        let listener = tokio::net::TcpListener::bind(self.state.config.addr).await?;
        info!("API server listening on http://{}", self.state.config.addr);
        axum::serve(listener, router).await?;
        Ok(())
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.sweep_handle.take() {
            handle.abort();
            debug!("ApiServer dropped - sweep task aborted");
        }
    }
}

/// Resolve the authenticated user from the proxy-injected header
fn require_user(headers: &HeaderMap) -> Result<String> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| FrontpageError::Unauthorized("missing authenticated user".to_string()))
}

/// Check the shared secret on internal endpoints
///
/// A deployment without a configured token leaves these endpoints open;
/// production configs must set `api.internal_token`.
fn require_internal(headers: &HeaderMap, config: &ApiConfig) -> Result<()> {
    let Some(expected) = &config.internal_token else {
        return Ok(());
    };

    let presented = headers
        .get(INTERNAL_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    if presented == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(FrontpageError::Unauthorized(
            "missing or invalid internal token".to_string(),
        ))
    }
}

/// Removes the SSE channel from the registry when the stream is dropped
struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    user_id: String,
    channel_id: ChannelId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let registry = self.registry.clone();
        let user_id = self.user_id.clone();
        let channel_id = self.channel_id;
        tokio::spawn(async move {
            registry.remove_connection(&user_id, channel_id).await;
        });
    }
}

/// SSE stream handler
///
/// Registers a live channel for the authenticated user and streams
/// notification events until the client disconnects.
async fn stream_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl tokio_stream::Stream<Item = std::result::Result<SseEvent, Infallible>>>> {
    let user_id = require_user(&headers)?;

    let (tx, rx) = tokio::sync::mpsc::channel(state.config.event_capacity);
    let channel_id = state
        .registry
        .add_connection(&user_id, Arc::new(SseChannel::new(tx)))
        .await;

    debug!(user_id, channel_id = %channel_id, "SSE client connected");

    let guard = ConnectionGuard {
        registry: state.registry.clone(),
        user_id,
        channel_id,
    };

    let stream = ReceiverStream::new(rx).map(move |event| {
        let _keep_alive = &guard;
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(SseEvent::default().data(data).id(event.id))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Liveness ping handler
async fn ping_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let user_id = require_user(&headers)?;
    state.registry.update_ping(&user_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Incoming notification body (id and timestamp are server-assigned)
#[derive(Debug, Deserialize)]
struct IncomingNotification {
    #[serde(rename = "type")]
    kind: String,
    message: String,
    #[serde(flatten, default)]
    data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SendNotificationRequest {
    user_id: Option<String>,
    notification: Option<IncomingNotification>,
}

/// Notification dispatch handler
///
/// Best-effort relay: looks up the target's live connections and writes
/// to each. No retry, no queue; the delivery report tells the caller
/// whether anyone was reached.
async fn send_notification_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendNotificationRequest>,
) -> Result<Json<DeliveryReport>> {
    require_internal(&headers, &state.config)?;

    let user_id = req
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| FrontpageError::Validation("user_id is required".to_string()))?;
    let notification = req
        .notification
        .ok_or_else(|| FrontpageError::Validation("notification is required".to_string()))?;

    let mut event = NotificationEvent::new(notification.kind, notification.message);
    event.data = notification.data;

    let report = state.registry.send_notification(&user_id, &event).await;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
struct SubscribeResponse {
    channel_id: ChannelId,
}

/// Push subscription handler
///
/// Registers the browser subscription as a live channel. Subscriptions
/// are per-process and in-memory; clients re-register after a restart.
async fn subscribe_push_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(subscription): Json<PushSubscription>,
) -> Result<(StatusCode, Json<SubscribeResponse>)> {
    let user_id = require_user(&headers)?;

    if subscription.endpoint.is_empty() {
        return Err(FrontpageError::Validation(
            "subscription endpoint is required".to_string(),
        ));
    }

    let channel = PushChannel::new(subscription, state.push_client.clone());
    let channel_id = state.registry.add_connection(&user_id, Arc::new(channel)).await;

    Ok((StatusCode::CREATED, Json(SubscribeResponse { channel_id })))
}

/// Push unsubscribe handler
async fn unsubscribe_push_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(channel_id): Path<ChannelId>,
) -> Result<StatusCode> {
    let user_id = require_user(&headers)?;

    if state.registry.remove_connection(&user_id, channel_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(FrontpageError::ContentNotFound(format!(
            "no channel {} for user",
            channel_id
        )))
    }
}

/// Rescore trigger handler, called by the external scheduler (cron)
async fn rescore_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RescoreOutcome>> {
    require_internal(&headers, &state.config)?;

    let outcome = state.rescorer.recalculate_recent(Utc::now()).await?;
    Ok(Json(outcome))
}

/// Content creation handler
///
/// Applies the creation-time scoring: base authorship weight times
/// richness multipliers, decayed from `published_at` if backdated.
async fn create_content_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<ContentDraft>,
) -> Result<(StatusCode, Json<ContentItem>)> {
    require_internal(&headers, &state.config)?;

    if draft.title.trim().is_empty() {
        return Err(FrontpageError::Validation("title is required".to_string()));
    }

    let now = Utc::now();
    let initial =
        crate::scoring::initial_score(draft.source_type, &draft.richness, &state.scoring);

    let mut item = ContentItem {
        id: crate::types::ContentId::new(),
        title: draft.title,
        source_type: draft.source_type,
        initial_score: initial,
        prominence_score: initial,
        published_at: draft.published_at.unwrap_or(now),
        richness: draft.richness,
    };
    item.prominence_score = crate::scoring::compute_prominence(&item, now, &state.scoring);

    state.store.insert_content(&item).await?;
    state.cache.invalidate(FRONTPAGE_TAG).await;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Ranked frontpage listing, served from cache when warm
async fn frontpage_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    if let Some(cached) = state.cache.get(FRONTPAGE_TAG).await {
        debug!("frontpage served from cache");
        return Ok(Json(cached));
    }

    let ranked = state.store.list_ranked(FRONTPAGE_LIMIT).await?;
    let payload = serde_json::to_value(&ranked)?;
    state.cache.put(FRONTPAGE_TAG, payload.clone()).await;

    Ok(Json(payload))
}

/// Health check handler
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    connected_users: usize,
    live_connections: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connected_users: state.registry.user_count().await,
        live_connections: state.registry.connection_count().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RescoreConfig, ScoringConfig};
    use crate::scoring::{NoveltyDetector, NullSimilarity};
    use crate::storage::libsql::{ConnectionMode, LibsqlContentStore};

    async fn test_state(internal_token: Option<&str>) -> AppState {
        let store: Arc<dyn ContentStore> = Arc::new(
            LibsqlContentStore::new(ConnectionMode::InMemory).await.unwrap(),
        );
        let cache = Arc::new(TagCache::new());
        let scoring = ScoringConfig::default();
        let novelty = NoveltyDetector::new(Arc::new(NullSimilarity), &scoring);
        let rescorer = Arc::new(ProminenceRescorer::new(
            store.clone(),
            cache.clone(),
            novelty,
            scoring.clone(),
            RescoreConfig::default(),
        ));

        let config = ApiConfig {
            internal_token: internal_token.map(str::to_string),
            ..ApiConfig::default()
        };

        AppState {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            store,
            cache,
            rescorer,
            scoring,
            push_client: reqwest::Client::new(),
        }
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = test_state(None).await;
        let response = health_handler(State(state)).await;
        assert_eq!(response.0.status, "ok");
        assert_eq!(response.0.live_connections, 0);
    }

    #[tokio::test]
    async fn test_require_user_rejects_missing_header() {
        let headers = HeaderMap::new();
        assert!(matches!(
            require_user(&headers),
            Err(FrontpageError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_require_internal_token_match() {
        let state = test_state(Some("secret")).await;

        let mut headers = HeaderMap::new();
        assert!(require_internal(&headers, &state.config).is_err());

        headers.insert(INTERNAL_TOKEN_HEADER, "wrong".parse().unwrap());
        assert!(require_internal(&headers, &state.config).is_err());

        headers.insert(INTERNAL_TOKEN_HEADER, "secret".parse().unwrap());
        assert!(require_internal(&headers, &state.config).is_ok());
    }

    #[tokio::test]
    async fn test_send_notification_validates_fields() {
        let state = test_state(None).await;

        let result = send_notification_handler(
            State(state),
            HeaderMap::new(),
            Json(SendNotificationRequest {
                user_id: None,
                notification: None,
            }),
        )
        .await;

        assert!(matches!(result, Err(FrontpageError::Validation(_))));
    }

    #[tokio::test]
    async fn test_send_notification_without_connections_delivers_to_nobody() {
        let state = test_state(None).await;

        let report = send_notification_handler(
            State(state),
            HeaderMap::new(),
            Json(SendNotificationRequest {
                user_id: Some("alice".to_string()),
                notification: Some(IncomingNotification {
                    kind: "follow".to_string(),
                    message: "bob started following you".to_string(),
                    data: Map::new(),
                }),
            }),
        )
        .await
        .unwrap();

        assert_eq!(report.0.delivered, 0);
        assert_eq!(report.0.channels_removed, 0);
    }
}
