// Gift notifications
//
// Fire-and-forget delivery of award events. The engine emits one
// `GiftAwarded` event per newly created reservation; delivery failures are
// logged and counted, never surfaced to the order evaluation.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::PromotionConfig;
use crate::error::{PResult, PromotionError};

/// Payload of a gift award
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftAwardedEvent {
    pub gift_id: Uuid,
    pub order_id: String,
}

/// Events published by the promotions engine
///
/// Serialized with a `type` tag, e.g.
/// `{"type":"GiftAwarded","giftId":"…","orderId":"…"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PromotionEvent {
    GiftAwarded(GiftAwardedEvent),
}

impl PromotionEvent {
    pub fn gift_awarded(gift_id: Uuid, order_id: impl Into<String>) -> Self {
        PromotionEvent::GiftAwarded(GiftAwardedEvent {
            gift_id,
            order_id: order_id.into(),
        })
    }
}

/// Receiver of promotion events
#[async_trait]
pub trait GiftNotifier: Send + Sync {
    async fn notify(&self, event: &PromotionEvent) -> PResult<()>;
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl GiftNotifier for NoopNotifier {
    async fn notify(&self, event: &PromotionEvent) -> PResult<()> {
        tracing::trace!("Dropping promotion event {:?}", event);
        Ok(())
    }
}

/// Hands events to an in-process consumer over a bounded channel
///
/// Never waits for capacity: a full or closed channel is a delivery failure.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<PromotionEvent>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::Sender<PromotionEvent>) -> Self {
        Self { sender }
    }

    /// Notifier plus the receiving end of a channel with `capacity` slots
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PromotionEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl GiftNotifier for ChannelNotifier {
    async fn notify(&self, event: &PromotionEvent) -> PResult<()> {
        self.sender
            .try_send(event.clone())
            .map_err(|e| PromotionError::Notification(e.to_string()))
    }
}

/// Publishes events as JSON on a Redis pub/sub channel
pub struct RedisNotifier {
    conn: ConnectionManager,
    channel: String,
}

impl RedisNotifier {
    /// Connect to Redis and publish on `channel`
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., redis://localhost:6379)
    /// * `channel` - Pub/sub channel name
    pub async fn connect(url: &str, channel: impl Into<String>) -> PResult<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        let channel = channel.into();

        tracing::info!("Connected to Redis for gift events on channel {}", channel);

        Ok(Self { conn, channel })
    }

    /// Connect using `redis_url` and `gift_events_channel`
    ///
    /// Returns `None` when no Redis URL is configured.
    pub async fn from_config(config: &PromotionConfig) -> PResult<Option<Self>> {
        match config.redis_url.as_deref() {
            Some(url) => {
                let notifier = Self::connect(url, config.gift_events_channel.clone()).await?;
                Ok(Some(notifier))
            }
            None => Ok(None),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// Notifier selected by configuration: Redis when `redis_url` is set, otherwise no-op
pub async fn notifier_from_config(config: &PromotionConfig) -> PResult<Arc<dyn GiftNotifier>> {
    match RedisNotifier::from_config(config).await? {
        Some(notifier) => Ok(Arc::new(notifier)),
        None => {
            tracing::info!("REDIS_URL not set; gift events will not be published");
            Ok(Arc::new(NoopNotifier))
        }
    }
}

#[async_trait]
impl GiftNotifier for RedisNotifier {
    async fn notify(&self, event: &PromotionEvent) -> PResult<()> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();

        let receivers: i64 = conn.publish(&self.channel, payload).await?;
        tracing::debug!(
            "Published promotion event to {} ({} receivers)",
            self.channel,
            receivers
        );
        Ok(())
    }
}
