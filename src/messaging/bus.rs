use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::routing::RoutingKey;
use super::Result;

/// Per-publish options; unset fields are filled in by the bus
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub message_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Transport metadata delivered alongside every payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMetadata {
    pub message_id: String,
    pub exchange: String,
    pub routing_key: RoutingKey,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: Bytes,
    pub metadata: MessageMetadata,
}

/// Stream of deliveries for one routing key
pub struct Subscription {
    routing_key: RoutingKey,
    receiver: mpsc::Receiver<Delivery>,
}

impl Subscription {
    pub fn routing_key(&self) -> RoutingKey {
        self.routing_key
    }

    /// Next delivery, `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

/// Message bus contract used by the producer and the consumer runtime
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Fire-and-forget publish; the caller never waits for a consumer
    async fn publish(
        &self,
        exchange: &str,
        routing_key: RoutingKey,
        payload: Bytes,
        options: PublishOptions,
    ) -> Result<()>;

    async fn subscribe(&self, routing_key: RoutingKey) -> Result<Subscription>;

    async fn health(&self) -> bool;
}

/// Single-process bus over bounded tokio channels
///
/// Subscribers of the same routing key share deliveries round-robin, like
/// competing consumers on one queue. A publish nobody listens to is logged
/// and dropped.
pub struct InProcessBus {
    subscribers: RwLock<HashMap<RoutingKey, Vec<mpsc::Sender<Delivery>>>>,
    next_subscriber: AtomicUsize,
    channel_capacity: usize,
}

impl InProcessBus {
    pub fn new(channel_capacity: usize) -> Self {
        info!(channel_capacity, "Creating in-process message bus");
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_subscriber: AtomicUsize::new(0),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Number of live subscribers for `routing_key`
    pub async fn subscriber_count(&self, routing_key: RoutingKey) -> usize {
        self.subscribers
            .read()
            .await
            .get(&routing_key)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    async fn pick_subscriber(&self, routing_key: RoutingKey) -> Option<mpsc::Sender<Delivery>> {
        let mut subscribers = self.subscribers.write().await;
        let senders = subscribers.get_mut(&routing_key)?;
        senders.retain(|tx| !tx.is_closed());
        if senders.is_empty() {
            return None;
        }
        let idx = self.next_subscriber.fetch_add(1, Ordering::Relaxed) % senders.len();
        Some(senders[idx].clone())
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl MessageBus for InProcessBus {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: RoutingKey,
        payload: Bytes,
        options: PublishOptions,
    ) -> Result<()> {
        let metadata = MessageMetadata {
            message_id: options
                .message_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            exchange: exchange.to_string(),
            routing_key,
            timestamp: options.timestamp.unwrap_or_else(Utc::now),
        };

        let Some(sender) = self.pick_subscriber(routing_key).await else {
            warn!(%routing_key, exchange, "No subscriber for routing key, message dropped");
            return Ok(());
        };

        let message_id = metadata.message_id.clone();
        match sender.try_send(Delivery { payload, metadata }) {
            Ok(()) => {
                debug!(%routing_key, %message_id, "Message delivered");
                Ok(())
            }
            Err(TrySendError::Full(delivery)) => {
                // The publisher never waits on a slow subscriber
                warn!(%routing_key, %message_id, "Subscriber queue full, delivering in background");
                tokio::spawn(async move {
                    if sender.send(delivery).await.is_err() {
                        warn!(%routing_key, %message_id, "Subscriber closed, message dropped");
                    }
                });
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                warn!(%routing_key, %message_id, "Subscriber closed, message dropped");
                Ok(())
            }
        }
    }

    async fn subscribe(&self, routing_key: RoutingKey) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        self.subscribers
            .write()
            .await
            .entry(routing_key)
            .or_default()
            .push(tx);

        debug!(%routing_key, "Subscribed");
        Ok(Subscription {
            routing_key,
            receiver: rx,
        })
    }

    async fn health(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscriber_is_dropped() {
        let bus = InProcessBus::new(4);
        let result = bus
            .publish(
                "General",
                RoutingKey::UserUser,
                Bytes::from_static(b"{}"),
                PublishOptions::default(),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_delivery_carries_metadata() {
        let bus = InProcessBus::new(4);
        let mut sub = bus.subscribe(RoutingKey::TaskStatus).await.unwrap();

        bus.publish(
            "General",
            RoutingKey::TaskStatus,
            Bytes::from_static(b"{\"a\":1}"),
            PublishOptions {
                message_id: Some("m-1".to_string()),
                timestamp: None,
            },
        )
        .await
        .unwrap();

        let delivery = sub.recv().await.unwrap();
        assert_eq!(delivery.payload, Bytes::from_static(b"{\"a\":1}"));
        assert_eq!(delivery.metadata.message_id, "m-1");
        assert_eq!(delivery.metadata.exchange, "General");
        assert_eq!(delivery.metadata.routing_key, RoutingKey::TaskStatus);
    }

    #[tokio::test]
    async fn test_round_robin_between_subscribers() {
        let bus = InProcessBus::new(4);
        let mut first = bus.subscribe(RoutingKey::TaskMode).await.unwrap();
        let mut second = bus.subscribe(RoutingKey::TaskMode).await.unwrap();
        assert_eq!(bus.subscriber_count(RoutingKey::TaskMode).await, 2);

        for _ in 0..2 {
            bus.publish(
                "General",
                RoutingKey::TaskMode,
                Bytes::from_static(b"{}"),
                PublishOptions::default(),
            )
            .await
            .unwrap();
        }

        assert!(first.recv().await.is_some());
        assert!(second.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_full_subscriber_queue_does_not_block_publisher() {
        let bus = InProcessBus::new(1);
        let mut sub = bus.subscribe(RoutingKey::TaskStatus).await.unwrap();

        for id in ["m-1", "m-2", "m-3"] {
            let publish = bus.publish(
                "General",
                RoutingKey::TaskStatus,
                Bytes::from_static(b"{}"),
                PublishOptions {
                    message_id: Some(id.to_string()),
                    timestamp: None,
                },
            );
            tokio::time::timeout(std::time::Duration::from_millis(200), publish)
                .await
                .expect("publish blocked on a full queue")
                .unwrap();
        }

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(sub.recv().await.unwrap().metadata.message_id);
        }
        received.sort();
        assert_eq!(received, vec!["m-1", "m-2", "m-3"]);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let bus = InProcessBus::new(4);
        let sub = bus.subscribe(RoutingKey::UserUser).await.unwrap();
        drop(sub);

        bus.publish(
            "General",
            RoutingKey::UserUser,
            Bytes::from_static(b"{}"),
            PublishOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(bus.subscriber_count(RoutingKey::UserUser).await, 0);
    }
}
