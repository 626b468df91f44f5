use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::observability::Metrics;

use super::bus::{MessageBus, PublishOptions};
use super::routing::RoutingKey;
use super::schema::SchemaRegistry;
use super::{MessagingError, Result};

/// Outbound side of the bus
///
/// [`publish`](Self::publish) trusts the caller; [`send_message`](Self::send_message)
/// validates against the schema registry and stamps the publish time first.
#[derive(Clone)]
pub struct MessageProducer {
    bus: Arc<dyn MessageBus>,
    registry: Arc<SchemaRegistry>,
    exchange: String,
    metrics: Arc<Metrics>,
}

impl MessageProducer {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        registry: Arc<SchemaRegistry>,
        exchange: impl Into<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            bus,
            registry,
            exchange: exchange.into(),
            metrics,
        }
    }

    /// Default exchange for this producer
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Publish without validation
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        exchange: &str,
        routing_key: RoutingKey,
        message: &T,
    ) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.publish_bytes(exchange, routing_key, Bytes::from(payload), PublishOptions::default())
            .await
    }

    /// Validate against the registry, stamp the publish time, then publish
    ///
    /// A routing key without a registry entry is a programming error and
    /// never reaches the bus.
    pub async fn send_message<T: Serialize + ?Sized>(
        &self,
        exchange: &str,
        routing_key: RoutingKey,
        message: &T,
    ) -> Result<()> {
        if !self.registry.contains(routing_key) {
            return Err(MessagingError::MissingSchema(routing_key));
        }

        let value = self.registry.validate(routing_key, serde_json::to_value(message)?)?;
        let payload = serde_json::to_vec(&value)?;

        let options = PublishOptions {
            message_id: Some(Uuid::new_v4().to_string()),
            timestamp: Some(Utc::now()),
        };
        self.publish_bytes(exchange, routing_key, Bytes::from(payload), options)
            .await
    }

    /// [`send_message`](Self::send_message) on the default exchange
    pub async fn send<T: Serialize + ?Sized>(&self, routing_key: RoutingKey, message: &T) -> Result<()> {
        self.send_message(&self.exchange, routing_key, message).await
    }

    async fn publish_bytes(
        &self,
        exchange: &str,
        routing_key: RoutingKey,
        payload: Bytes,
        options: PublishOptions,
    ) -> Result<()> {
        let size = payload.len();
        self.bus
            .publish(exchange, routing_key, payload, options)
            .await?;
        self.metrics.message_published();
        debug!(%routing_key, exchange, size, "Message published");
        Ok(())
    }
}
