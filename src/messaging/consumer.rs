//! Subscription loops feeding inbound messages to the handler registry
//!
//! One loop per routing key with a registered handler. A delivery is decoded,
//! validated against the schema registry, then dispatched. Failures go to the
//! error hook and the loop moves on to the next delivery.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::handlers::{HandlerError, HandlerRegistry};
use crate::observability::Metrics;

use super::bus::{Delivery, MessageBus, MessageMetadata};
use super::routing::RoutingKey;
use super::schema::{SchemaError, SchemaRegistry};
use super::Result;

#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("payload is not JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("no handler registered for {0}")]
    NoHandler(RoutingKey),
}

/// Called for every delivery that could not be applied
pub type ErrorHook = Arc<dyn Fn(RoutingKey, &MessageMetadata, &ConsumeError) + Send + Sync>;

fn log_error(routing_key: RoutingKey, metadata: &MessageMetadata, err: &ConsumeError) {
    error!(
        %routing_key,
        message_id = %metadata.message_id,
        error = %err,
        "Inbound message rejected"
    );
}

#[derive(Clone)]
pub struct MessageConsumer {
    registry: Arc<SchemaRegistry>,
    handlers: Arc<HandlerRegistry>,
    prefetch: usize,
    metrics: Arc<Metrics>,
    on_error: ErrorHook,
}

impl MessageConsumer {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        handlers: Arc<HandlerRegistry>,
        prefetch: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            handlers,
            prefetch: prefetch.max(1),
            metrics,
            on_error: Arc::new(log_error),
        }
    }

    /// Replace the default `error!` log hook
    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.on_error = hook;
        self
    }

    /// Subscribe every handled routing key and start its loop
    pub async fn spawn(self, bus: Arc<dyn MessageBus>) -> Result<ConsumerHandle> {
        let consumer = Arc::new(self);
        let mut tasks = Vec::new();

        for routing_key in consumer.handlers.routing_keys() {
            let mut subscription = bus.subscribe(routing_key).await?;
            let consumer = consumer.clone();
            let semaphore = Arc::new(Semaphore::new(consumer.prefetch));

            tasks.push(tokio::spawn(async move {
                while let Some(delivery) = subscription.recv().await {
                    let Ok(permit) = semaphore.clone().acquire_owned().await else {
                        break;
                    };
                    let consumer = consumer.clone();
                    tokio::spawn(async move {
                        consumer.dispatch(delivery).await;
                        drop(permit);
                    });
                }
                debug!(%routing_key, "Subscription closed");
            }));
        }

        info!(
            subscriptions = tasks.len(),
            prefetch = consumer.prefetch,
            "Message consumer started"
        );
        Ok(ConsumerHandle { tasks })
    }

    async fn dispatch(&self, delivery: Delivery) {
        let metadata = delivery.metadata;
        match self.process(&delivery.payload, &metadata).await {
            Ok(()) => self.metrics.message_consumed(),
            Err(err) => {
                self.metrics.message_rejected();
                (self.on_error)(metadata.routing_key, &metadata, &err);
            }
        }
    }

    /// Decode, validate and dispatch a single delivery
    pub async fn process(
        &self,
        payload: &[u8],
        metadata: &MessageMetadata,
    ) -> std::result::Result<(), ConsumeError> {
        let routing_key = metadata.routing_key;
        let handler = self
            .handlers
            .get(routing_key)
            .map_err(|_| ConsumeError::NoHandler(routing_key))?;

        let value: Value = serde_json::from_slice(payload)?;
        let value = self.registry.validate(routing_key, value)?;

        handler.handle(routing_key, value, metadata).await?;
        Ok(())
    }
}

/// Running subscription loops
pub struct ConsumerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl ConsumerHandle {
    pub fn subscriptions(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every loop; in-flight handler calls run to completion
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!(subscriptions = self.tasks.len(), "Message consumer stopped");
    }
}
