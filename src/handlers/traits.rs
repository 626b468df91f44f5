use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::messaging::{MessageMetadata, RoutingKey};

/// Errors raised while applying an inbound message
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid {routing_key} message: {message}")]
    InvalidMessage {
        routing_key: RoutingKey,
        message: String,
    },

    #[error("handler does not accept routing key {0}")]
    UnsupportedRoutingKey(RoutingKey),

    #[error("storage error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Consumer-side handler for one or more routing keys
///
/// The payload has already passed the schema registry when `handle` is
/// called. Returning an error rejects the message; the consumer keeps going.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self,
        routing_key: RoutingKey,
        payload: Value,
        metadata: &MessageMetadata,
    ) -> Result<(), HandlerError>;
}

/// Decode an already validated payload into its typed message
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    routing_key: RoutingKey,
    payload: Value,
) -> Result<T, HandlerError> {
    serde_json::from_value(payload).map_err(|err| HandlerError::InvalidMessage {
        routing_key,
        message: err.to_string(),
    })
}
