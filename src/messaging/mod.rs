//! Message bus plumbing
//!
//! - [`routing`] - routing keys of the `General` exchange
//! - [`messages`] / [`schema`] - typed wire messages and the registry that validates them
//! - [`bus`] - bus abstraction plus the in-process implementation
//! - [`producer`] / [`consumer`] - outbound publishing and inbound subscription loops

pub mod bus;
pub mod consumer;
pub mod datetime;
pub mod messages;
pub mod producer;
pub mod routing;
pub mod schema;

use thiserror::Error;

pub use bus::{Delivery, InProcessBus, MessageBus, MessageMetadata, PublishOptions, Subscription};
pub use consumer::{ConsumerHandle, ErrorHook, MessageConsumer};
pub use datetime::IsoDateTime;
pub use producer::MessageProducer;
pub use routing::RoutingKey;
pub use schema::{SchemaError, SchemaRegistry};

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Unknown routing key: {0}")]
    UnknownRoutingKey(String),

    #[error("No schema registered for {0}; refusing to publish")]
    MissingSchema(RoutingKey),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MessagingError>;
