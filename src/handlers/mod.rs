//! Consumer-side state machine
//!
//! - [`MessageHandler`] - trait implemented per inbound routing key family
//! - [`TaskMessageHandler`] - `task.status*` and `task.mode.changed`
//! - [`FileMessageHandler`] - `file.result.visibility.state`
//! - [`ObjectSynchronizer`] - sensor/group upserts for ObjectSync runs
//! - [`HandlerRegistry`] - routing key to handler lookup used by the consumer

mod file;
mod object_sync;
mod registry;
mod task;
mod traits;

pub use file::FileMessageHandler;
pub use object_sync::{ObjectSynchronizer, SyncSummary};
pub use registry::{HandlerRegistry, RegistryError};
pub use task::TaskMessageHandler;
pub use traits::{HandlerError, MessageHandler};
