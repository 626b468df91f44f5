//! Documents handled by the task subsystem.
//!
//! - [`Task`] - polymorphic scheduled work (DataFetch, DataUpload, ObjectSync)
//! - [`File`] - files produced by DataFetch results
//! - [`Sensor`] / [`Group`] - referenced, not owned; created by ObjectSync
//! - [`User`] - owner reference, published to other services

mod file;
mod ids;
mod sensor;
mod task;
mod user;

pub use file::{
    File, FileMetadata, FileStorage, NewFile, Platform, ValueFragment, VisibilityState,
};
pub use ids::{generate_data_id, FileId, GroupId, SensorId, TaskId, UserId};
pub use sensor::{Group, Sensor};
pub use task::{
    DataFetchPayload, DataUploadPayload, PeriodicData, SensorData, Task, TaskMetadata, TaskMode,
    TaskStatus, TaskType, TaskVariant, UploadFile, UploadFileMetadata,
};
pub use user::User;

/// Free-form string-keyed attributes, may nest
pub type CustomAttributes = serde_json::Map<String, serde_json::Value>;
