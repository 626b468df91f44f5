//! Task lifecycle: creation, scheduling and result reconciliation
//!
//! - [`builder`] - builds and stores concrete task variants from requests
//! - [`mapper`] - turns a stored task into its `task.scheduled.*` message
//! - [`merge`] - pure DataFetch result reconciliation
//! - [`schedule`] - cron / human-interval pattern validation
//! - [`service`] - create-and-schedule orchestration and queries

pub mod builder;
pub mod error;
pub mod mapper;
pub mod merge;
pub mod schedule;
pub mod service;

pub use builder::{
    CreateTaskDetails, CreateTaskRequest, DataFetchEntity, DataFetchRequest, DataUploadRequest,
    EntityType, TaskBuilder,
};
pub use error::{MappingError, TaskError};
pub use mapper::TaskMessageMapper;
pub use merge::{merge_result_entries, MergeOutcome, ResolvedEntry};
pub use schedule::{validate_periodic_data, Pattern};
pub use service::TaskService;
