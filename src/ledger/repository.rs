//! Repository ports consumed by the task subsystem
//!
//! The core only talks to these traits. [`FjallStore`](super::FjallStore)
//! implements all of them; every method is a single atomic store operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::models::{
    File, FileId, FileStorage, Group, GroupId, NewFile, Platform, Sensor, SensorData, SensorId,
    Task, TaskId, TaskMode, TaskStatus,
};

use super::error::Result;
use super::query::{Page, Paging, TaskFilter};

/// `$set`-style partial update of a task; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub mode: Option<TaskMode>,
    pub last_ran_at: Option<DateTime<Utc>>,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub last_failed_at: Option<DateTime<Utc>>,
    pub last_fail_reason: Option<String>,
    pub next_run_at: Option<DateTime<Utc>>,
    /// Replaces the DataFetch payload entries; ignored for other variants
    pub data_fetch_entries: Option<Vec<SensorData>>,
}

impl TaskPatch {
    pub fn apply(self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(mode) = self.mode {
            task.mode = mode;
        }
        if let Some(at) = self.last_ran_at {
            task.metadata.last_ran_at = Some(at);
        }
        if let Some(at) = self.last_completed_at {
            task.metadata.last_completed_at = Some(at);
        }
        if let Some(at) = self.last_failed_at {
            task.metadata.last_failed_at = Some(at);
        }
        if let Some(reason) = self.last_fail_reason {
            task.metadata.last_fail_reason = Some(reason);
        }
        if let Some(at) = self.next_run_at {
            task.metadata.next_run_at = Some(at);
        }
        if let Some(entries) = self.data_fetch_entries {
            if let Some(payload) = task.data_fetch_payload_mut() {
                payload.data = entries;
            }
        }
        task.updated_at = Utc::now();
    }
}

/// Partial update of a file; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    pub storage: Option<FileStorage>,
    pub url: Option<String>,
    pub published: Option<bool>,
    pub state_changing: Option<bool>,
    pub exposed_to_platforms: Option<Vec<Platform>>,
    /// `Some(None)` clears a previous error
    pub error_message: Option<Option<String>>,
}

impl FilePatch {
    pub fn apply(self, file: &mut File) {
        if let Some(storage) = self.storage {
            file.storage = storage;
        }
        if let Some(url) = self.url {
            file.url = Some(url);
        }
        let state = &mut file.visibility_state;
        if let Some(published) = self.published {
            state.published = published;
        }
        if let Some(changing) = self.state_changing {
            state.state_changing = changing;
        }
        if let Some(platforms) = self.exposed_to_platforms {
            state.exposed_to_platforms = platforms;
        }
        if let Some(error) = self.error_message {
            state.error_message = error;
        }
        file.updated_at = Utc::now();
    }
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a new task; fails with `DuplicateKey` if the name is taken
    async fn create(&self, task: Task) -> Result<Task>;

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Task>>;

    /// Existing tasks among `ids`, missing ids are skipped
    async fn find_many(&self, ids: &[TaskId]) -> Result<Vec<Task>>;

    /// Atomic find-and-modify; `NotFound` if the task does not exist
    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task>;

    /// Set `mode` on every listed task, returns how many were modified
    async fn update_mode_many(&self, ids: &[TaskId], mode: TaskMode) -> Result<usize>;

    async fn search(&self, filter: &TaskFilter, paging: &Paging) -> Result<Page<Task>>;
}

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn create(&self, file: NewFile) -> Result<File>;

    async fn find_by_id(&self, id: &FileId) -> Result<Option<File>>;

    async fn find_many(&self, ids: &[FileId]) -> Result<Vec<File>>;

    /// File a task already produced for `sensor` under `name`
    async fn find_created_by_task(
        &self,
        task: &TaskId,
        sensor: &SensorId,
        name: &str,
    ) -> Result<Option<File>>;

    async fn update(&self, id: &FileId, patch: FilePatch) -> Result<File>;

    /// Add-to-set `platform` on every listed file, returns how many changed
    async fn add_exposed_platform(&self, ids: &[FileId], platform: &Platform) -> Result<usize>;

    /// Removes the document only; referenced sensors are untouched
    async fn delete(&self, id: &FileId) -> Result<bool>;
}

#[async_trait]
pub trait SensorRepository: Send + Sync {
    /// Fails with `DuplicateKey` if the managed-object triple already exists
    async fn create(&self, sensor: Sensor) -> Result<Sensor>;

    async fn find_by_id(&self, id: &SensorId) -> Result<Option<Sensor>>;

    async fn find_many(&self, ids: &[SensorId]) -> Result<Vec<Sensor>>;

    async fn find_by_managed_object(
        &self,
        managed_object_id: &str,
        managed_object_name: &str,
        value_fragment_type: &str,
    ) -> Result<Option<Sensor>>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Fails with `DuplicateKey` if a group with the same managed object id exists
    async fn create(&self, group: Group) -> Result<Group>;

    async fn find_by_id(&self, id: &GroupId) -> Result<Option<Group>>;

    async fn find_by_managed_object_id(&self, managed_object_id: &str) -> Result<Option<Group>>;

    /// Atomic add-to-set of member sensors and sub-groups
    async fn add_members(
        &self,
        id: &GroupId,
        sensors: &[SensorId],
        groups: &[GroupId],
    ) -> Result<Group>;
}

/// Handles to every repository the core needs
#[derive(Clone)]
pub struct Repositories {
    pub tasks: Arc<dyn TaskRepository>,
    pub files: Arc<dyn FileRepository>,
    pub sensors: Arc<dyn SensorRepository>,
    pub groups: Arc<dyn GroupRepository>,
}

impl Repositories {
    /// All repositories served by one store
    pub fn from_store<S>(store: S) -> Self
    where
        S: TaskRepository + FileRepository + SensorRepository + GroupRepository + 'static,
    {
        let store = Arc::new(store);
        Self {
            tasks: store.clone(),
            files: store.clone(),
            sensors: store.clone(),
            groups: store,
        }
    }
}
