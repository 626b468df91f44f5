//! Polymorphic task documents
//!
//! A task is a common header plus a variant selected by the `taskType` tag.
//! Stored JSON looks like:
//!
//! ```json
//! {
//!   "id": "0190...",
//!   "name": "nightly-fetch",
//!   "status": "NOT_STARTED",
//!   "mode": "ENABLED",
//!   "initiatedByUser": "user-1",
//!   "metadata": { "firstRunAt": "2024-05-01T10:00:00Z" },
//!   "taskType": "DATA_FETCH",
//!   "payload": { "data": [], "dateFrom": "2024-04-01T00:00:00Z" },
//!   "customAttributes": {}
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::file::{FileStorage, Platform};
use super::ids::{FileId, GroupId, SensorId, TaskId, UserId};
use super::CustomAttributes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    DataFetch,
    DataUpload,
    ObjectSync,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [
        TaskType::DataFetch,
        TaskType::DataUpload,
        TaskType::ObjectSync,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::DataFetch => "DATA_FETCH",
            TaskType::DataUpload => "DATA_UPLOAD",
            TaskType::ObjectSync => "OBJECT_SYNC",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    NotStarted,
    InQueue,
    WaitingNextCycle,
    Processing,
    Done,
    Failed,
    Disabled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "NOT_STARTED",
            TaskStatus::InQueue => "IN_QUEUE",
            TaskStatus::WaitingNextCycle => "WAITING_NEXT_CYCLE",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Done => "DONE",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Disabled => "DISABLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed | TaskStatus::Disabled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskMode {
    #[default]
    Enabled,
    Disabled,
}

/// Recurrence of a task: a cron expression or a human interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodicData {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_duration_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    pub first_run_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodic_data: Option<PeriodicData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ran_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fail_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
}

impl TaskMetadata {
    pub fn new(first_run_at: DateTime<Utc>, periodic_data: Option<PeriodicData>) -> Self {
        Self {
            first_run_at,
            periodic_data,
            last_ran_at: None,
            last_completed_at: None,
            last_failed_at: None,
            last_fail_reason: None,
            next_run_at: None,
        }
    }
}

/// One file-producing entry of a DataFetch task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorData {
    pub sensor: SensorId,
    pub data_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "fileURL")]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFetchPayload {
    #[serde(default)]
    pub data: Vec<SensorData>,
    /// Always set at creation; stays optional so that a malformed stored
    /// document surfaces as a mapping error instead of a decode failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileMetadata {
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    pub managed_object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_object_name: Option<String>,
    pub value_fragment_type: String,
    pub value_fragment_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFile {
    pub file_id: FileId,
    pub file_name: String,
    pub storage: FileStorage,
    pub metadata: UploadFileMetadata,
    #[serde(default)]
    pub custom_attributes: CustomAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUploadPayload {
    #[serde(default)]
    pub files: Vec<UploadFile>,
    pub platform: Platform,
}

/// Variant part of a task, tagged by `taskType`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "taskType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskVariant {
    DataFetch { payload: DataFetchPayload },
    DataUpload { payload: DataUploadPayload },
    ObjectSync,
}

impl TaskVariant {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskVariant::DataFetch { .. } => TaskType::DataFetch,
            TaskVariant::DataUpload { .. } => TaskType::DataUpload,
            TaskVariant::ObjectSync => TaskType::ObjectSync,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub mode: TaskMode,
    pub initiated_by_user: UserId,
    pub metadata: TaskMetadata,
    #[serde(flatten)]
    pub variant: TaskVariant,
    #[serde(default)]
    pub custom_attributes: CustomAttributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// New NOT_STARTED, ENABLED task
    pub fn new(
        name: String,
        initiated_by_user: UserId,
        metadata: TaskMetadata,
        variant: TaskVariant,
        custom_attributes: CustomAttributes,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::generate(),
            name,
            status: TaskStatus::NotStarted,
            mode: TaskMode::Enabled,
            initiated_by_user,
            metadata,
            variant,
            custom_attributes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.variant.task_type()
    }

    pub fn data_fetch_payload(&self) -> Option<&DataFetchPayload> {
        match &self.variant {
            TaskVariant::DataFetch { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn data_fetch_payload_mut(&mut self) -> Option<&mut DataFetchPayload> {
        match &mut self.variant {
            TaskVariant::DataFetch { payload } => Some(payload),
            _ => None,
        }
    }

    pub fn data_upload_payload(&self) -> Option<&DataUploadPayload> {
        match &self.variant {
            TaskVariant::DataUpload { payload } => Some(payload),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fetch_task() -> Task {
        Task::new(
            "fetch".to_string(),
            UserId::from("user-1"),
            TaskMetadata::new(Utc::now(), None),
            TaskVariant::DataFetch {
                payload: DataFetchPayload {
                    data: vec![SensorData {
                        sensor: SensorId::from("s1"),
                        data_id: "d1".to_string(),
                        file_id: None,
                        file_name: Some("f.csv".to_string()),
                        bucket: None,
                        file_path: None,
                        file_url: None,
                    }],
                    date_from: Some(Utc::now()),
                    date_to: None,
                    group: None,
                },
            },
            CustomAttributes::new(),
        )
    }

    #[test]
    fn test_every_task_type_has_a_distinct_wire_name() {
        let names: Vec<_> = TaskType::ALL.iter().map(TaskType::as_str).collect();
        assert_eq!(names, ["DATA_FETCH", "DATA_UPLOAD", "OBJECT_SYNC"]);
        for task_type in TaskType::ALL {
            let value = serde_json::to_value(task_type).unwrap();
            assert_eq!(value, json!(task_type.as_str()));
        }
    }

    #[test]
    fn test_task_document_carries_type_tag_and_payload() {
        let task = fetch_task();
        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value["taskType"], "DATA_FETCH");
        assert_eq!(value["status"], "NOT_STARTED");
        assert_eq!(value["mode"], "ENABLED");
        assert_eq!(value["payload"]["data"][0]["dataId"], "d1");
        assert_eq!(value["payload"]["data"][0]["fileName"], "f.csv");
    }

    #[test]
    fn test_polymorphic_read_selects_variant_from_tag() {
        let task = fetch_task();
        let bytes = serde_json::to_vec(&task).unwrap();
        let back: Task = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(back.task_type(), TaskType::DataFetch);
        assert_eq!(back.data_fetch_payload().unwrap().data.len(), 1);
        assert!(back.data_upload_payload().is_none());
    }

    #[test]
    fn test_object_sync_has_no_payload() {
        let value = json!({
            "id": "t1",
            "name": "sync",
            "status": "PROCESSING",
            "mode": "ENABLED",
            "initiatedByUser": "u1",
            "metadata": { "firstRunAt": "2024-05-01T10:00:00Z" },
            "taskType": "OBJECT_SYNC",
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:00:00Z"
        });

        let task: Task = serde_json::from_value(value).unwrap();
        assert_eq!(task.task_type(), TaskType::ObjectSync);
        assert_eq!(task.status, TaskStatus::Processing);
        assert!(task.custom_attributes.is_empty());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Disabled.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(!TaskStatus::WaitingNextCycle.is_terminal());
    }
}
