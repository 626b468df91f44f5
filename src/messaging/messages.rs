//! Wire messages exchanged on the bus
//!
//! All shapes are camelCase JSON. Timestamps use [`IsoDateTime`], ids are the
//! stringified document ids.

use serde::{Deserialize, Serialize};

use crate::models::{
    CustomAttributes, FileId, FileStorage, PeriodicData, Platform, SensorId, TaskId, TaskMode,
    TaskStatus, TaskType, UserId,
};

use super::datetime::IsoDateTime;

/// Intrinsic constraints that a successful decode alone does not enforce
pub trait Validate {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl Validate for serde_json::Value {}

fn require(condition: bool, message: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message.to_string())
    }
}

// ---------------------------------------------------------------------------
// task.scheduled.*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskScheduledMessage<P = ScheduledPayload> {
    pub task_id: TaskId,
    pub task_name: String,
    pub initiated_by_user: UserId,
    pub first_run_at: IsoDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodic_data: Option<PeriodicData>,
    #[serde(default)]
    pub custom_attributes: CustomAttributes,
    pub task_type: TaskType,
    pub payload: P,
}

impl<P: Validate> Validate for TaskScheduledMessage<P> {
    fn validate(&self) -> Result<(), String> {
        require(!self.task_name.trim().is_empty(), "taskName must not be empty")?;
        if let Some(periodic) = &self.periodic_data {
            require(!periodic.pattern.trim().is_empty(), "periodicData.pattern must not be empty")?;
        }
        self.payload.validate()
    }
}

/// Variant payload of an outbound scheduled message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduledPayload {
    DataFetch(DataFetchScheduledPayload),
    DataUpload(DataUploadScheduledPayload),
    ObjectSync(ObjectSyncScheduledPayload),
}

impl Validate for ScheduledPayload {
    fn validate(&self) -> Result<(), String> {
        match self {
            ScheduledPayload::DataFetch(payload) => payload.validate(),
            ScheduledPayload::DataUpload(payload) => payload.validate(),
            ScheduledPayload::ObjectSync(payload) => payload.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSensorRef {
    pub id: SensorId,
    pub managed_object_id: String,
    pub fragment_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSensorData {
    pub sensor: ScheduledSensorRef,
    pub file_name: String,
    pub data_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFetchScheduledPayload {
    pub data: Vec<ScheduledSensorData>,
    pub date_from: IsoDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<IsoDateTime>,
}

impl Validate for DataFetchScheduledPayload {
    fn validate(&self) -> Result<(), String> {
        if let Some(date_to) = self.date_to {
            require(date_to >= self.date_from, "dateTo must not precede dateFrom")?;
        }
        for entry in &self.data {
            require(!entry.data_id.is_empty(), "dataId must not be empty")?;
            require(!entry.file_name.is_empty(), "fileName must not be empty")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledUploadMetadata {
    pub date_from: IsoDateTime,
    pub date_to: IsoDateTime,
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
pub struct ScheduledUploadFile {
    pub file_id: FileId,
    pub file_name: String,
    pub storage: FileStorage,
    pub metadata: ScheduledUploadMetadata,
    #[serde(default)]
    pub custom_attributes: CustomAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUploadScheduledPayload {
    pub files: Vec<ScheduledUploadFile>,
    pub platform: Platform,
}

impl Validate for DataUploadScheduledPayload {
    fn validate(&self) -> Result<(), String> {
        require(
            !self.platform.platform_identifier.is_empty(),
            "platform.platformIdentifier must not be empty",
        )?;
        for file in &self.files {
            require(
                !file.metadata.value_fragment_description.trim().is_empty(),
                "valueFragmentDescription must not be empty",
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSyncScheduledPayload {}

impl Validate for ObjectSyncScheduledPayload {}

// ---------------------------------------------------------------------------
// task.status*
// ---------------------------------------------------------------------------

/// Status report for a task; `P` is the variant-specific payload shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "P: Deserialize<'de>"))]
pub struct TaskStatusMessage<P = serde_json::Value> {
    pub task_id: TaskId,
    pub task_type: TaskType,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TaskMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<IsoDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_at: Option<IsoDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<P>,
}

impl<P: Validate> Validate for TaskStatusMessage<P> {
    fn validate(&self) -> Result<(), String> {
        match &self.payload {
            Some(payload) => payload.validate(),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFetchResultEntry {
    pub sensor_id: SensorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
    pub file_name: String,
    pub bucket: String,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "fileURL")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<IsoDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<IsoDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFetchResultPayload {
    pub data: Vec<DataFetchResultEntry>,
}

impl Validate for DataFetchResultPayload {
    fn validate(&self) -> Result<(), String> {
        for entry in &self.data {
            require(!entry.file_name.is_empty(), "fileName must not be empty")?;
            require(!entry.bucket.is_empty(), "bucket must not be empty")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorObject {
    pub managed_object_id: String,
    pub managed_object_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_fragment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_fragment_display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupObject {
    pub managed_object_id: String,
    pub managed_object_name: String,
    #[serde(default)]
    pub sensors: Vec<SensorObject>,
    #[serde(default)]
    pub groups: Vec<GroupObject>,
}

/// Managed object reported by an ObjectSync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManagedObject {
    Sensor(SensorObject),
    Group(GroupObject),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSyncPayload {
    pub objects: Vec<ManagedObject>,
}

impl Validate for ObjectSyncPayload {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSyncResultPayload {
    pub object_amount: u64,
}

impl Validate for ObjectSyncResultPayload {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailedMessage {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(alias = "errorMessage")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<IsoDateTime>,
}

impl Validate for TaskFailedMessage {}

// ---------------------------------------------------------------------------
// task.mode / task.mode.changed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskModeMessage {
    pub task_ids: Vec<TaskId>,
    pub mode: TaskMode,
}

impl Validate for TaskModeMessage {
    fn validate(&self) -> Result<(), String> {
        require(!self.task_ids.is_empty(), "taskIds must not be empty")
    }
}

// ---------------------------------------------------------------------------
// user.user
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub deleted: bool,
}

impl Validate for UserMessage {
    fn validate(&self) -> Result<(), String> {
        require(!self.username.is_empty(), "username must not be empty")
    }
}

// ---------------------------------------------------------------------------
// file.*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLocation {
    pub file_id: FileId,
    pub bucket: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDeletionMessage {
    pub files: Vec<FileLocation>,
}

impl Validate for FileDeletionMessage {
    fn validate(&self) -> Result<(), String> {
        require(!self.files.is_empty(), "files must not be empty")
    }
}

/// Visibility change request sent to the storage side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVisibilityStateMessage {
    pub file_id: FileId,
    pub published: bool,
    #[serde(default)]
    pub exposed_to_platforms: Vec<Platform>,
    pub storage: FileStorage,
}

impl Validate for FileVisibilityStateMessage {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityStateUpdate {
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposed_to_platforms: Option<Vec<Platform>>,
}

/// Outcome of a visibility change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVisibilityStateResultMessage {
    pub file_id: FileId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_state: Option<VisibilityStateUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<FileStorage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Validate for FileVisibilityStateResultMessage {
    fn validate(&self) -> Result<(), String> {
        require(
            self.error.is_some() || self.visibility_state.is_some(),
            "either error or visibilityState is required",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_managed_object_is_tagged_by_type() {
        let value = json!({
            "objects": [
                { "type": "SENSOR", "managedObjectId": "1", "managedObjectName": "T1", "valueFragmentType": "c8y_Temp" },
                { "type": "GROUP", "managedObjectId": "2", "managedObjectName": "G",
                  "sensors": [{ "managedObjectId": "3", "managedObjectName": "T3" }],
                  "groups": [{ "managedObjectId": "4", "managedObjectName": "G4" }] }
            ]
        });

        let payload: ObjectSyncPayload = serde_json::from_value(value).unwrap();
        assert_eq!(payload.objects.len(), 2);
        match &payload.objects[1] {
            ManagedObject::Group(group) => {
                assert_eq!(group.sensors.len(), 1);
                assert!(group.sensors[0].value_fragment_type.is_none());
                assert_eq!(group.groups[0].managed_object_id, "4");
            }
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_message_accepts_error_message_alias() {
        let message: TaskFailedMessage =
            serde_json::from_value(json!({ "taskId": "t1", "errorMessage": "boom" })).unwrap();
        assert_eq!(message.reason, "boom");
        assert!(message.task_type.is_none());
    }

    #[test]
    fn test_visibility_result_requires_state_or_error() {
        let message = FileVisibilityStateResultMessage {
            file_id: FileId::from("f1"),
            visibility_state: None,
            storage: None,
            error: None,
        };
        assert!(message.validate().is_err());
    }

    #[test]
    fn test_result_entry_uses_file_url_casing() {
        let entry = DataFetchResultEntry {
            sensor_id: SensorId::from("s1"),
            data_id: None,
            file_name: "a.csv".to_string(),
            bucket: "b".to_string(),
            file_path: "p/a.csv".to_string(),
            file_url: Some("https://files/a.csv".to_string()),
            date_from: None,
            date_to: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["fileURL"], "https://files/a.csv");
        assert!(value.get("dataId").is_none());
    }
}
