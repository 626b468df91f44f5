//! Schema registry: one structural validator per routing key
//!
//! Each entry is a list of alternatives. A payload is valid if at least one
//! alternative accepts it, which is how the polymorphic `task.status` family
//! is expressed. Alternatives decode into the typed messages of
//! [`messages`](super::messages) and then run their [`Validate`] checks.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::{TaskStatus, TaskType};

use super::messages::{
    DataFetchResultPayload, DataFetchScheduledPayload, DataUploadScheduledPayload,
    FileDeletionMessage, FileVisibilityStateMessage, FileVisibilityStateResultMessage,
    ObjectSyncPayload, ObjectSyncResultPayload, ObjectSyncScheduledPayload, TaskFailedMessage,
    TaskModeMessage, TaskScheduledMessage, TaskStatusMessage, UserMessage, Validate,
};
use super::routing::RoutingKey;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("No schema registered for routing key: {0}")]
    UnknownRoutingKey(String),

    #[error("Invalid {routing_key} message: {message}")]
    Invalid {
        routing_key: RoutingKey,
        message: String,
    },

    #[error("{routing_key} message matches none of [{}]", .errors.join("; "))]
    NoAlternativeMatched {
        routing_key: RoutingKey,
        errors: Vec<String>,
    },

    #[error("Invalid ISO-8601 date: {0}")]
    InvalidDate(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;

type Check = fn(&Value) -> std::result::Result<(), String>;

/// Validator for one routing key
#[derive(Clone)]
pub struct Schema {
    alternatives: Vec<(&'static str, Check)>,
}

impl Schema {
    fn single(name: &'static str, check: Check) -> Self {
        Self {
            alternatives: vec![(name, check)],
        }
    }

    fn one_of(alternatives: Vec<(&'static str, Check)>) -> Self {
        Self { alternatives }
    }

    fn check(&self, routing_key: RoutingKey, payload: &Value) -> Result<()> {
        let mut errors = Vec::with_capacity(self.alternatives.len());
        for (name, check) in &self.alternatives {
            match check(payload) {
                Ok(()) => return Ok(()),
                Err(err) => errors.push(format!("{name}: {err}")),
            }
        }

        if self.alternatives.len() == 1 {
            Err(SchemaError::Invalid {
                routing_key,
                message: errors.remove(0),
            })
        } else {
            Err(SchemaError::NoAlternativeMatched {
                routing_key,
                errors,
            })
        }
    }
}

/// Decode into `T` and run its intrinsic checks
fn shape<T: DeserializeOwned + Validate>(payload: &Value) -> std::result::Result<T, String> {
    let message = T::deserialize(payload).map_err(|err| err.to_string())?;
    message.validate()?;
    Ok(message)
}

fn expect_task_type(actual: TaskType, expected: TaskType) -> std::result::Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("taskType must be {expected}, got {actual}"))
    }
}

fn scheduled<P: DeserializeOwned + Validate>(
    payload: &Value,
    task_type: TaskType,
) -> std::result::Result<(), String> {
    let message: TaskScheduledMessage<P> = shape(payload)?;
    expect_task_type(message.task_type, task_type)
}

fn scheduled_data_fetch(payload: &Value) -> std::result::Result<(), String> {
    scheduled::<DataFetchScheduledPayload>(payload, TaskType::DataFetch)
}

fn scheduled_data_upload(payload: &Value) -> std::result::Result<(), String> {
    scheduled::<DataUploadScheduledPayload>(payload, TaskType::DataUpload)
}

fn scheduled_object_sync(payload: &Value) -> std::result::Result<(), String> {
    scheduled::<ObjectSyncScheduledPayload>(payload, TaskType::ObjectSync)
}

fn data_fetch_result(payload: &Value) -> std::result::Result<(), String> {
    let message: TaskStatusMessage<DataFetchResultPayload> = shape(payload)?;
    expect_task_type(message.task_type, TaskType::DataFetch)?;
    if message.payload.is_none() {
        return Err("payload is required".to_string());
    }
    Ok(())
}

fn data_upload_result(payload: &Value) -> std::result::Result<(), String> {
    let message: TaskStatusMessage = shape(payload)?;
    expect_task_type(message.task_type, TaskType::DataUpload)?;
    if message.status != TaskStatus::Done {
        return Err("status must be DONE".to_string());
    }
    Ok(())
}

fn object_sync_status(payload: &Value) -> std::result::Result<(), String> {
    let message: TaskStatusMessage<ObjectSyncPayload> = shape(payload)?;
    expect_task_type(message.task_type, TaskType::ObjectSync)?;
    if message.payload.is_none() {
        return Err("payload.objects is required".to_string());
    }
    Ok(())
}

fn object_sync_result(payload: &Value) -> std::result::Result<(), String> {
    let message: TaskStatusMessage<ObjectSyncResultPayload> = shape(payload)?;
    expect_task_type(message.task_type, TaskType::ObjectSync)?;
    if message.payload.is_none() {
        return Err("payload.objectAmount is required".to_string());
    }
    Ok(())
}

/// Bare status report without a payload, valid for every task type
fn general_status(payload: &Value) -> std::result::Result<(), String> {
    let message: TaskStatusMessage = shape(payload)?;
    if message.payload.is_some() {
        return Err("unexpected payload".to_string());
    }
    Ok(())
}

fn typed<T: DeserializeOwned + Validate>(payload: &Value) -> std::result::Result<(), String> {
    shape::<T>(payload).map(|_| ())
}

/// Routing key to schema lookup
#[derive(Clone)]
pub struct SchemaRegistry {
    entries: BTreeMap<RoutingKey, Schema>,
}

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registry with a schema for every routing key of the `General` exchange
    pub fn standard() -> Self {
        let mut registry = Self::empty();

        registry.register(
            RoutingKey::TaskScheduledDataFetch,
            Schema::single("DataFetchScheduled", scheduled_data_fetch),
        );
        registry.register(
            RoutingKey::TaskScheduledDataUpload,
            Schema::single("DataUploadScheduled", scheduled_data_upload),
        );
        registry.register(
            RoutingKey::TaskScheduledObjectSync,
            Schema::single("ObjectSyncScheduled", scheduled_object_sync),
        );
        registry.register(
            RoutingKey::TaskStatus,
            Schema::one_of(vec![
                ("DataFetchResult", data_fetch_result),
                ("DataUploadResult", data_upload_result),
                ("ObjectSyncStatus", object_sync_status),
                ("ObjectSyncResult", object_sync_result),
                ("TaskStatus", general_status),
            ]),
        );
        registry.register(
            RoutingKey::TaskStatusFailed,
            Schema::single("TaskFailed", typed::<TaskFailedMessage>),
        );
        registry.register(
            RoutingKey::TaskStatusDataFetchResult,
            Schema::single("DataFetchResult", data_fetch_result),
        );
        registry.register(
            RoutingKey::TaskStatusObjectSync,
            Schema::single("ObjectSyncStatus", object_sync_status),
        );
        registry.register(
            RoutingKey::TaskStatusObjectSyncResult,
            Schema::single("ObjectSyncResult", object_sync_result),
        );
        registry.register(
            RoutingKey::TaskMode,
            Schema::single("TaskMode", typed::<TaskModeMessage>),
        );
        registry.register(
            RoutingKey::TaskModeChanged,
            Schema::single("TaskModeChanged", typed::<TaskModeMessage>),
        );
        registry.register(
            RoutingKey::UserUser,
            Schema::single("User", typed::<UserMessage>),
        );
        registry.register(
            RoutingKey::FileStatusDeletion,
            Schema::single("FileDeletion", typed::<FileDeletionMessage>),
        );
        registry.register(
            RoutingKey::FileStatusVisibilityState,
            Schema::single("FileVisibilityState", typed::<FileVisibilityStateMessage>),
        );
        registry.register(
            RoutingKey::FileResultVisibilityState,
            Schema::single(
                "FileVisibilityStateResult",
                typed::<FileVisibilityStateResultMessage>,
            ),
        );

        registry
    }

    pub fn register(&mut self, routing_key: RoutingKey, schema: Schema) {
        self.entries.insert(routing_key, schema);
    }

    pub fn contains(&self, routing_key: RoutingKey) -> bool {
        self.entries.contains_key(&routing_key)
    }

    /// Validate `payload` for `routing_key`, handing it back on success
    pub fn validate(&self, routing_key: RoutingKey, payload: Value) -> Result<Value> {
        let schema = self
            .entries
            .get(&routing_key)
            .ok_or_else(|| SchemaError::UnknownRoutingKey(routing_key.to_string()))?;
        schema.check(routing_key, &payload)?;
        Ok(payload)
    }

    /// Same as [`validate`](Self::validate) for a key in string form
    pub fn validate_str(&self, routing_key: &str, payload: Value) -> Result<Value> {
        let key = routing_key
            .parse::<RoutingKey>()
            .map_err(|_| SchemaError::UnknownRoutingKey(routing_key.to_string()))?;
        self.validate(key, payload)
    }

    /// Validate, then decode into the typed message
    pub fn decode<T: DeserializeOwned>(&self, routing_key: RoutingKey, payload: Value) -> Result<T> {
        let payload = self.validate(routing_key, payload)?;
        serde_json::from_value(payload).map_err(|err| SchemaError::Invalid {
            routing_key,
            message: err.to_string(),
        })
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::standard()
    }

    #[test]
    fn test_every_routing_key_has_a_schema() {
        let registry = registry();
        for key in RoutingKey::ALL {
            assert!(registry.contains(key), "missing schema for {key}");
        }
    }

    #[test]
    fn test_unknown_routing_key_is_error() {
        let result = registry().validate_str("task.exploded", json!({}));
        assert!(matches!(result, Err(SchemaError::UnknownRoutingKey(_))));

        let result = SchemaRegistry::empty().validate(RoutingKey::TaskMode, json!({}));
        assert!(matches!(result, Err(SchemaError::UnknownRoutingKey(_))));
    }

    #[test]
    fn test_task_status_union_accepts_each_alternative() {
        let registry = registry();

        let data_fetch = json!({
            "taskId": "t1", "taskType": "DATA_FETCH", "status": "DONE",
            "payload": { "data": [{ "sensorId": "s1", "fileName": "a.csv", "bucket": "b", "filePath": "p" }] }
        });
        let object_sync = json!({
            "taskId": "t2", "taskType": "OBJECT_SYNC", "status": "PROCESSING",
            "payload": { "objects": [] }
        });
        let object_sync_done = json!({
            "taskId": "t2", "taskType": "OBJECT_SYNC", "status": "DONE",
            "payload": { "objectAmount": 12 }
        });
        let upload_done = json!({ "taskId": "t3", "taskType": "DATA_UPLOAD", "status": "DONE" });
        let general = json!({
            "taskId": "t4", "taskType": "DATA_FETCH", "status": "PROCESSING",
            "mode": "ENABLED", "nextRunAt": "2024-05-01T10:00:00Z"
        });

        for payload in [data_fetch, object_sync, object_sync_done, upload_done, general] {
            assert!(registry.validate(RoutingKey::TaskStatus, payload).is_ok());
        }
    }

    #[test]
    fn test_task_status_union_fails_when_no_alternative_matches() {
        let malformed = json!({
            "taskId": "t1", "taskType": "DATA_FETCH", "status": "DONE",
            "payload": { "data": "not-a-list" }
        });
        let result = registry().validate(RoutingKey::TaskStatus, malformed);
        match result {
            Err(SchemaError::NoAlternativeMatched { errors, .. }) => assert_eq!(errors.len(), 5),
            other => panic!("expected NoAlternativeMatched, got {other:?}"),
        }
    }

    #[test]
    fn test_dates_must_round_trip() {
        let bad_date = json!({
            "taskId": "t4", "taskType": "DATA_FETCH", "status": "PROCESSING",
            "nextRunAt": "2024-02-30T10:00:00Z"
        });
        assert!(registry().validate(RoutingKey::TaskStatus, bad_date).is_err());
    }

    #[test]
    fn test_scheduled_key_checks_task_type() {
        let message = json!({
            "taskId": "t1", "taskName": "sync", "initiatedByUser": "u1",
            "firstRunAt": "2024-05-01T10:00:00.000Z", "taskType": "DATA_FETCH", "payload": {}
        });
        assert!(registry()
            .validate(RoutingKey::TaskScheduledObjectSync, message)
            .is_err());
    }

    #[test]
    fn test_decode_returns_typed_message() {
        let message: TaskModeMessage = registry()
            .decode(
                RoutingKey::TaskModeChanged,
                json!({ "taskIds": ["a", "b"], "mode": "DISABLED" }),
            )
            .unwrap();
        assert_eq!(message.task_ids.len(), 2);

        let empty = registry().validate(
            RoutingKey::TaskModeChanged,
            json!({ "taskIds": [], "mode": "DISABLED" }),
        );
        assert!(matches!(empty, Err(SchemaError::Invalid { .. })));
    }
}
