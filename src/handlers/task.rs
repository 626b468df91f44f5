//! Task lifecycle state machine driven by inbound `task.*` messages
//!
//! Dispatch is on `(taskType, status, payload)`. Anything this version does not
//! recognise is logged and dropped so that redelivery never wedges a consumer.

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ledger::{LedgerError, Repositories, TaskPatch};
use crate::messaging::messages::{
    DataFetchResultEntry, DataFetchResultPayload, ObjectSyncPayload, ObjectSyncResultPayload,
    TaskFailedMessage, TaskModeMessage, TaskStatusMessage,
};
use crate::messaging::{IsoDateTime, MessageMetadata, RoutingKey};
use crate::models::{
    generate_data_id, File, FileMetadata, FileStorage, NewFile, Sensor, SensorData, Task,
    TaskStatus, TaskType, ValueFragment,
};
use crate::tasks::{merge_result_entries, ResolvedEntry};

use super::object_sync::ObjectSynchronizer;
use super::traits::{decode, HandlerError, MessageHandler};

#[derive(Clone)]
pub struct TaskMessageHandler {
    repos: Repositories,
    sync: ObjectSynchronizer,
}

impl TaskMessageHandler {
    pub const ROUTING_KEYS: [RoutingKey; 6] = [
        RoutingKey::TaskStatus,
        RoutingKey::TaskStatusFailed,
        RoutingKey::TaskStatusDataFetchResult,
        RoutingKey::TaskStatusObjectSync,
        RoutingKey::TaskStatusObjectSyncResult,
        RoutingKey::TaskModeChanged,
    ];

    pub fn new(repos: Repositories) -> Self {
        Self {
            sync: ObjectSynchronizer::new(repos.sensors.clone(), repos.groups.clone()),
            repos,
        }
    }

    /// Apply a status report; `None` when the message was dropped
    pub async fn handle_task_status_message(
        &self,
        message: TaskStatusMessage,
    ) -> Result<Option<Task>, HandlerError> {
        let Some(task) = self.repos.tasks.find_by_id(&message.task_id).await? else {
            warn!(task_id = %message.task_id, status = %message.status, "Status for unknown task dropped");
            return Ok(None);
        };
        if task.task_type() != message.task_type {
            warn!(
                task_id = %task.id,
                stored = %task.task_type(),
                reported = %message.task_type,
                "Status task type does not match stored task, dropped"
            );
            return Ok(None);
        }

        let mut patch = status_patch(&message);

        match (message.task_type, message.status, message.payload) {
            (TaskType::DataFetch, TaskStatus::Done, Some(payload)) => {
                let result: DataFetchResultPayload = payload_as(payload)?;
                if result.data.is_empty() {
                    info!(task_id = %task.id, "DataFetch result without entries");
                } else {
                    patch.data_fetch_entries = self.reconcile(&task, &result.data).await?;
                }
            }
            (TaskType::DataUpload, TaskStatus::Done, _) => {
                self.expose_uploaded_files(&task).await?;
            }
            (TaskType::ObjectSync, TaskStatus::Processing, Some(payload))
                if payload.get("objects").is_some() =>
            {
                let payload: ObjectSyncPayload = payload_as(payload)?;
                let summary = self.sync.sync(&payload.objects).await?;
                info!(
                    task_id = %task.id,
                    objects = payload.objects.len(),
                    sensors_created = summary.sensors_created,
                    groups_created = summary.groups_created,
                    groups_updated = summary.groups_updated,
                    "Managed objects synchronised"
                );
            }
            (TaskType::ObjectSync, TaskStatus::Done, Some(payload))
                if payload.get("objectAmount").is_some() =>
            {
                let payload: ObjectSyncResultPayload = payload_as(payload)?;
                info!(task_id = %task.id, object_amount = payload.object_amount, "ObjectSync finished");
            }
            (_, _, None) => {}
            (task_type, status, Some(_)) => {
                warn!(
                    task_id = %task.id,
                    %task_type,
                    %status,
                    "Unrecognised task status payload dropped"
                );
                return Ok(None);
            }
        }

        let updated = self.repos.tasks.update(&task.id, patch).await?;
        debug!(task_id = %updated.id, status = %updated.status, "Task status applied");
        Ok(Some(updated))
    }

    pub async fn handle_task_failed_message(
        &self,
        message: TaskFailedMessage,
    ) -> Result<Option<Task>, HandlerError> {
        let patch = TaskPatch {
            status: Some(TaskStatus::Failed),
            last_failed_at: Some(
                message
                    .failed_at
                    .map(IsoDateTime::into_inner)
                    .unwrap_or_else(Utc::now),
            ),
            last_fail_reason: Some(message.reason.clone()),
            ..TaskPatch::default()
        };

        match self.repos.tasks.update(&message.task_id, patch).await {
            Ok(task) => {
                warn!(task_id = %task.id, reason = %message.reason, "Task failed");
                Ok(Some(task))
            }
            Err(LedgerError::NotFound { .. }) => {
                warn!(task_id = %message.task_id, "Failure for unknown task dropped");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Bulk mode update; returns how many tasks changed
    pub async fn handle_task_mode_changed_message(
        &self,
        message: TaskModeMessage,
    ) -> Result<usize, HandlerError> {
        let modified = self
            .repos
            .tasks
            .update_mode_many(&message.task_ids, message.mode)
            .await?;
        info!(
            requested = message.task_ids.len(),
            modified,
            mode = ?message.mode,
            "Task mode changed"
        );
        Ok(modified)
    }

    /// Merged payload entries, or `None` when nothing changed
    async fn reconcile(
        &self,
        task: &Task,
        entries: &[DataFetchResultEntry],
    ) -> Result<Option<Vec<SensorData>>, HandlerError> {
        let mut resolved = Vec::with_capacity(entries.len());
        for entry in entries {
            resolved.push(self.resolve_entry(task, entry).await?);
        }

        let existing = task
            .data_fetch_payload()
            .map(|payload| payload.data.as_slice())
            .unwrap_or_default();
        let outcome = merge_result_entries(existing, &resolved, generate_data_id);

        info!(
            task_id = %task.id,
            updated = outcome.updated,
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "DataFetch result reconciled"
        );
        Ok(outcome.changed().then_some(outcome.entries))
    }

    async fn resolve_entry(
        &self,
        task: &Task,
        entry: &DataFetchResultEntry,
    ) -> Result<ResolvedEntry, HandlerError> {
        let file_id = match self.repos.sensors.find_by_id(&entry.sensor_id).await? {
            Some(sensor) => Some(self.file_for_entry(task, &sensor, entry).await?.id),
            None => {
                warn!(
                    task_id = %task.id,
                    sensor_id = %entry.sensor_id,
                    "Result references unknown sensor, no file created"
                );
                None
            }
        };

        Ok(ResolvedEntry {
            sensor: entry.sensor_id.clone(),
            data_id: entry.data_id.clone(),
            file_id,
            file_name: entry.file_name.clone(),
            bucket: entry.bucket.clone(),
            file_path: entry.file_path.clone(),
            file_url: entry.file_url.clone(),
        })
    }

    /// File this task already produced for the entry, or a new one
    async fn file_for_entry(
        &self,
        task: &Task,
        sensor: &Sensor,
        entry: &DataFetchResultEntry,
    ) -> Result<File, HandlerError> {
        if let Some(file) = self
            .repos
            .files
            .find_created_by_task(&task.id, &sensor.id, &entry.file_name)
            .await?
        {
            return Ok(file);
        }

        let payload = task.data_fetch_payload();
        let metadata = FileMetadata {
            sensors: vec![sensor.id.clone()],
            date_from: entry
                .date_from
                .map(IsoDateTime::into_inner)
                .or_else(|| payload.and_then(|p| p.date_from)),
            date_to: entry
                .date_to
                .map(IsoDateTime::into_inner)
                .or_else(|| payload.and_then(|p| p.date_to)),
            managed_object_id: Some(sensor.managed_object_id.clone()),
            managed_object_name: Some(sensor.managed_object_name.clone()),
            value_fragments: vec![ValueFragment {
                fragment_type: sensor.value_fragment_type.clone(),
                description: sensor.value_fragment_display_name.clone(),
            }],
        };

        let file = self
            .repos
            .files
            .create(
                NewFile::builder()
                    .name(entry.file_name.clone())
                    .storage(FileStorage {
                        bucket: entry.bucket.clone(),
                        path: entry.file_path.clone(),
                    })
                    .metadata(metadata)
                    .created_by_task(task.id.clone())
                    .maybe_url(entry.file_url.clone())
                    .custom_attributes(sensor.custom_attributes.clone())
                    .build(),
            )
            .await?;
        debug!(task_id = %task.id, file_id = %file.id, name = %file.name, "File created from result");
        Ok(file)
    }

    async fn expose_uploaded_files(&self, task: &Task) -> Result<(), HandlerError> {
        let Some(payload) = task.data_upload_payload() else {
            return Ok(());
        };
        let ids: Vec<_> = payload.files.iter().map(|file| file.file_id.clone()).collect();
        let changed = self
            .repos
            .files
            .add_exposed_platform(&ids, &payload.platform)
            .await?;
        info!(
            task_id = %task.id,
            platform = %payload.platform.platform_identifier,
            files = ids.len(),
            changed,
            "Uploaded files exposed"
        );
        Ok(())
    }
}

/// Fields every status report refreshes
fn status_patch(message: &TaskStatusMessage) -> TaskPatch {
    TaskPatch {
        status: Some(message.status),
        mode: message.mode,
        last_ran_at: (message.status == TaskStatus::Processing).then(Utc::now),
        last_completed_at: message.last_completed_at.map(IsoDateTime::into_inner),
        next_run_at: message.next_run_at.map(IsoDateTime::into_inner),
        ..TaskPatch::default()
    }
}

fn payload_as<T: DeserializeOwned>(payload: Value) -> Result<T, HandlerError> {
    decode(RoutingKey::TaskStatus, payload)
}

#[async_trait]
impl MessageHandler for TaskMessageHandler {
    async fn handle(
        &self,
        routing_key: RoutingKey,
        payload: Value,
        metadata: &MessageMetadata,
    ) -> Result<(), HandlerError> {
        debug!(message_id = %metadata.message_id, %routing_key, "Handling task message");
        match routing_key {
            RoutingKey::TaskStatus
            | RoutingKey::TaskStatusDataFetchResult
            | RoutingKey::TaskStatusObjectSync
            | RoutingKey::TaskStatusObjectSyncResult => {
                self.handle_task_status_message(decode(routing_key, payload)?)
                    .await?;
            }
            RoutingKey::TaskStatusFailed => {
                self.handle_task_failed_message(decode(routing_key, payload)?)
                    .await?;
            }
            RoutingKey::TaskModeChanged => {
                self.handle_task_mode_changed_message(decode(routing_key, payload)?)
                    .await?;
            }
            other => return Err(HandlerError::UnsupportedRoutingKey(other)),
        }
        Ok(())
    }
}
