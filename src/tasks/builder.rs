//! Task creation: request -> concrete task variant -> stored document

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::ledger::{LedgerError, Repositories};
use crate::models::{
    generate_data_id, CustomAttributes, DataFetchPayload, DataUploadPayload, FileId, GroupId,
    PeriodicData, Platform, SensorData, SensorId, Task, TaskMetadata, TaskType, TaskVariant,
    UploadFile, UploadFileMetadata, UserId,
};

use super::error::{Result, TaskError};
use super::schedule::validate_periodic_data;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Group,
    Sensor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFetchEntity {
    pub id: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFetchRequest {
    pub entity_type: EntityType,
    pub entities: Vec<DataFetchEntity>,
    pub date_from: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUploadRequest {
    pub file_ids: Vec<FileId>,
    pub platform: Platform,
}

/// Variant part of a creation request, tagged by `taskType`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "taskType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateTaskDetails {
    DataFetch { payload: DataFetchRequest },
    DataUpload { payload: DataUploadRequest },
    ObjectSync,
}

impl CreateTaskDetails {
    pub fn task_type(&self) -> TaskType {
        match self {
            CreateTaskDetails::DataFetch { .. } => TaskType::DataFetch,
            CreateTaskDetails::DataUpload { .. } => TaskType::DataUpload,
            CreateTaskDetails::ObjectSync => TaskType::ObjectSync,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodic_data: Option<PeriodicData>,
    #[serde(default)]
    pub custom_attributes: CustomAttributes,
    #[serde(flatten)]
    pub details: CreateTaskDetails,
}

impl CreateTaskRequest {
    pub fn task_type(&self) -> TaskType {
        self.details.task_type()
    }

    /// Requested name, or `{TASK_TYPE}-{firstRunAt}-{short id}`
    pub fn resolve_name(&self, first_run_at: DateTime<Utc>) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                let short_id = Uuid::new_v4().simple().to_string();
                format!(
                    "{}-{}-{}",
                    self.task_type(),
                    first_run_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                    &short_id[..8]
                )
            }
        }
    }
}

/// Builds and stores concrete task variants
#[derive(Clone)]
pub struct TaskBuilder {
    repos: Repositories,
}

impl TaskBuilder {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Build the variant for `request` and persist it as a NOT_STARTED task
    ///
    /// Nothing is stored if any part of the request is rejected.
    pub async fn create(&self, user: UserId, request: CreateTaskRequest) -> Result<Task> {
        let task = self.build(user, request).await?;
        self.store(task).await
    }

    /// Resolve references and build the NOT_STARTED task without storing it
    pub async fn build(&self, user: UserId, request: CreateTaskRequest) -> Result<Task> {
        if let Some(periodic) = &request.periodic_data {
            validate_periodic_data(periodic)?;
        }

        let first_run_at = request.first_run_at.unwrap_or_else(Utc::now);
        let name = request.resolve_name(first_run_at);

        let variant = match &request.details {
            CreateTaskDetails::DataFetch { payload } => self.build_data_fetch(payload).await?,
            CreateTaskDetails::DataUpload { payload } => self.build_data_upload(payload).await?,
            CreateTaskDetails::ObjectSync => TaskVariant::ObjectSync,
        };

        Ok(Task::new(
            name,
            user,
            TaskMetadata::new(first_run_at, request.periodic_data.clone()),
            variant,
            request.custom_attributes.clone(),
        ))
    }

    /// Persist a built task; a taken name is a domain conflict
    pub async fn store(&self, task: Task) -> Result<Task> {
        let task = self.repos.tasks.create(task).await.map_err(|err| match err {
            LedgerError::DuplicateKey { key, .. } => TaskError::DuplicateName(key),
            other => TaskError::Ledger(other),
        })?;

        info!(task_id = %task.id, task_type = %task.task_type(), name = %task.name, "Task created");
        Ok(task)
    }

    async fn build_data_fetch(&self, request: &DataFetchRequest) -> Result<TaskVariant> {
        if request.date_to.is_some_and(|date_to| date_to < request.date_from) {
            return Err(TaskError::InvalidRequest(
                "dateTo must not precede dateFrom".to_string(),
            ));
        }

        if let Some(entity) = request
            .entities
            .iter()
            .find(|entity| entity.file_name.trim().is_empty())
        {
            return Err(TaskError::InvalidRequest(format!(
                "fileName must not be empty (entity {})",
                entity.id
            )));
        }

        let (data, group): (Vec<SensorData>, Option<GroupId>) = match request.entity_type {
            EntityType::Group => {
                let [entity] = request.entities.as_slice() else {
                    return Err(TaskError::InvalidRequest(format!(
                        "GROUP requests take exactly one entity, got {}",
                        request.entities.len()
                    )));
                };
                let group_id = GroupId::from(entity.id.as_str());
                let group = self
                    .repos
                    .groups
                    .find_by_id(&group_id)
                    .await?
                    .ok_or_else(|| TaskError::not_found("group", &group_id))?;

                debug!(group_id = %group.id, sensors = group.sensors.len(), "Expanding group");
                let data = group
                    .sensors
                    .iter()
                    .map(|sensor| sensor_data(sensor.clone(), &entity.file_name))
                    .collect();
                (data, Some(group.id))
            }
            EntityType::Sensor => {
                if request.entities.is_empty() {
                    return Err(TaskError::InvalidRequest(
                        "SENSOR requests need at least one entity".to_string(),
                    ));
                }
                let ids: Vec<SensorId> = request
                    .entities
                    .iter()
                    .map(|entity| SensorId::from(entity.id.as_str()))
                    .collect();
                let found = self.repos.sensors.find_many(&ids).await?;
                if let Some(missing) = ids.iter().find(|id| !found.iter().any(|s| &s.id == *id)) {
                    return Err(TaskError::not_found("sensor", missing));
                }

                let data = ids
                    .into_iter()
                    .zip(&request.entities)
                    .map(|(sensor, entity)| sensor_data(sensor, &entity.file_name))
                    .collect();
                (data, None)
            }
        };

        Ok(TaskVariant::DataFetch {
            payload: DataFetchPayload {
                data,
                date_from: Some(request.date_from),
                date_to: request.date_to,
                group,
            },
        })
    }

    async fn build_data_upload(&self, request: &DataUploadRequest) -> Result<TaskVariant> {
        if request.file_ids.is_empty() {
            return Err(TaskError::InvalidRequest(
                "DATA_UPLOAD requests need at least one file".to_string(),
            ));
        }
        if request.platform.platform_identifier.trim().is_empty() {
            return Err(TaskError::InvalidRequest(
                "platform.platformIdentifier must not be empty".to_string(),
            ));
        }

        let mut files = Vec::with_capacity(request.file_ids.len());
        for file_id in &request.file_ids {
            files.push(self.build_upload_file(file_id).await?);
        }

        Ok(TaskVariant::DataUpload {
            payload: DataUploadPayload {
                files,
                platform: request.platform.clone(),
            },
        })
    }

    async fn build_upload_file(&self, file_id: &FileId) -> Result<UploadFile> {
        let unusable = |reason: &str| TaskError::UnusableFile {
            file_id: file_id.to_string(),
            reason: reason.to_string(),
        };

        let file = self
            .repos
            .files
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| TaskError::not_found("file", file_id))?;

        let Some(primary_id) = file.metadata.sensors.first() else {
            return Err(unusable("it references no sensor"));
        };
        let sensors = self.repos.sensors.find_many(&file.metadata.sensors).await?;
        let Some(primary) = sensors.iter().find(|sensor| &sensor.id == primary_id) else {
            return Err(unusable(&format!("sensor {primary_id} does not exist")));
        };
        let Some(description) = primary.value_fragment_description() else {
            return Err(unusable(&format!(
                "sensor {} has no valueFragmentDisplayName",
                primary.id
            )));
        };
        let (Some(date_from), Some(date_to)) = (file.metadata.date_from, file.metadata.date_to)
        else {
            return Err(unusable("it has no dateFrom/dateTo range"));
        };

        let mut custom_attributes = CustomAttributes::new();
        for sensor in &sensors {
            custom_attributes.extend(sensor.custom_attributes.clone());
        }
        custom_attributes.extend(file.custom_attributes.clone());

        Ok(UploadFile {
            file_id: file.id.clone(),
            file_name: file.name.clone(),
            storage: file.storage.clone(),
            metadata: UploadFileMetadata {
                date_from,
                date_to,
                managed_object_id: file
                    .metadata
                    .managed_object_id
                    .clone()
                    .unwrap_or_else(|| primary.managed_object_id.clone()),
                managed_object_name: file
                    .metadata
                    .managed_object_name
                    .clone()
                    .or_else(|| Some(primary.managed_object_name.clone())),
                value_fragment_type: primary.value_fragment_type.clone(),
                value_fragment_description: description.to_string(),
                sensor_description: primary.description.clone(),
                file_description: file.description.clone(),
            },
            custom_attributes,
        })
    }
}

fn sensor_data(sensor: SensorId, file_name: &str) -> SensorData {
    SensorData {
        sensor,
        data_id: generate_data_id(),
        file_id: None,
        file_name: Some(file_name.to_string()),
        bucket: None,
        file_path: None,
        file_url: None,
    }
}
