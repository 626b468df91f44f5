//! Stored task -> outbound `task.scheduled.*` message

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::ledger::SensorRepository;
use crate::messaging::messages::{
    DataFetchScheduledPayload, DataUploadScheduledPayload, ObjectSyncScheduledPayload,
    ScheduledPayload, ScheduledSensorData, ScheduledSensorRef, ScheduledUploadFile,
    ScheduledUploadMetadata, TaskScheduledMessage,
};
use crate::messaging::IsoDateTime;
use crate::models::{DataFetchPayload, DataUploadPayload, Sensor, SensorId, Task, TaskVariant};

use super::error::MappingError;

#[derive(Clone)]
pub struct TaskMessageMapper {
    sensors: Arc<dyn SensorRepository>,
}

impl TaskMessageMapper {
    pub fn new(sensors: Arc<dyn SensorRepository>) -> Self {
        Self { sensors }
    }

    pub async fn map_task_to_message(
        &self,
        task: &Task,
    ) -> Result<TaskScheduledMessage, MappingError> {
        let payload = match &task.variant {
            TaskVariant::DataFetch { payload } => {
                ScheduledPayload::DataFetch(self.map_data_fetch(task, payload).await?)
            }
            TaskVariant::DataUpload { payload } => {
                ScheduledPayload::DataUpload(map_data_upload(task, payload))
            }
            TaskVariant::ObjectSync => ScheduledPayload::ObjectSync(ObjectSyncScheduledPayload {}),
        };

        Ok(TaskScheduledMessage {
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            initiated_by_user: task.initiated_by_user.clone(),
            first_run_at: IsoDateTime(task.metadata.first_run_at),
            periodic_data: task.metadata.periodic_data.clone(),
            custom_attributes: task.custom_attributes.clone(),
            task_type: task.task_type(),
            payload,
        })
    }

    async fn map_data_fetch(
        &self,
        task: &Task,
        payload: &DataFetchPayload,
    ) -> Result<DataFetchScheduledPayload, MappingError> {
        let date_from = payload
            .date_from
            .ok_or_else(|| MappingError::MissingDateFrom(task.id.clone()))?;

        let ids: Vec<SensorId> = payload.data.iter().map(|entry| entry.sensor.clone()).collect();
        let sensors: HashMap<SensorId, Sensor> = self
            .sensors
            .find_many(&ids)
            .await?
            .into_iter()
            .map(|sensor| (sensor.id.clone(), sensor))
            .collect();

        let data = payload
            .data
            .iter()
            .filter_map(|entry| {
                let Some(sensor) = sensors.get(&entry.sensor) else {
                    warn!(
                        task_id = %task.id,
                        sensor_id = %entry.sensor,
                        data_id = %entry.data_id,
                        "Sensor no longer exists, entry dropped from scheduled message"
                    );
                    return None;
                };
                Some(ScheduledSensorData {
                    sensor: ScheduledSensorRef {
                        id: sensor.id.clone(),
                        managed_object_id: sensor.managed_object_id.clone(),
                        fragment_type: sensor.value_fragment_type.clone(),
                    },
                    file_name: entry.file_name.clone().unwrap_or_default(),
                    data_id: entry.data_id.clone(),
                })
            })
            .collect();

        Ok(DataFetchScheduledPayload {
            data,
            date_from: IsoDateTime(date_from),
            date_to: payload.date_to.map(IsoDateTime),
        })
    }
}

fn map_data_upload(task: &Task, payload: &DataUploadPayload) -> DataUploadScheduledPayload {
    let files = payload
        .files
        .iter()
        .filter_map(|file| {
            if file.metadata.value_fragment_description.trim().is_empty() {
                info!(
                    task_id = %task.id,
                    file_id = %file.file_id,
                    "File has no valueFragmentDescription, dropped from scheduled message"
                );
                return None;
            }
            Some(ScheduledUploadFile {
                file_id: file.file_id.clone(),
                file_name: file.file_name.clone(),
                storage: file.storage.clone(),
                metadata: ScheduledUploadMetadata {
                    date_from: IsoDateTime(file.metadata.date_from),
                    date_to: IsoDateTime(file.metadata.date_to),
                    managed_object_id: file.metadata.managed_object_id.clone(),
                    managed_object_name: file.metadata.managed_object_name.clone(),
                    value_fragment_type: file.metadata.value_fragment_type.clone(),
                    value_fragment_description: file.metadata.value_fragment_description.clone(),
                    sensor_description: file.metadata.sensor_description.clone(),
                    file_description: file.metadata.file_description.clone(),
                },
                custom_attributes: file.custom_attributes.clone(),
            })
        })
        .collect();

    DataUploadScheduledPayload {
        files,
        platform: payload.platform.clone(),
    }
}
