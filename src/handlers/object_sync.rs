//! ObjectSync: upsert sensors and groups reported by the platform
//!
//! Re-syncing a known managed object is a lookup, never a second insert.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ledger::{GroupRepository, LedgerError, SensorRepository};
use crate::messaging::messages::{GroupObject, ManagedObject, SensorObject};
use crate::models::{CustomAttributes, Group, GroupId, Sensor, SensorId};

use super::traits::HandlerError;

/// What a sync run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub sensors_created: usize,
    pub sensors_skipped: usize,
    pub groups_created: usize,
    pub groups_updated: usize,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Clone)]
pub struct ObjectSynchronizer {
    sensors: Arc<dyn SensorRepository>,
    groups: Arc<dyn GroupRepository>,
}

impl ObjectSynchronizer {
    pub fn new(sensors: Arc<dyn SensorRepository>, groups: Arc<dyn GroupRepository>) -> Self {
        Self { sensors, groups }
    }

    pub async fn sync(&self, objects: &[ManagedObject]) -> Result<SyncSummary, HandlerError> {
        let mut summary = SyncSummary::default();
        for object in objects {
            match object {
                ManagedObject::Sensor(sensor) => {
                    self.sync_sensor(sensor, &mut summary).await?;
                }
                ManagedObject::Group(group) => {
                    self.sync_group(group, &mut summary).await?;
                }
            }
        }
        Ok(summary)
    }

    /// Existing or newly created sensor id; `None` if the object has no fragment type
    async fn sync_sensor(
        &self,
        object: &SensorObject,
        summary: &mut SyncSummary,
    ) -> Result<Option<SensorId>, HandlerError> {
        let Some(fragment_type) = object.value_fragment_type.as_deref() else {
            debug!(
                managed_object_id = %object.managed_object_id,
                "Sensor object without valueFragmentType skipped"
            );
            summary.sensors_skipped += 1;
            return Ok(None);
        };

        if let Some(existing) = self
            .sensors
            .find_by_managed_object(
                &object.managed_object_id,
                &object.managed_object_name,
                fragment_type,
            )
            .await?
        {
            return Ok(Some(existing.id));
        }

        let sensor = Sensor {
            id: SensorId::generate(),
            name: object
                .value_fragment_display_name
                .clone()
                .unwrap_or_else(|| fragment_type.to_string()),
            description: None,
            managed_object_id: object.managed_object_id.clone(),
            managed_object_name: object.managed_object_name.clone(),
            value_fragment_type: fragment_type.to_string(),
            value_fragment_display_name: object.value_fragment_display_name.clone(),
            custom_attributes: CustomAttributes::new(),
        };

        match self.sensors.create(sensor).await {
            Ok(created) => {
                summary.sensors_created += 1;
                Ok(Some(created.id))
            }
            // lost a race against a concurrent sync of the same object
            Err(LedgerError::DuplicateKey { .. }) => Ok(self
                .sensors
                .find_by_managed_object(
                    &object.managed_object_id,
                    &object.managed_object_name,
                    fragment_type,
                )
                .await?
                .map(|sensor| sensor.id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Resolves nested members first, then merges into or creates the group
    fn sync_group<'a>(
        &'a self,
        object: &'a GroupObject,
        summary: &'a mut SyncSummary,
    ) -> BoxFuture<'a, Result<GroupId, HandlerError>> {
        Box::pin(async move {
            let mut sensor_ids = Vec::with_capacity(object.sensors.len());
            for sensor in &object.sensors {
                if let Some(id) = self.sync_sensor(sensor, summary).await? {
                    sensor_ids.push(id);
                }
            }

            let mut group_ids = Vec::with_capacity(object.groups.len());
            for nested in &object.groups {
                group_ids.push(self.sync_group(nested, summary).await?);
            }

            if let Some(existing) = self
                .groups
                .find_by_managed_object_id(&object.managed_object_id)
                .await?
            {
                let updated = self
                    .groups
                    .add_members(&existing.id, &sensor_ids, &group_ids)
                    .await?;
                if updated.sensors.len() != existing.sensors.len()
                    || updated.sub_groups.len() != existing.sub_groups.len()
                {
                    summary.groups_updated += 1;
                }
                return Ok(existing.id);
            }

            let mut group = Group {
                id: GroupId::generate(),
                name: object.managed_object_name.clone(),
                description: None,
                managed_object_id: Some(object.managed_object_id.clone()),
                managed_object_name: Some(object.managed_object_name.clone()),
                sensors: Vec::new(),
                sub_groups: Vec::new(),
                custom_attributes: CustomAttributes::new(),
            };
            group.add_members(&sensor_ids, &group_ids);

            match self.groups.create(group).await {
                Ok(created) => {
                    info!(group_id = %created.id, managed_object_id = %object.managed_object_id, "Group created");
                    summary.groups_created += 1;
                    Ok(created.id)
                }
                Err(LedgerError::DuplicateKey { .. }) => {
                    let existing = self
                        .groups
                        .find_by_managed_object_id(&object.managed_object_id)
                        .await?
                        .ok_or_else(|| LedgerError::not_found("group", &object.managed_object_id))?;
                    self.groups
                        .add_members(&existing.id, &sensor_ids, &group_ids)
                        .await?;
                    Ok(existing.id)
                }
                Err(err) => Err(err.into()),
            }
        })
    }
}
