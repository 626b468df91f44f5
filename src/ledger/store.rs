use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::{
    File, FileId, Group, GroupId, NewFile, Platform, Sensor, SensorId, Task, TaskId, TaskMode,
};

use super::error::{LedgerError, Result};
use super::partitions::{
    decode_id, encode_file_key, encode_file_task_index_key, encode_group_index_key,
    encode_group_key, encode_sensor_index_key, encode_sensor_key, encode_task_key,
    encode_task_name_key, TASK_PREFIX,
};
use super::query::{Page, Paging, TaskFilter};
use super::repository::{
    FilePatch, FileRepository, GroupRepository, SensorRepository, TaskPatch, TaskRepository,
};

/// Fjall-backed document store for tasks, files, sensors and groups
///
/// Plain reads go straight to the partitions. Anything that reads and then
/// writes (unique inserts, find-and-modify, add-to-set, bulk updates) runs
/// under `write_lock`, so each such call behaves as one atomic document
/// operation. Document and index writes are committed in a single batch.
#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    tasks: PartitionHandle,
    task_names: PartitionHandle,
    files: PartitionHandle,
    file_task_index: PartitionHandle,
    sensors: PartitionHandle,
    sensor_index: PartitionHandle,
    groups: PartitionHandle,
    group_index: PartitionHandle,
    write_lock: Arc<Mutex<()>>,
}

impl FjallStore {
    /// Open or create a Fjall store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening Fjall store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let open = |name: &str| keyspace.open_partition(name, PartitionCreateOptions::default());

        let store = Self {
            tasks: open("tasks")?,
            task_names: open("task_names")?,
            files: open("files")?,
            file_task_index: open("file_task_index")?,
            sensors: open("sensors")?,
            sensor_index: open("sensor_index")?,
            groups: open("groups")?,
            group_index: open("group_index")?,
            keyspace: keyspace.clone(),
            write_lock: Arc::new(Mutex::new(())),
        };

        info!("Fjall store opened successfully");
        Ok(store)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Document counts per collection (for debugging/monitoring)
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            task_count: count(&self.tasks)?,
            file_count: count(&self.files)?,
            sensor_count: count(&self.sensors)?,
            group_count: count(&self.groups)?,
        })
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        get_json(&self.tasks, encode_task_key(id.as_str()))
    }

    fn get_file(&self, id: &FileId) -> Result<Option<File>> {
        get_json(&self.files, encode_file_key(id.as_str()))
    }

    fn get_sensor(&self, id: &SensorId) -> Result<Option<Sensor>> {
        get_json(&self.sensors, encode_sensor_key(id.as_str()))
    }

    fn get_group(&self, id: &GroupId) -> Result<Option<Group>> {
        get_json(&self.groups, encode_group_key(id.as_str()))
    }

    fn put_task(&self, task: &Task) -> Result<()> {
        self.tasks
            .insert(encode_task_key(task.id.as_str()), serde_json::to_vec(task)?)?;
        Ok(())
    }

    fn put_file(&self, file: &File) -> Result<()> {
        self.files
            .insert(encode_file_key(file.id.as_str()), serde_json::to_vec(file)?)?;
        Ok(())
    }

}

/// Index keys of a file created by a task, empty for uploaded files
fn file_task_index_keys(file: &File) -> Vec<Vec<u8>> {
    let Some(task_id) = &file.created_by_task else {
        return Vec::new();
    };
    file.metadata
        .sensors
        .iter()
        .map(|sensor| encode_file_task_index_key(task_id.as_str(), sensor.as_str(), &file.name))
        .collect()
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub task_count: usize,
    pub file_count: usize,
    pub sensor_count: usize,
    pub group_count: usize,
}

fn get_json<T: DeserializeOwned>(partition: &PartitionHandle, key: Vec<u8>) -> Result<Option<T>> {
    match partition.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
        None => Ok(None),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn count(partition: &PartitionHandle) -> Result<usize> {
    let mut total = 0;
    for item in partition.iter() {
        item?;
        total += 1;
    }
    Ok(total)
}

#[async_trait]
impl TaskRepository for FjallStore {
    async fn create(&self, task: Task) -> Result<Task> {
        let _guard = self.write_lock.lock().await;

        let name_key = encode_task_name_key(&task.name);
        if self.task_names.contains_key(&name_key)? {
            return Err(LedgerError::DuplicateKey {
                collection: "task",
                key: task.name.clone(),
            });
        }

        let mut batch = self.keyspace.batch();
        batch.insert(&self.tasks, encode_task_key(task.id.as_str()), to_json(&task)?);
        batch.insert(&self.task_names, name_key, task.id.as_str().as_bytes());
        batch.commit()?;

        debug!(task_id = %task.id, task_type = %task.task_type(), "Task created");
        Ok(task)
    }

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>> {
        self.get_task(id)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Task>> {
        match self.task_names.get(encode_task_name_key(name))? {
            Some(id) => self.get_task(&TaskId::from(decode_id(&id))),
            None => Ok(None),
        }
    }

    async fn find_many(&self, ids: &[TaskId]) -> Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.get_task(id)? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        let _guard = self.write_lock.lock().await;

        let mut task = self
            .get_task(id)?
            .ok_or_else(|| LedgerError::not_found("task", id))?;
        patch.apply(&mut task);
        self.put_task(&task)?;

        debug!(task_id = %id, status = %task.status, "Task updated");
        Ok(task)
    }

    async fn update_mode_many(&self, ids: &[TaskId], mode: TaskMode) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut batch = self.keyspace.batch();
        let mut modified = 0;
        for id in ids {
            let Some(mut task) = self.get_task(id)? else {
                continue;
            };
            if task.mode == mode {
                continue;
            }
            TaskPatch {
                mode: Some(mode),
                ..TaskPatch::default()
            }
            .apply(&mut task);
            batch.insert(&self.tasks, encode_task_key(id.as_str()), to_json(&task)?);
            modified += 1;
        }
        batch.commit()?;

        Ok(modified)
    }

    async fn search(&self, filter: &TaskFilter, paging: &Paging) -> Result<Page<Task>> {
        let mut matching = Vec::new();
        for item in self.tasks.prefix(TASK_PREFIX) {
            let (_, value) = item?;
            let task: Task = serde_json::from_slice(&value)?;
            if filter.matches(&task) {
                matching.push(task);
            }
        }

        matching.sort_by(|a, b| paging.compare(a, b));
        Ok(Page::from_sorted(matching, paging))
    }
}

#[async_trait]
impl FileRepository for FjallStore {
    async fn create(&self, file: NewFile) -> Result<File> {
        let file = File::from(file);

        let mut batch = self.keyspace.batch();
        batch.insert(&self.files, encode_file_key(file.id.as_str()), to_json(&file)?);
        for key in file_task_index_keys(&file) {
            batch.insert(&self.file_task_index, key, file.id.as_str().as_bytes());
        }
        batch.commit()?;
        debug!(file_id = %file.id, name = %file.name, "File created");
        Ok(file)
    }

    async fn find_by_id(&self, id: &FileId) -> Result<Option<File>> {
        self.get_file(id)
    }

    async fn find_many(&self, ids: &[FileId]) -> Result<Vec<File>> {
        let mut files = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(file) = self.get_file(id)? {
                files.push(file);
            }
        }
        Ok(files)
    }

    async fn find_created_by_task(
        &self,
        task: &TaskId,
        sensor: &SensorId,
        name: &str,
    ) -> Result<Option<File>> {
        let key = encode_file_task_index_key(task.as_str(), sensor.as_str(), name);
        match self.file_task_index.get(key)? {
            Some(id) => self.get_file(&FileId::from(decode_id(&id))),
            None => Ok(None),
        }
    }

    async fn update(&self, id: &FileId, patch: FilePatch) -> Result<File> {
        let _guard = self.write_lock.lock().await;

        let mut file = self
            .get_file(id)?
            .ok_or_else(|| LedgerError::not_found("file", id))?;
        patch.apply(&mut file);
        self.put_file(&file)?;
        Ok(file)
    }

    async fn add_exposed_platform(&self, ids: &[FileId], platform: &Platform) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut batch = self.keyspace.batch();
        let mut modified = 0;
        for id in ids {
            let Some(mut file) = self.get_file(id)? else {
                continue;
            };
            if file.visibility_state.expose_to(platform) {
                file.updated_at = chrono::Utc::now();
                batch.insert(&self.files, encode_file_key(id.as_str()), to_json(&file)?);
                modified += 1;
            }
        }
        batch.commit()?;

        Ok(modified)
    }

    async fn delete(&self, id: &FileId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let Some(file) = self.get_file(id)? else {
            return Ok(false);
        };

        let mut batch = self.keyspace.batch();
        batch.remove(&self.files, encode_file_key(id.as_str()));
        for key in file_task_index_keys(&file) {
            batch.remove(&self.file_task_index, key);
        }
        batch.commit()?;
        debug!(file_id = %id, "File deleted");
        Ok(true)
    }
}

#[async_trait]
impl SensorRepository for FjallStore {
    async fn create(&self, sensor: Sensor) -> Result<Sensor> {
        let _guard = self.write_lock.lock().await;

        let index_key = encode_sensor_index_key(
            &sensor.managed_object_id,
            &sensor.managed_object_name,
            &sensor.value_fragment_type,
        );
        if self.sensor_index.contains_key(&index_key)? {
            return Err(LedgerError::DuplicateKey {
                collection: "sensor",
                key: format!(
                    "{}/{}/{}",
                    sensor.managed_object_id, sensor.managed_object_name, sensor.value_fragment_type
                ),
            });
        }

        let mut batch = self.keyspace.batch();
        batch.insert(&self.sensors, encode_sensor_key(sensor.id.as_str()), to_json(&sensor)?);
        batch.insert(&self.sensor_index, index_key, sensor.id.as_str().as_bytes());
        batch.commit()?;

        Ok(sensor)
    }

    async fn find_by_id(&self, id: &SensorId) -> Result<Option<Sensor>> {
        self.get_sensor(id)
    }

    async fn find_many(&self, ids: &[SensorId]) -> Result<Vec<Sensor>> {
        let mut sensors = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(sensor) = self.get_sensor(id)? {
                sensors.push(sensor);
            }
        }
        Ok(sensors)
    }

    async fn find_by_managed_object(
        &self,
        managed_object_id: &str,
        managed_object_name: &str,
        value_fragment_type: &str,
    ) -> Result<Option<Sensor>> {
        let key =
            encode_sensor_index_key(managed_object_id, managed_object_name, value_fragment_type);
        match self.sensor_index.get(key)? {
            Some(id) => self.get_sensor(&SensorId::from(decode_id(&id))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl GroupRepository for FjallStore {
    async fn create(&self, group: Group) -> Result<Group> {
        let _guard = self.write_lock.lock().await;

        let index_key = group.managed_object_id.as_deref().map(encode_group_index_key);
        if let Some(key) = &index_key {
            if self.group_index.contains_key(key)? {
                return Err(LedgerError::DuplicateKey {
                    collection: "group",
                    key: group.managed_object_id.clone().unwrap_or_default(),
                });
            }
        }

        let mut batch = self.keyspace.batch();
        batch.insert(&self.groups, encode_group_key(group.id.as_str()), to_json(&group)?);
        if let Some(key) = index_key {
            batch.insert(&self.group_index, key, group.id.as_str().as_bytes());
        }
        batch.commit()?;

        Ok(group)
    }

    async fn find_by_id(&self, id: &GroupId) -> Result<Option<Group>> {
        self.get_group(id)
    }

    async fn find_by_managed_object_id(&self, managed_object_id: &str) -> Result<Option<Group>> {
        match self.group_index.get(encode_group_index_key(managed_object_id))? {
            Some(id) => self.get_group(&GroupId::from(decode_id(&id))),
            None => Ok(None),
        }
    }

    async fn add_members(
        &self,
        id: &GroupId,
        sensors: &[SensorId],
        groups: &[GroupId],
    ) -> Result<Group> {
        let _guard = self.write_lock.lock().await;

        let mut group = self
            .get_group(id)?
            .ok_or_else(|| LedgerError::not_found("group", id))?;
        if group.add_members(sensors, groups) {
            self.groups
                .insert(encode_group_key(id.as_str()), to_json(&group)?)?;
        }
        Ok(group)
    }
}
