//! Task lifecycle over the in-process bus: create, schedule, report, reconcile

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use sensorbox::api::App;
use sensorbox::config::Config;
use sensorbox::files::FileError;
use sensorbox::ledger::{FjallStore, Repositories};
use sensorbox::messaging::{
    ConsumerHandle, InProcessBus, MessageBus, MessageProducer, RoutingKey, SchemaRegistry,
    Subscription,
};
use sensorbox::models::{
    CustomAttributes, File, FileMetadata, FileStorage, Group, GroupId, NewFile, Platform, Sensor,
    SensorId, Task, TaskId, TaskStatus, UserId,
};
use sensorbox::observability::Metrics;
use sensorbox::tasks::{CreateTaskRequest, TaskError};

struct Harness {
    app: App,
    repos: Repositories,
    bus: Arc<InProcessBus>,
    scheduler: MessageProducer,
    consumer: Option<ConsumerHandle>,
    _temp_dir: TempDir,
}

impl Harness {
    async fn start() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStore::open(temp_dir.path().join("ledger")).unwrap();
        let repos = Repositories::from_store(store.clone());
        let bus = Arc::new(InProcessBus::new(32));

        let app = App::new(Config::default(), store, bus.clone());
        let consumer = app.consumer.clone().spawn(bus.clone()).await.unwrap();

        // Stands in for the scheduler and the storage side
        let scheduler = MessageProducer::new(
            bus.clone(),
            Arc::new(SchemaRegistry::standard()),
            "General",
            Arc::new(Metrics::new()),
        );

        Self {
            app,
            repos,
            bus,
            scheduler,
            consumer: Some(consumer),
            _temp_dir: temp_dir,
        }
    }

    async fn create(&self, request: Value) -> Result<Task, TaskError> {
        let request: CreateTaskRequest = serde_json::from_value(request).unwrap();
        self.app
            .state
            .tasks
            .create_and_schedule_task(UserId::from("user-1"), request)
            .await
    }

    async fn report(&self, routing_key: RoutingKey, message: Value) {
        self.scheduler.send(routing_key, &message).await.unwrap();
    }

    async fn task(&self, id: &TaskId) -> Task {
        self.repos.tasks.find_by_id(id).await.unwrap().unwrap()
    }

    async fn wait_for_task(&self, id: &TaskId, check: impl Fn(&Task) -> bool) -> Task {
        for _ in 0..200 {
            let task = self.task(id).await;
            if check(&task) {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {id} never reached the expected state");
    }

    async fn wait_for_consumed(&self, count: u64) {
        for _ in 0..200 {
            if self.app.state.metrics.snapshot().messages_consumed >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("consumer never handled {count} messages");
    }

    async fn wait_for_file(&self, id: &sensorbox::models::FileId, check: impl Fn(&File) -> bool) -> File {
        for _ in 0..200 {
            let file = self.repos.files.find_by_id(id).await.unwrap().unwrap();
            if check(&file) {
                return file;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("file {id} never reached the expected state");
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.shutdown();
        }
    }
}

fn sensor(id: &str, display_name: Option<&str>) -> Sensor {
    Sensor {
        id: SensorId::from(id),
        name: format!("Sensor {id}"),
        description: None,
        managed_object_id: format!("mo-{id}"),
        managed_object_name: format!("Device {id}"),
        value_fragment_type: "c8y_Temperature".to_string(),
        value_fragment_display_name: display_name.map(str::to_string),
        custom_attributes: CustomAttributes::new(),
    }
}

fn stored_file(name: &str, sensor: &str) -> NewFile {
    NewFile::builder()
        .name(name)
        .storage(FileStorage {
            bucket: "measurements".to_string(),
            path: format!("uploads/{name}"),
        })
        .metadata(FileMetadata {
            sensors: vec![SensorId::from(sensor)],
            date_from: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            date_to: Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()),
            managed_object_id: None,
            managed_object_name: None,
            value_fragments: Vec::new(),
        })
        .build()
}

async fn next_message(subscription: &mut Subscription) -> Value {
    let delivery = tokio::time::timeout(Duration::from_secs(2), subscription.recv())
        .await
        .unwrap()
        .unwrap();
    serde_json::from_slice(&delivery.payload).unwrap()
}

#[tokio::test]
async fn test_group_fetch_runs_to_done_and_reconciles_once() {
    let harness = Harness::start().await;
    for id in ["s1", "s2"] {
        harness.repos.sensors.create(sensor(id, Some("Temperature"))).await.unwrap();
    }
    harness
        .repos
        .groups
        .create(Group {
            id: GroupId::from("plant"),
            name: "Plant".to_string(),
            description: None,
            managed_object_id: Some("mo-plant".to_string()),
            managed_object_name: Some("Plant".to_string()),
            sensors: vec![SensorId::from("s1"), SensorId::from("s2")],
            sub_groups: vec![GroupId::from("hall")],
            custom_attributes: CustomAttributes::new(),
        })
        .await
        .unwrap();
    let mut scheduled = harness
        .bus
        .subscribe(RoutingKey::TaskScheduledDataFetch)
        .await
        .unwrap();

    let task = harness
        .create(json!({
            "name": "plant export",
            "taskType": "DATA_FETCH",
            "payload": {
                "entityType": "GROUP",
                "entities": [{ "id": "plant", "fileName": "plant.csv" }],
                "dateFrom": "2024-01-01T00:00:00Z",
                "dateTo": "2024-01-31T00:00:00Z"
            }
        }))
        .await
        .unwrap();

    // Direct members only; the sub-group is not expanded
    let message = next_message(&mut scheduled).await;
    let data = message["payload"]["data"].as_array().unwrap().clone();
    assert_eq!(data.len(), 2);
    assert!(data.iter().all(|entry| entry["fileName"] == "plant.csv"));
    assert_eq!(message["payload"]["dateFrom"], "2024-01-01T00:00:00.000Z");

    harness
        .report(
            RoutingKey::TaskStatus,
            json!({ "taskId": task.id, "taskType": "DATA_FETCH", "status": "PROCESSING" }),
        )
        .await;
    let processing = harness
        .wait_for_task(&task.id, |task| task.status == TaskStatus::Processing)
        .await;
    assert!(processing.metadata.last_ran_at.is_some());

    let result = json!({
        "taskId": task.id,
        "taskType": "DATA_FETCH",
        "status": "DONE",
        "lastCompletedAt": "2024-02-01T00:00:00.000Z",
        "payload": {
            "data": data.iter().map(|entry| json!({
                "sensorId": entry["sensor"]["id"],
                "dataId": entry["dataId"],
                "fileName": "plant.csv",
                "bucket": "exports",
                "filePath": format!("plant/{}/plant.csv", entry["sensor"]["id"].as_str().unwrap())
            })).collect::<Vec<_>>()
        }
    });
    harness
        .report(RoutingKey::TaskStatusDataFetchResult, result.clone())
        .await;
    let done = harness
        .wait_for_task(&task.id, |task| task.status == TaskStatus::Done)
        .await;
    let first = done.data_fetch_payload().unwrap().data.clone();
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|entry| entry.file_id.is_some()));
    assert_eq!(first[0].bucket.as_deref(), Some("exports"));

    // Redelivery changes nothing
    harness
        .report(RoutingKey::TaskStatusDataFetchResult, result)
        .await;
    harness.wait_for_consumed(3).await;
    let again = harness.task(&task.id).await;
    assert_eq!(again.data_fetch_payload().unwrap().data, first);

    for entry in &first {
        let file = harness
            .repos
            .files
            .find_created_by_task(&task.id, &entry.sensor, "plant.csv")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Some(&file.id), entry.file_id.as_ref());
        assert_eq!(file.metadata.sensors, vec![entry.sensor.clone()]);
    }
}

#[tokio::test]
async fn test_upload_of_file_without_description_is_rejected() {
    let harness = Harness::start().await;
    harness.repos.sensors.create(sensor("bare", None)).await.unwrap();
    let file = harness.repos.files.create(stored_file("bare.csv", "bare")).await.unwrap();

    let result = harness
        .create(json!({
            "taskType": "DATA_UPLOAD",
            "payload": {
                "fileIds": [file.id],
                "platform": { "platformIdentifier": "open-data" }
            }
        }))
        .await;
    assert!(matches!(result, Err(TaskError::UnusableFile { .. })));

    let page = harness
        .app
        .state
        .tasks
        .search_tasks(&Default::default(), &Default::default())
        .await
        .unwrap();
    assert!(page.data.is_empty());
}

#[tokio::test]
async fn test_upload_done_exposes_files_to_platform() {
    let harness = Harness::start().await;
    harness.repos.sensors.create(sensor("s1", Some("Temperature"))).await.unwrap();
    let file = harness.repos.files.create(stored_file("s1.csv", "s1")).await.unwrap();
    let mut scheduled = harness
        .bus
        .subscribe(RoutingKey::TaskScheduledDataUpload)
        .await
        .unwrap();

    let task = harness
        .create(json!({
            "taskType": "DATA_UPLOAD",
            "payload": {
                "fileIds": [file.id],
                "platform": { "platformIdentifier": "open-data" }
            }
        }))
        .await
        .unwrap();

    let message = next_message(&mut scheduled).await;
    assert_eq!(message["payload"]["files"][0]["fileName"], "s1.csv");
    assert_eq!(
        message["payload"]["files"][0]["metadata"]["valueFragmentDescription"],
        "Temperature"
    );

    harness
        .report(
            RoutingKey::TaskStatus,
            json!({ "taskId": task.id, "taskType": "DATA_UPLOAD", "status": "DONE" }),
        )
        .await;

    let exposed = harness
        .wait_for_file(&file.id, |file| {
            !file.visibility_state.exposed_to_platforms.is_empty()
        })
        .await;
    assert_eq!(
        exposed.visibility_state.exposed_to_platforms,
        vec![Platform::new("open-data")]
    );
    assert_eq!(harness.task(&task.id).await.status, TaskStatus::Done);
}

#[tokio::test]
async fn test_object_sync_over_the_bus_is_idempotent() {
    let harness = Harness::start().await;
    let task = harness
        .create(json!({ "name": "sync", "taskType": "OBJECT_SYNC" }))
        .await
        .unwrap();

    let report = json!({
        "taskId": task.id,
        "taskType": "OBJECT_SYNC",
        "status": "PROCESSING",
        "payload": {
            "objects": [
                {
                    "type": "GROUP",
                    "managedObjectId": "g-1",
                    "managedObjectName": "Building",
                    "sensors": [
                        { "managedObjectId": "m-1", "managedObjectName": "Boiler", "valueFragmentType": "c8y_Temperature" }
                    ]
                }
            ]
        }
    });
    harness.report(RoutingKey::TaskStatusObjectSync, report.clone()).await;
    harness.report(RoutingKey::TaskStatusObjectSync, report).await;
    harness.wait_for_consumed(2).await;

    let group = harness
        .repos
        .groups
        .find_by_managed_object_id("g-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.sensors.len(), 1);

    let sensor = harness
        .repos
        .sensors
        .find_by_managed_object("m-1", "Boiler", "c8y_Temperature")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group.sensors[0], sensor.id);
    assert_eq!(harness.task(&task.id).await.status, TaskStatus::Processing);
}

#[tokio::test]
async fn test_visibility_change_round_trip() {
    let harness = Harness::start().await;
    let file = harness.repos.files.create(stored_file("v.csv", "s1")).await.unwrap();
    let mut requests = harness
        .bus
        .subscribe(RoutingKey::FileStatusVisibilityState)
        .await
        .unwrap();
    let files = &harness.app.state.files;

    let changing = files
        .request_visibility_change(&file.id, true, None)
        .await
        .unwrap();
    assert!(changing.visibility_state.state_changing);
    assert!(matches!(
        files.request_visibility_change(&file.id, false, None).await,
        Err(FileError::StateChanging(_))
    ));

    let request = next_message(&mut requests).await;
    assert_eq!(request["published"], true);
    assert_eq!(request["storage"]["bucket"], "measurements");

    harness
        .report(
            RoutingKey::FileResultVisibilityState,
            json!({
                "fileId": file.id,
                "visibilityState": { "published": true, "exposedToPlatforms": [{ "platformIdentifier": "open-data" }] }
            }),
        )
        .await;

    let settled = harness
        .wait_for_file(&file.id, |file| !file.visibility_state.state_changing)
        .await;
    assert!(settled.visibility_state.published);
    assert_eq!(
        settled.visibility_state.exposed_to_platforms,
        vec![Platform::new("open-data")]
    );
}

#[tokio::test]
async fn test_failed_report_records_reason() {
    let harness = Harness::start().await;
    let task = harness
        .create(json!({ "name": "doomed", "taskType": "OBJECT_SYNC" }))
        .await
        .unwrap();

    harness
        .report(
            RoutingKey::TaskStatusFailed,
            json!({ "taskId": task.id, "reason": "platform unreachable" }),
        )
        .await;

    let failed = harness
        .wait_for_task(&task.id, |task| task.status == TaskStatus::Failed)
        .await;
    assert_eq!(
        failed.metadata.last_fail_reason.as_deref(),
        Some("platform unreachable")
    );
    assert!(failed.metadata.last_failed_at.is_some());
}
