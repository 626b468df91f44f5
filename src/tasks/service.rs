use std::sync::Arc;
use tracing::{info, warn};

use crate::ledger::{Page, Paging, Repositories, TaskFilter};
use crate::messaging::messages::TaskModeMessage;
use crate::messaging::{MessageProducer, MessagingError, RoutingKey};
use crate::models::{Task, TaskId, TaskMode, UserId};
use crate::observability::Metrics;

use super::builder::{CreateTaskRequest, TaskBuilder};
use super::error::{Result, TaskError};
use super::mapper::TaskMessageMapper;

/// Entry point for task operations exposed to the HTTP layer
#[derive(Clone)]
pub struct TaskService {
    repos: Repositories,
    builder: TaskBuilder,
    mapper: TaskMessageMapper,
    producer: MessageProducer,
    metrics: Arc<Metrics>,
}

impl TaskService {
    pub fn new(repos: Repositories, producer: MessageProducer, metrics: Arc<Metrics>) -> Self {
        Self {
            builder: TaskBuilder::new(repos.clone()),
            mapper: TaskMessageMapper::new(repos.sensors.clone()),
            repos,
            producer,
            metrics,
        }
    }

    /// Create the task, then publish its scheduled message
    ///
    /// The scheduled message is mapped and validated before anything is
    /// stored. The task stays stored if publishing fails; there is no rollback.
    pub async fn create_and_schedule_task(
        &self,
        user: UserId,
        request: CreateTaskRequest,
    ) -> Result<Task> {
        if let Some(name) = request.name.as_deref() {
            if self.repos.tasks.find_by_name(name.trim()).await?.is_some() {
                return Err(TaskError::DuplicateName(name.trim().to_string()));
            }
        }

        let task = self.builder.build(user, request).await?;

        let message = self.mapper.map_task_to_message(&task).await?;
        let routing_key = RoutingKey::scheduled(task.task_type());
        let value = serde_json::to_value(&message).map_err(MessagingError::from)?;
        let value = self
            .producer
            .registry()
            .validate(routing_key, value)
            .map_err(MessagingError::from)?;

        let task = self.builder.store(task).await?;
        self.metrics.task_created();

        if let Err(err) = self
            .producer
            .publish(self.producer.exchange(), routing_key, &value)
            .await
        {
            warn!(task_id = %task.id, error = %err, "Task stored but scheduling publish failed");
            return Err(err.into());
        }

        info!(task_id = %task.id, %routing_key, "Task scheduled");
        Ok(task)
    }

    pub async fn find_task_by_id(&self, id: &TaskId) -> Result<Task> {
        self.repos
            .tasks
            .find_by_id(id)
            .await?
            .ok_or_else(|| TaskError::not_found("task", id))
    }

    pub async fn search_tasks(&self, filter: &TaskFilter, paging: &Paging) -> Result<Page<Task>> {
        Ok(self.repos.tasks.search(filter, paging).await?)
    }

    /// Ask the scheduler to change `mode`; the stored mode follows on `task.mode.changed`
    pub async fn set_task_mode(&self, task_ids: Vec<TaskId>, mode: TaskMode) -> Result<()> {
        if task_ids.is_empty() {
            return Err(TaskError::InvalidRequest("taskIds must not be empty".to_string()));
        }

        let found = self.repos.tasks.find_many(&task_ids).await?;
        if let Some(missing) = task_ids
            .iter()
            .find(|id| !found.iter().any(|task| &task.id == *id))
        {
            return Err(TaskError::not_found("task", missing));
        }

        let count = task_ids.len();
        self.producer
            .send(RoutingKey::TaskMode, &TaskModeMessage { task_ids, mode })
            .await?;

        info!(count, ?mode, "Task mode change requested");
        Ok(())
    }
}
