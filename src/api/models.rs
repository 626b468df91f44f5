//! Request and response bodies of the HTTP surface
//!
//! Task creation takes [`CreateTaskRequest`](crate::tasks::CreateTaskRequest)
//! directly; everything else is defined here.

use serde::{Deserialize, Serialize};

use crate::ledger::{Paging, SortField, StoreStats, TaskFilter, DEFAULT_PAGE_SIZE};
use crate::models::{FileId, Platform, TaskId, TaskMode, TaskStatus, TaskType, UserId};
use crate::observability::MetricsSnapshot;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub bus: bool,
    pub store: StoreStats,
    pub metrics: MetricsSnapshot,
    pub version: &'static str,
}

/// `GET /tasks` query string
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSearchQuery {
    pub name: Option<String>,
    pub task_type: Option<TaskType>,
    pub status: Option<TaskStatus>,
    pub mode: Option<TaskMode>,
    pub initiated_by_user: Option<UserId>,
    pub page_size: Option<u64>,
    pub current_page: Option<u64>,
    pub sort_by: Option<SortField>,
    #[serde(default)]
    pub sort_descending: bool,
    #[serde(default)]
    pub with_total_count: bool,
}

impl TaskSearchQuery {
    pub fn filter(&self) -> TaskFilter {
        TaskFilter {
            name: self.name.clone(),
            task_type: self.task_type,
            status: self.status,
            mode: self.mode,
            initiated_by_user: self.initiated_by_user.clone(),
        }
    }

    pub fn paging(&self) -> Paging {
        Paging::builder()
            .page_size(self.page_size.unwrap_or(DEFAULT_PAGE_SIZE))
            .current_page(self.current_page.unwrap_or(1))
            .sort_by(self.sort_by.unwrap_or_default())
            .sort_descending(self.sort_descending)
            .with_total_count(self.with_total_count)
            .build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskModeRequest {
    pub task_ids: Vec<TaskId>,
    pub mode: TaskMode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    pub published: bool,
    #[serde(default)]
    pub exposed_to_platforms: Option<Vec<Platform>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFilesRequest {
    pub file_ids: Vec<FileId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteFilesResponse {
    pub deleted: usize,
}
