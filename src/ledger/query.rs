//! Task search filters and pagination

use bon::Builder;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::{Task, TaskMode, TaskStatus, TaskType, UserId};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Task search filter; `None` fields are left out of the query
#[derive(Debug, Clone, Default, Builder)]
pub struct TaskFilter {
    #[builder(into)]
    pub name: Option<String>,
    pub task_type: Option<TaskType>,
    pub status: Option<TaskStatus>,
    pub mode: Option<TaskMode>,
    pub initiated_by_user: Option<UserId>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.name.as_ref().is_none_or(|name| &task.name == name)
            && self.task_type.is_none_or(|task_type| task.task_type() == task_type)
            && self.status.is_none_or(|status| task.status == status)
            && self.mode.is_none_or(|mode| task.mode == mode)
            && self
                .initiated_by_user
                .as_ref()
                .is_none_or(|user| &task.initiated_by_user == user)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Name,
    #[default]
    CreatedAt,
    Status,
}

#[derive(Debug, Clone, Builder)]
pub struct Paging {
    #[builder(default = DEFAULT_PAGE_SIZE)]
    pub page_size: u64,
    /// 1-based
    #[builder(default = 1)]
    pub current_page: u64,
    #[builder(default)]
    pub sort_by: SortField,
    #[builder(default)]
    pub sort_descending: bool,
    #[builder(default)]
    pub with_total_count: bool,
}

impl Default for Paging {
    fn default() -> Self {
        Paging::builder().build()
    }
}

impl Paging {
    pub fn limit(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_SIZE) as usize
    }

    pub fn skip(&self) -> usize {
        (self.current_page.max(1) as usize - 1) * self.limit()
    }

    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let ordering = match self.sort_by {
            SortField::Name => a.name.cmp(&b.name),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        }
        .then_with(|| a.id.cmp(&b.id));

        if self.sort_descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: u64,
    pub page_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page_info: PageInfo,
}

impl<T> Page<T> {
    /// Slice an already filtered and sorted result set
    pub fn from_sorted(items: Vec<T>, paging: &Paging) -> Self {
        let total = items.len() as u64;
        let limit = paging.limit();
        let data: Vec<T> = items.into_iter().skip(paging.skip()).take(limit).collect();

        let (total_items, total_pages) = if paging.with_total_count {
            (Some(total), Some(total.div_ceil(limit as u64)))
        } else {
            (None, None)
        };

        Page {
            data,
            page_info: PageInfo {
                current_page: paging.current_page.max(1),
                page_size: limit as u64,
                total_items,
                total_pages,
            },
        }
    }
}
