use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::info;

use super::error::ApiError;
use super::models::{
    DeleteFilesRequest, DeleteFilesResponse, HealthResponse, TaskModeRequest, TaskSearchQuery,
    VisibilityRequest,
};
use super::state::AppState;
use crate::models::{FileId, TaskId, User, UserId};
use crate::messaging::MessagingError;
use crate::tasks::CreateTaskRequest;

const USER_HEADER: &str = "X-User-Id";

fn user_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::from)
        .ok_or(ApiError::MissingUser)
}

/// `POST /tasks`: create the task and publish its scheduled message
pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user = user_id(&headers)?;
    let Json(request) = payload?;

    let task = state.tasks.create_and_schedule_task(user, request).await?;
    info!(task_id = %task.id, task_type = %task.task_type(), "Task created via API");
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.tasks.find_task_by_id(&TaskId::from(id)).await?;
    Ok(Json(task))
}

pub async fn search_tasks(
    State(state): State<AppState>,
    query: Result<Query<TaskSearchQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let page = state
        .tasks
        .search_tasks(&query.filter(), &query.paging())
        .await?;
    Ok(Json(page))
}

/// `POST /tasks/mode`: accepted, the stored mode follows once the scheduler confirms
pub async fn set_task_mode(
    State(state): State<AppState>,
    payload: Result<Json<TaskModeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    state
        .tasks
        .set_task_mode(request.task_ids, request.mode)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn request_visibility(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<VisibilityRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let file = state
        .files
        .request_visibility_change(
            &FileId::from(id),
            request.published,
            request.exposed_to_platforms,
        )
        .await?;
    Ok((StatusCode::ACCEPTED, Json(file)))
}

pub async fn delete_files(
    State(state): State<AppState>,
    payload: Result<Json<DeleteFilesRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let deleted = state.files.delete_files(&request.file_ids).await?;
    Ok(Json(DeleteFilesResponse { deleted }))
}

/// `POST /users`: forward a user change to the services mirroring users
pub async fn publish_user(
    State(state): State<AppState>,
    payload: Result<Json<User>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(user) = payload?;
    state.users.publish_user(&user).await.map_err(|err| match err {
        MessagingError::Schema(err) => ApiError::InvalidPayload(err.to_string()),
        other => ApiError::Internal(other.to_string()),
    })?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state
        .store
        .stats()
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    let bus = state.bus.health().await;

    let response = HealthResponse {
        status: if bus { "ok" } else { "degraded" },
        bus,
        store,
        metrics: state.metrics.snapshot(),
        version: env!("CARGO_PKG_VERSION"),
    };
    let status = if bus {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((status, Json(response)))
}
