//! Task CRUD handlers.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use crate::api::envelope::{ok_message, ApiError, Envelope};
use crate::server::AppState;
use crate::task::{Task, TaskDraft};

fn parse_task_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid task ID"))
}

/// `GET /api/tasks` — all tasks, newest first.
pub(crate) async fn list_tasks(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<Task>>>, ApiError> {
    let mut tasks = state
        .store
        .list_tasks()
        .map_err(|e| ApiError::internal("Failed to fetch tasks", e))?;
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(Envelope::ok(tasks))
}

/// `POST /api/tasks` — create after canonical validation.
pub(crate) async fn create_task(
    State(state): State<AppState>,
    Json(draft): Json<TaskDraft>,
) -> Result<Json<Envelope<Task>>, ApiError> {
    draft.validate().map_err(ApiError::bad_request)?;
    let now = Utc::now().timestamp();
    let task = draft.into_task(Uuid::new_v4(), now, now);
    state
        .store
        .insert_task(&task)
        .map_err(|e| ApiError::internal("Failed to create task", e))?;
    Ok(Envelope::ok_with_message(task, "Task created successfully"))
}

/// `GET /api/tasks/{id}`.
pub(crate) async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Task>>, ApiError> {
    let id = parse_task_id(&id)?;
    let task = state
        .store
        .get_task(id)
        .map_err(|e| ApiError::internal("Failed to fetch task", e))?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    Ok(Envelope::ok(task))
}

/// `PUT /api/tasks/{id}` — full replacement with the same validation as
/// create; `createdAt` is preserved.
pub(crate) async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<TaskDraft>,
) -> Result<Json<Envelope<Task>>, ApiError> {
    let id = parse_task_id(&id)?;
    draft.validate().map_err(ApiError::bad_request)?;
    let existing = state
        .store
        .get_task(id)
        .map_err(|e| ApiError::internal("Failed to update task", e))?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    let task = draft.into_task(id, existing.created_at, Utc::now().timestamp());
    let updated = state
        .store
        .update_task(&task)
        .map_err(|e| ApiError::internal("Failed to update task", e))?;
    if !updated {
        return Err(ApiError::not_found("Task not found"));
    }
    Ok(Envelope::ok_with_message(task, "Task updated successfully"))
}

/// `DELETE /api/tasks/{id}` — executions referencing the task are left in
/// place.
pub(crate) async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let id = parse_task_id(&id)?;
    let deleted = state
        .store
        .delete_task(id)
        .map_err(|e| ApiError::internal("Failed to delete task", e))?;
    if !deleted {
        return Err(ApiError::not_found("Task not found"));
    }
    Ok(ok_message("Task deleted successfully"))
}
