//! Test-execution handlers: filtered listing, create-or-overwrite by test id,
//! per-record operations and the aggregate dashboard.

use std::cmp::Ordering;
use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::envelope::{ok_message, ApiError, Envelope};
use crate::execution::{ExecutionDraft, TestExecution};
use crate::fields::{parse_sort_field, parse_sort_order, RunStatus, SortField, SortOrder};
use crate::server::AppState;
use crate::task::Task;

/// Query parameters accepted by the execution list endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExecutionQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub test_id: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    // Kept as free text so an unknown sort key degrades to the default
    // instead of rejecting the request.
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
}

/// Expanded task reference carried on each execution row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRef {
    pub id: Uuid,
    pub description: String,
    pub tags: Vec<String>,
}

/// Execution row with the task reference expanded. `task` is null when the
/// referenced task has been deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionView {
    #[serde(flatten)]
    pub execution: TestExecution,
    pub task: Option<TaskRef>,
}

/// Aggregate dashboard statistics.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_tasks: usize,
    pub total_executions: usize,
    pub completed_executions: usize,
    pub in_progress_executions: usize,
    pub pending_executions: usize,
    pub failed_executions: usize,
    /// Percentage of passed test cases across all runs; 0 when none exist.
    pub average_pass_rate: f64,
    /// The five most recent runs.
    pub recent_executions: Vec<ExecutionView>,
}

fn expand(run: TestExecution, tasks: &HashMap<Uuid, Task>) -> ExecutionView {
    let task = tasks.get(&run.task_id).map(|t| TaskRef {
        id: t.id,
        description: t.description.clone(),
        tags: t.tags.clone(),
    });
    ExecutionView {
        execution: run,
        task,
    }
}

fn task_index(state: &AppState) -> Result<HashMap<Uuid, Task>, ApiError> {
    let tasks = state
        .store
        .list_tasks()
        .map_err(|e| ApiError::internal("Failed to fetch test executions", e))?;
    Ok(tasks.into_iter().map(|t| (t.id, t)).collect())
}

fn matches_query(run: &TestExecution, query: &ExecutionQuery) -> bool {
    // Empty parameters mean "no filter", same as leaving them off.
    fn given(param: &Option<String>) -> Option<&str> {
        param.as_deref().filter(|v| !v.is_empty())
    }

    if let Some(status) = given(&query.status) {
        if status != "all" && run.status.as_str() != status {
            return false;
        }
    }
    if let Some(task_id) = given(&query.task_id) {
        if run.task_id.to_string() != task_id {
            return false;
        }
    }
    if let Some(test_id) = given(&query.test_id) {
        if !run
            .test_id
            .to_lowercase()
            .contains(&test_id.to_lowercase())
        {
            return false;
        }
    }
    if let Some(search) = given(&query.search) {
        let needle = search.to_lowercase();
        let hit = run.test_id.to_lowercase().contains(&needle)
            || run.tester_name.to_lowercase().contains(&needle)
            || run.feedback.to_lowercase().contains(&needle);
        if !hit {
            return false;
        }
    }
    true
}

fn sort_runs(runs: &mut [TestExecution], field: SortField, order: SortOrder) {
    runs.sort_by(|a, b| {
        let ordering = match field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::TestId => a.test_id.cmp(&b.test_id),
            SortField::TesterName => a.tester_name.cmp(&b.tester_name),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        };
        // Stable tiebreak so equal keys keep a deterministic order.
        let ordering = ordering.then_with(|| a.id.cmp(&b.id));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// `GET /api/test-executions` — filtered, sorted, with task refs expanded.
pub(crate) async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ExecutionQuery>,
) -> Result<Json<Envelope<Vec<ExecutionView>>>, ApiError> {
    let mut runs: Vec<TestExecution> = state
        .store
        .list_executions()
        .map_err(|e| ApiError::internal("Failed to fetch test executions", e))?
        .into_iter()
        .filter(|run| matches_query(run, &query))
        .collect();
    sort_runs(
        &mut runs,
        query
            .sort_by
            .as_deref()
            .map(parse_sort_field)
            .unwrap_or_default(),
        query
            .sort_order
            .as_deref()
            .map(parse_sort_order)
            .unwrap_or_default(),
    );

    let tasks = task_index(&state)?;
    let views = runs.into_iter().map(|run| expand(run, &tasks)).collect();
    Ok(Envelope::ok(views))
}

/// `POST /api/test-executions` — create, or overwrite the run that already
/// carries the submitted test id.
pub(crate) async fn submit_execution(
    State(state): State<AppState>,
    Json(draft): Json<ExecutionDraft>,
) -> Result<Json<Envelope<ExecutionView>>, ApiError> {
    let task_id = draft.validate().map_err(ApiError::bad_request)?;
    let task = state
        .store
        .get_task(task_id)
        .map_err(|e| ApiError::internal("Failed to create test execution", e))?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    let now = Utc::now().timestamp();
    let existing = state
        .store
        .find_execution_by_test_id(draft.test_id.trim())
        .map_err(|e| ApiError::internal("Failed to create test execution", e))?;

    let (run, message) = match existing {
        Some(previous) => {
            let run = draft.into_execution(previous.id, task_id, previous.created_at, now);
            state
                .store
                .update_execution(&run)
                .map_err(|e| ApiError::internal("Failed to update test execution", e))?;
            (run, "Test execution updated successfully")
        }
        None => {
            let run = draft.into_execution(Uuid::new_v4(), task_id, now, now);
            state
                .store
                .insert_execution(&run)
                .map_err(|e| ApiError::internal("Failed to create test execution", e))?;
            (run, "Test execution created successfully")
        }
    };

    let view = ExecutionView {
        execution: run,
        task: Some(TaskRef {
            id: task.id,
            description: task.description,
            tags: task.tags,
        }),
    };
    Ok(Envelope::ok_with_message(view, message))
}

fn parse_execution_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid test execution ID"))
}

/// `GET /api/test-executions/{id}`.
pub(crate) async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ExecutionView>>, ApiError> {
    let id = parse_execution_id(&id)?;
    let run = state
        .store
        .get_execution(id)
        .map_err(|e| ApiError::internal("Failed to fetch test execution", e))?
        .ok_or_else(|| ApiError::not_found("Test execution not found"))?;
    let tasks = task_index(&state)?;
    Ok(Envelope::ok(expand(run, &tasks)))
}

/// `PUT /api/test-executions/{id}` — re-validates and re-derives counts;
/// `createdAt` is preserved.
pub(crate) async fn update_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<ExecutionDraft>,
) -> Result<Json<Envelope<ExecutionView>>, ApiError> {
    let id = parse_execution_id(&id)?;
    let task_id = draft.validate().map_err(ApiError::bad_request)?;
    let task = state
        .store
        .get_task(task_id)
        .map_err(|e| ApiError::internal("Failed to update test execution", e))?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    let existing = state
        .store
        .get_execution(id)
        .map_err(|e| ApiError::internal("Failed to update test execution", e))?
        .ok_or_else(|| ApiError::not_found("Test execution not found"))?;

    let run = draft.into_execution(id, task_id, existing.created_at, Utc::now().timestamp());
    state
        .store
        .update_execution(&run)
        .map_err(|e| ApiError::internal("Failed to update test execution", e))?;

    let view = ExecutionView {
        execution: run,
        task: Some(TaskRef {
            id: task.id,
            description: task.description,
            tags: task.tags,
        }),
    };
    Ok(Envelope::ok_with_message(
        view,
        "Test execution updated successfully",
    ))
}

/// `DELETE /api/test-executions/{id}`.
pub(crate) async fn delete_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let id = parse_execution_id(&id)?;
    let deleted = state
        .store
        .delete_execution(id)
        .map_err(|e| ApiError::internal("Failed to delete test execution", e))?;
    if !deleted {
        return Err(ApiError::not_found("Test execution not found"));
    }
    Ok(ok_message("Test execution deleted successfully"))
}

/// `GET /api/dashboard` — aggregate statistics for the dashboard view.
pub(crate) async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<Envelope<DashboardStats>>, ApiError> {
    let tasks = task_index(&state)?;
    let mut runs = state
        .store
        .list_executions()
        .map_err(|e| ApiError::internal("Failed to fetch dashboard statistics", e))?;

    let total_passed: usize = runs.iter().map(|r| r.passed_test_cases).sum();
    let total_cases: usize = runs.iter().map(|r| r.total_test_cases).sum();
    let average_pass_rate = if total_cases > 0 {
        (total_passed as f64 / total_cases as f64) * 100.0
    } else {
        0.0
    };

    let count_status =
        |status: RunStatus| -> usize { runs.iter().filter(|r| r.status == status).count() };
    let completed_executions = count_status(RunStatus::Completed);
    let in_progress_executions = count_status(RunStatus::InProgress);
    let pending_executions = count_status(RunStatus::Pending);
    let failed_executions = count_status(RunStatus::Failed);

    runs.sort_by(|a, b| match b.created_at.cmp(&a.created_at) {
        Ordering::Equal => b.id.cmp(&a.id),
        other => other,
    });
    let stats = DashboardStats {
        total_tasks: tasks.len(),
        total_executions: runs.len(),
        completed_executions,
        in_progress_executions,
        pending_executions,
        failed_executions,
        average_pass_rate,
        recent_executions: runs
            .into_iter()
            .take(5)
            .map(|run| expand(run, &tasks))
            .collect(),
    };
    Ok(Envelope::ok(stats))
}
