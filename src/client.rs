//! Blocking API client and the shared UI data context.
//!
//! The context mirrors what the web UI kept in memory: the current
//! collections, a loading flag and the last error. Every mutation is followed
//! by a full re-fetch of the affected list; there is no incremental cache
//! update.

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::executions::{DashboardStats, ExecutionView};
use crate::execution::ExecutionDraft;
use crate::fields::{SortField, SortOrder};
use crate::task::{Task, TaskDraft};

/// Errors surfaced to the UI and the CLI.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with `success: false`.
    #[error("{0}")]
    Api(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct WireEnvelope<T> {
    success: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Filters forwarded to the execution list endpoint.
#[derive(Debug, Default, Clone)]
pub struct ExecutionFilter {
    pub status: Option<String>,
    pub task_id: Option<Uuid>,
    pub test_id: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
}

impl ExecutionFilter {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = &self.status {
            pairs.push(("status", status.clone()));
        }
        if let Some(task_id) = &self.task_id {
            pairs.push(("taskId", task_id.to_string()));
        }
        if let Some(test_id) = &self.test_id {
            pairs.push(("testId", test_id.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(sort_by) = self.sort_by {
            pairs.push(("sortBy", sort_by.as_str().to_string()));
        }
        if let Some(sort_order) = self.sort_order {
            pairs.push(("sortOrder", sort_order.as_str().to_string()));
        }
        pairs
    }
}

/// Typed wrapper over the HTTP API.
pub struct ApiClient {
    base: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base: &str) -> Self {
        ApiClient {
            base: base.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Unwrap the `{success, data, error, message}` envelope, turning
    /// `success: false` into a [`ClientError::Api`].
    fn unwrap_envelope<T: DeserializeOwned>(
        response: Response,
    ) -> Result<(Option<T>, Option<String>), ClientError> {
        let envelope: WireEnvelope<T> = response.json()?;
        if envelope.success {
            Ok((envelope.data, envelope.message))
        } else {
            Err(ClientError::Api(
                envelope.error.unwrap_or_else(|| "request failed".into()),
            ))
        }
    }

    fn expect_data<T: DeserializeOwned>(
        response: Response,
    ) -> Result<(T, Option<String>), ClientError> {
        let (data, message) = Self::unwrap_envelope(response)?;
        data.map(|d| (d, message))
            .ok_or_else(|| ClientError::Api("response carried no data".into()))
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let response = self.http.get(self.url("/api/tasks")).send()?;
        Ok(Self::expect_data(response)?.0)
    }

    pub fn get_task(&self, id: Uuid) -> Result<Task, ClientError> {
        let response = self.http.get(self.url(&format!("/api/tasks/{id}"))).send()?;
        Ok(Self::expect_data(response)?.0)
    }

    pub fn create_task(&self, draft: &TaskDraft) -> Result<Task, ClientError> {
        let response = self.http.post(self.url("/api/tasks")).json(draft).send()?;
        Ok(Self::expect_data(response)?.0)
    }

    pub fn update_task(&self, id: Uuid, draft: &TaskDraft) -> Result<Task, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("/api/tasks/{id}")))
            .json(draft)
            .send()?;
        Ok(Self::expect_data(response)?.0)
    }

    pub fn delete_task(&self, id: Uuid) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/api/tasks/{id}")))
            .send()?;
        Self::unwrap_envelope::<serde_json::Value>(response)?;
        Ok(())
    }

    pub fn list_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> Result<Vec<ExecutionView>, ClientError> {
        let response = self
            .http
            .get(self.url("/api/test-executions"))
            .query(&filter.query_pairs())
            .send()?;
        Ok(Self::expect_data(response)?.0)
    }

    /// Submit a run; the server decides between create and overwrite based on
    /// the test id. The returned message says which happened.
    pub fn submit_execution(
        &self,
        draft: &ExecutionDraft,
    ) -> Result<(ExecutionView, Option<String>), ClientError> {
        let response = self
            .http
            .post(self.url("/api/test-executions"))
            .json(draft)
            .send()?;
        Self::expect_data(response)
    }

    pub fn delete_execution(&self, id: Uuid) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.url(&format!("/api/test-executions/{id}")))
            .send()?;
        Self::unwrap_envelope::<serde_json::Value>(response)?;
        Ok(())
    }

    pub fn dashboard(&self) -> Result<DashboardStats, ClientError> {
        let response = self.http.get(self.url("/api/dashboard")).send()?;
        Ok(Self::expect_data(response)?.0)
    }
}

/// Client-side data context shared by the UI.
pub struct DataContext {
    api: ApiClient,
    pub tasks: Vec<Task>,
    pub executions: Vec<ExecutionView>,
    pub stats: Option<DashboardStats>,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl DataContext {
    pub fn new(api: ApiClient) -> Self {
        DataContext {
            api,
            tasks: Vec::new(),
            executions: Vec::new(),
            stats: None,
            loading: false,
            last_error: None,
        }
    }

    fn track<T>(&mut self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        self.loading = false;
        if let Err(e) = &result {
            self.last_error = Some(e.to_string());
        }
        result
    }

    fn begin(&mut self) {
        self.loading = true;
        self.last_error = None;
    }

    pub fn refresh_tasks(&mut self) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.list_tasks();
        let tasks = self.track(result)?;
        self.tasks = tasks;
        Ok(())
    }

    pub fn refresh_executions(&mut self, filter: &ExecutionFilter) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.list_executions(filter);
        let executions = self.track(result)?;
        self.executions = executions;
        Ok(())
    }

    pub fn refresh_stats(&mut self) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.dashboard();
        let stats = self.track(result)?;
        self.stats = Some(stats);
        Ok(())
    }

    pub fn create_task(&mut self, draft: &TaskDraft) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.create_task(draft);
        self.track(result)?;
        self.refresh_tasks()
    }

    pub fn update_task(&mut self, id: Uuid, draft: &TaskDraft) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.update_task(id, draft);
        self.track(result)?;
        self.refresh_tasks()
    }

    pub fn delete_task(&mut self, id: Uuid) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.delete_task(id);
        self.track(result)?;
        self.refresh_tasks()
    }

    /// Submit a run and re-fetch the execution list with the given filter.
    pub fn submit_execution(
        &mut self,
        draft: &ExecutionDraft,
        filter: &ExecutionFilter,
    ) -> Result<Option<String>, ClientError> {
        self.begin();
        let result = self.api.submit_execution(draft);
        let (_, message) = self.track(result)?;
        self.refresh_executions(filter)?;
        Ok(message)
    }

    pub fn delete_execution(
        &mut self,
        id: Uuid,
        filter: &ExecutionFilter,
    ) -> Result<(), ClientError> {
        self.begin();
        let result = self.api.delete_execution(id);
        self.track(result)?;
        self.refresh_executions(filter)
    }

    pub fn task_by_id(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::TestCaseResult;
    use crate::server::{build_router, AppState};
    use crate::store::json::JsonStore;
    use std::sync::Arc;

    /// Serve the API from a background thread with its own runtime so the
    /// blocking client can be exercised end to end.
    fn spawn_server() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::open(&dir.path().join("store.json")).expect("open store");
        let app = build_router(AppState {
            store: Arc::new(store),
        });
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind listener");
        listener.set_nonblocking(true).expect("nonblocking");
        let addr = listener.local_addr().expect("local addr");
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            runtime.block_on(async move {
                let listener =
                    tokio::net::TcpListener::from_std(listener).expect("tokio listener");
                axum::serve(listener, app).await.expect("serve app");
            });
        });
        (dir, format!("http://{addr}"))
    }

    fn task_draft() -> TaskDraft {
        TaskDraft {
            title: "Login flow".into(),
            description: "Verify the login page".into(),
            tags: vec!["auth".into()],
            test_cases: vec!["t1".into()],
            ..TaskDraft::default()
        }
    }

    #[test]
    fn context_refetches_after_every_mutation() {
        let (_dir, base) = spawn_server();
        let mut ctx = DataContext::new(ApiClient::new(&base));

        ctx.refresh_tasks().unwrap();
        assert!(ctx.tasks.is_empty());
        assert!(!ctx.loading);

        ctx.create_task(&task_draft()).unwrap();
        assert_eq!(ctx.tasks.len(), 1);
        let task_id = ctx.tasks[0].id;

        let draft = ExecutionDraft {
            task_id: Some(task_id.to_string()),
            test_id: "CLI-1".into(),
            test_cases: vec![TestCaseResult {
                test_case: "t1".into(),
                passed: true,
                notes: None,
            }],
            feedback: "fine".into(),
            tester_name: "alice".into(),
            ..ExecutionDraft::default()
        };
        let filter = ExecutionFilter::default();
        let message = ctx.submit_execution(&draft, &filter).unwrap();
        assert_eq!(message.as_deref(), Some("Test execution created successfully"));
        assert_eq!(ctx.executions.len(), 1);
        assert_eq!(ctx.executions[0].execution.passed_test_cases, 1);

        ctx.delete_task(task_id).unwrap();
        assert!(ctx.tasks.is_empty());
        // The run survives the task deletion, now orphaned.
        ctx.refresh_executions(&filter).unwrap();
        assert_eq!(ctx.executions.len(), 1);
        assert!(ctx.executions[0].task.is_none());
    }

    #[test]
    fn validation_errors_surface_as_api_errors() {
        let (_dir, base) = spawn_server();
        let mut ctx = DataContext::new(ApiClient::new(&base));

        let mut invalid = task_draft();
        invalid.tags.clear();
        let err = ctx.create_task(&invalid).unwrap_err();
        assert!(matches!(err, ClientError::Api(_)));
        assert_eq!(
            ctx.last_error.as_deref(),
            Some("At least one tag is required")
        );
    }
}
