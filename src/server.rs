//! HTTP server assembly: shared state, router and the serve loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::api;
use crate::api::envelope::Envelope;
use crate::store::Store;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

async fn healthz(State(_state): State<AppState>) -> Json<Envelope<Value>> {
    Envelope::ok(json!({"status": "ok"}))
}

/// Assemble the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/tasks",
            get(api::tasks::list_tasks).post(api::tasks::create_task),
        )
        .route(
            "/api/tasks/:id",
            get(api::tasks::get_task)
                .put(api::tasks::update_task)
                .delete(api::tasks::delete_task),
        )
        .route(
            "/api/test-executions",
            get(api::executions::list_executions).post(api::executions::submit_execution),
        )
        .route(
            "/api/test-executions/:id",
            get(api::executions::get_execution)
                .put(api::executions::update_execution)
                .delete(api::executions::delete_execution),
        )
        .route("/api/dashboard", get(api::executions::dashboard))
        .with_state(state)
}

/// Bind and serve the API until the process is stopped.
pub fn run(addr: SocketAddr, store: Arc<dyn Store>) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "listening");
        axum::serve(listener, build_router(AppState { store })).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::json::JsonStore;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn spawn_server() -> (TempDir, SocketAddr) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::open(&dir.path().join("store.json")).expect("open store");
        let app = build_router(AppState {
            store: Arc::new(store),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
        (dir, addr)
    }

    async fn send_raw(
        addr: SocketAddr,
        method: &str,
        path: &str,
        body: Option<Value>,
    ) -> (u16, Value) {
        let payload = body.map(|b| b.to_string()).unwrap_or_default();
        let request = format!(
            "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{payload}",
            payload.len()
        );
        let mut stream = tokio::net::TcpStream::connect(addr)
            .await
            .expect("connect server");
        stream
            .write_all(request.as_bytes())
            .await
            .expect("write request");
        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .await
            .expect("read response");
        let (head, body) = response
            .split_once("\r\n\r\n")
            .expect("http response separator");
        let status = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|s| s.parse::<u16>().ok())
            .expect("status");
        let value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(body).expect("json body")
        };
        (status, value)
    }

    fn task_payload() -> Value {
        json!({
            "title": "Login flow",
            "description": "d",
            "tags": ["Bug Fix"],
            "testCases": ["t1"]
        })
    }

    async fn create_task(addr: SocketAddr) -> String {
        let (status, body) = send_raw(addr, "POST", "/api/tasks", Some(task_payload())).await;
        assert_eq!(status, 200);
        body["data"]["id"].as_str().expect("task id").to_string()
    }

    #[tokio::test]
    async fn create_rejects_missing_required_fields_and_persists_nothing() {
        let (_dir, addr) = spawn_server().await;

        let cases = [
            (json!({"description": "d", "testCases": ["t1"], "title": "t"}), "tag"),
            (json!({"tags": ["a"], "testCases": ["t1"], "title": "t"}), "Description"),
            (json!({"tags": ["a"], "description": "d", "title": "t"}), "test case"),
            (json!({"tags": ["a"], "description": "d", "testCases": ["t1"]}), "Title"),
        ];
        for (payload, fragment) in cases {
            let (status, body) = send_raw(addr, "POST", "/api/tasks", Some(payload)).await;
            assert_eq!(status, 400);
            assert_eq!(body["success"], false);
            let error = body["error"].as_str().unwrap();
            assert!(error.contains(fragment), "{error} should name {fragment}");
        }

        let (status, body) = send_raw(addr, "GET", "/api/tasks", None).await;
        assert_eq!(status, 200);
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn malformed_task_id_is_400_and_absent_id_is_404() {
        let (_dir, addr) = spawn_server().await;

        let (status, body) = send_raw(addr, "GET", "/api/tasks/not-a-uuid", None).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Invalid task ID");

        let absent = uuid::Uuid::new_v4();
        let (status, body) = send_raw(addr, "GET", &format!("/api/tasks/{absent}"), None).await;
        assert_eq!(status, 404);
        assert_eq!(body["error"], "Task not found");

        let (status, _) = send_raw(addr, "DELETE", "/api/tasks/not-a-uuid", None).await;
        assert_eq!(status, 400);
        let (status, _) = send_raw(addr, "DELETE", &format!("/api/tasks/{absent}"), None).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn end_to_end_task_and_execution_flow() {
        let (_dir, addr) = spawn_server().await;

        let (status, body) = send_raw(addr, "POST", "/api/tasks", Some(task_payload())).await;
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["testCases"], json!(["t1"]));
        let task_id = body["data"]["id"].as_str().unwrap().to_string();

        let execution = json!({
            "taskId": task_id,
            "testId": "RUN-1",
            "testCases": [{"testCase": "t1", "passed": true}],
            "feedback": "all good",
            "testerName": "alice"
        });
        let (status, body) =
            send_raw(addr, "POST", "/api/test-executions", Some(execution)).await;
        assert_eq!(status, 200);
        assert_eq!(body["data"]["passedTestCases"], 1);
        assert_eq!(body["data"]["totalTestCases"], 1);
        assert_eq!(body["data"]["task"]["description"], "d");
        assert_eq!(body["data"]["task"]["tags"], json!(["Bug Fix"]));
    }

    #[tokio::test]
    async fn resubmitting_a_test_id_updates_in_place() {
        let (_dir, addr) = spawn_server().await;
        let task_id = create_task(addr).await;

        let first = json!({
            "taskId": task_id,
            "testId": "RUN-7",
            "testCases": [{"testCase": "t1", "passed": false}],
            "feedback": "broken",
            "testerName": "alice"
        });
        let (status, body) = send_raw(addr, "POST", "/api/test-executions", Some(first)).await;
        assert_eq!(status, 200);
        assert_eq!(body["message"], "Test execution created successfully");
        let first_id = body["data"]["id"].as_str().unwrap().to_string();

        // Client-supplied counts are ignored; the server re-derives them.
        let second = json!({
            "taskId": task_id,
            "testId": "RUN-7",
            "testCases": [{"testCase": "t1", "passed": true}],
            "feedback": "fixed",
            "testerName": "bob",
            "status": "completed",
            "passedTestCases": 999,
            "totalTestCases": 999
        });
        let (status, body) = send_raw(addr, "POST", "/api/test-executions", Some(second)).await;
        assert_eq!(status, 200);
        assert_eq!(body["message"], "Test execution updated successfully");
        assert_eq!(body["data"]["id"], first_id.as_str());
        assert_eq!(body["data"]["passedTestCases"], 1);
        assert_eq!(body["data"]["totalTestCases"], 1);
        assert_eq!(body["data"]["testerName"], "bob");

        let (status, body) = send_raw(addr, "GET", "/api/test-executions", None).await;
        assert_eq!(status, 200);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn execution_requires_existing_task_and_required_fields() {
        let (_dir, addr) = spawn_server().await;

        let (status, body) = send_raw(
            addr,
            "POST",
            "/api/test-executions",
            Some(json!({"testId": "X"})),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Task ID is required");

        let ghost = uuid::Uuid::new_v4();
        let (status, body) = send_raw(
            addr,
            "POST",
            "/api/test-executions",
            Some(json!({
                "taskId": ghost,
                "testId": "X",
                "testCases": [{"testCase": "t", "passed": true}],
                "feedback": "f",
                "testerName": "t"
            })),
        )
        .await;
        assert_eq!(status, 404);
        assert_eq!(body["error"], "Task not found");
    }

    #[tokio::test]
    async fn deleting_a_task_orphans_but_keeps_its_executions() {
        let (_dir, addr) = spawn_server().await;
        let task_id = create_task(addr).await;

        let execution = json!({
            "taskId": task_id,
            "testId": "RUN-9",
            "testCases": [{"testCase": "t1", "passed": true}],
            "feedback": "fine",
            "testerName": "alice"
        });
        let (status, _) = send_raw(addr, "POST", "/api/test-executions", Some(execution)).await;
        assert_eq!(status, 200);

        let (status, _) = send_raw(addr, "DELETE", &format!("/api/tasks/{task_id}"), None).await;
        assert_eq!(status, 200);

        let (status, body) = send_raw(addr, "GET", "/api/test-executions", None).await;
        assert_eq!(status, 200);
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["taskId"], task_id.as_str());
        assert_eq!(rows[0]["task"], Value::Null);
    }

    #[tokio::test]
    async fn execution_list_filters_and_sorts() {
        let (_dir, addr) = spawn_server().await;
        let task_id = create_task(addr).await;

        for (test_id, tester, passed, status_text) in [
            ("ALPHA-1", "alice", true, "completed"),
            ("BETA-2", "bob", false, "failed"),
            ("ALPHA-3", "carol", true, "completed"),
        ] {
            let execution = json!({
                "taskId": task_id,
                "testId": test_id,
                "testCases": [{"testCase": "t1", "passed": passed}],
                "feedback": "routine pass over the build",
                "testerName": tester,
                "status": status_text
            });
            let (status, _) =
                send_raw(addr, "POST", "/api/test-executions", Some(execution)).await;
            assert_eq!(status, 200);
        }

        let (_, body) = send_raw(addr, "GET", "/api/test-executions?testId=alpha", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (_, body) =
            send_raw(addr, "GET", "/api/test-executions?status=failed", None).await;
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["testId"], "BETA-2");

        let (_, body) = send_raw(addr, "GET", "/api/test-executions?search=CAROL", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (_, body) = send_raw(
            addr,
            "GET",
            "/api/test-executions?sortBy=testId&sortOrder=asc",
            None,
        )
        .await;
        let ids: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["testId"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["ALPHA-1", "ALPHA-3", "BETA-2"]);
    }

    #[tokio::test]
    async fn update_task_preserves_created_at_and_revalidates() {
        let (_dir, addr) = spawn_server().await;
        let task_id = create_task(addr).await;

        let (_, body) = send_raw(addr, "GET", &format!("/api/tasks/{task_id}"), None).await;
        let created_at = body["data"]["createdAt"].as_i64().unwrap();

        let (status, body) = send_raw(
            addr,
            "PUT",
            &format!("/api/tasks/{task_id}"),
            Some(json!({"title": "t", "description": "d2", "tags": [], "testCases": ["t1"]})),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "At least one tag is required");

        let (status, body) = send_raw(
            addr,
            "PUT",
            &format!("/api/tasks/{task_id}"),
            Some(json!({
                "title": "Login flow",
                "description": "updated",
                "tags": ["Bug Fix"],
                "testCases": ["t1", "t2"]
            })),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["data"]["description"], "updated");
        assert_eq!(body["data"]["createdAt"].as_i64().unwrap(), created_at);
    }

    #[tokio::test]
    async fn dashboard_aggregates_counts_and_pass_rate() {
        let (_dir, addr) = spawn_server().await;
        let task_id = create_task(addr).await;

        for (test_id, cases, status_text) in [
            ("D-1", json!([{"testCase": "a", "passed": true}, {"testCase": "b", "passed": true}]), "completed"),
            ("D-2", json!([{"testCase": "a", "passed": false}, {"testCase": "b", "passed": true}]), "failed"),
        ] {
            let execution = json!({
                "taskId": task_id,
                "testId": test_id,
                "testCases": cases,
                "feedback": "f",
                "testerName": "alice",
                "status": status_text
            });
            let (status, _) =
                send_raw(addr, "POST", "/api/test-executions", Some(execution)).await;
            assert_eq!(status, 200);
        }

        let (status, body) = send_raw(addr, "GET", "/api/dashboard", None).await;
        assert_eq!(status, 200);
        let stats = &body["data"];
        assert_eq!(stats["totalTasks"], 1);
        assert_eq!(stats["totalExecutions"], 2);
        assert_eq!(stats["completedExecutions"], 1);
        assert_eq!(stats["failedExecutions"], 1);
        assert_eq!(stats["averagePassRate"].as_f64().unwrap(), 75.0);
        assert_eq!(stats["recentExecutions"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn execution_delete_and_get_by_id() {
        let (_dir, addr) = spawn_server().await;
        let task_id = create_task(addr).await;

        let execution = json!({
            "taskId": task_id,
            "testId": "DEL-1",
            "testCases": [{"testCase": "t1", "passed": true}],
            "feedback": "f",
            "testerName": "alice"
        });
        let (_, body) = send_raw(addr, "POST", "/api/test-executions", Some(execution)).await;
        let run_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send_raw(
            addr,
            "GET",
            &format!("/api/test-executions/{run_id}"),
            None,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["data"]["testId"], "DEL-1");

        let (status, _) = send_raw(
            addr,
            "DELETE",
            &format!("/api/test-executions/{run_id}"),
            None,
        )
        .await;
        assert_eq!(status, 200);

        let (status, _) = send_raw(
            addr,
            "DELETE",
            &format!("/api/test-executions/{run_id}"),
            None,
        )
        .await;
        assert_eq!(status, 404);
    }
}
