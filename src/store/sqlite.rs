//! Relational backend over SQLite.
//!
//! Schema changes go through numbered migrations gated on `PRAGMA
//! user_version`. List-valued fields (tags, test cases, images) are stored as
//! JSON text columns. There is deliberately no foreign key from
//! `test_executions.task_id` to `tasks`: the reference is non-owning and
//! deleting a task must leave its runs behind.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::execution::{TestCaseResult, TestExecution};
use crate::fields::{parse_priority, parse_run_status, parse_task_status};
use crate::store::{Store, StoreError};
use crate::task::Task;

const DB_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and bring the schema up to date.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        initialize_schema(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("connection mutex poisoned")
    }
}

fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        // Future schema; keep reads working for forward-compatible changes.
        conn.pragma_update(None, "user_version", version)?;
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            status TEXT CHECK(status IN ('pending', 'in-progress', 'completed', 'failed')) DEFAULT 'pending',
            priority TEXT CHECK(priority IN ('low', 'medium', 'high')) DEFAULT 'medium',
            assignee TEXT,
            due_date TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            test_cases TEXT NOT NULL DEFAULT '[]',
            notes TEXT NOT NULL DEFAULT '',
            attached_images TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS test_executions (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL,
            test_id TEXT NOT NULL UNIQUE,
            test_cases TEXT NOT NULL DEFAULT '[]',
            status TEXT CHECK(status IN ('pending', 'in-progress', 'completed', 'failed')) DEFAULT 'pending',
            feedback TEXT NOT NULL,
            tester_name TEXT NOT NULL,
            attached_images TEXT NOT NULL DEFAULT '[]',
            passed_test_cases INTEGER NOT NULL DEFAULT 0,
            total_test_cases INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_executions_task_id ON test_executions(task_id);
        CREATE INDEX IF NOT EXISTS idx_executions_status ON test_executions(status);
        CREATE INDEX IF NOT EXISTS idx_executions_created_at ON test_executions(created_at);
        ",
    )
}

fn json_column<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    let priority: String = row.get(4)?;
    let due_date: Option<String> = row.get(6)?;
    Ok(Task {
        id: uuid_column(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_task_status(&status),
        priority: parse_priority(&priority),
        assignee: row.get(5)?,
        due_date: due_date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        tags: json_column(row, 7)?,
        test_cases: json_column(row, 8)?,
        notes: row.get(9)?,
        attached_images: json_column(row, 10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn row_to_execution(row: &Row<'_>) -> rusqlite::Result<TestExecution> {
    let status: String = row.get(4)?;
    let test_cases: Vec<TestCaseResult> = json_column(row, 3)?;
    let passed: i64 = row.get(8)?;
    let total: i64 = row.get(9)?;
    Ok(TestExecution {
        id: uuid_column(row, 0)?,
        task_id: uuid_column(row, 1)?,
        test_id: row.get(2)?,
        test_cases,
        status: parse_run_status(&status),
        feedback: row.get(5)?,
        tester_name: row.get(6)?,
        attached_images: json_column(row, 7)?,
        passed_test_cases: passed as usize,
        total_test_cases: total as usize,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const TASK_COLUMNS: &str = "id, title, description, status, priority, assignee, due_date, \
                            tags, test_cases, notes, attached_images, created_at, updated_at";

const EXECUTION_COLUMNS: &str = "id, task_id, test_id, test_cases, status, feedback, \
                                 tester_name, attached_images, passed_test_cases, \
                                 total_test_cases, created_at, updated_at";

impl Store for SqliteStore {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks"))?;
        let rows = stmt.query_map([], row_to_task)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let conn = self.lock();
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.to_string()],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO tasks (id, title, description, status, priority, assignee, due_date,
                                tags, test_cases, notes, attached_images, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                task.id.to_string(),
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                task.assignee,
                task.due_date.map(|d| d.to_string()),
                serde_json::to_string(&task.tags)?,
                serde_json::to_string(&task.test_cases)?,
                task.notes,
                serde_json::to_string(&task.attached_images)?,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(())
    }

    fn update_task(&self, task: &Task) -> Result<bool, StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE tasks SET title = ?2, description = ?3, status = ?4, priority = ?5,
                              assignee = ?6, due_date = ?7, tags = ?8, test_cases = ?9,
                              notes = ?10, attached_images = ?11, updated_at = ?12
             WHERE id = ?1",
            params![
                task.id.to_string(),
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                task.assignee,
                task.due_date.map(|d| d.to_string()),
                serde_json::to_string(&task.tags)?,
                serde_json::to_string(&task.test_cases)?,
                task.notes,
                serde_json::to_string(&task.attached_images)?,
                task.updated_at,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.lock();
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
        Ok(changed > 0)
    }

    fn list_executions(&self) -> Result<Vec<TestExecution>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("SELECT {EXECUTION_COLUMNS} FROM test_executions"))?;
        let rows = stmt.query_map([], row_to_execution)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_execution(&self, id: Uuid) -> Result<Option<TestExecution>, StoreError> {
        let conn = self.lock();
        let run = conn
            .query_row(
                &format!("SELECT {EXECUTION_COLUMNS} FROM test_executions WHERE id = ?1"),
                params![id.to_string()],
                row_to_execution,
            )
            .optional()?;
        Ok(run)
    }

    fn find_execution_by_test_id(
        &self,
        test_id: &str,
    ) -> Result<Option<TestExecution>, StoreError> {
        let conn = self.lock();
        let run = conn
            .query_row(
                &format!("SELECT {EXECUTION_COLUMNS} FROM test_executions WHERE test_id = ?1"),
                params![test_id],
                row_to_execution,
            )
            .optional()?;
        Ok(run)
    }

    fn insert_execution(&self, run: &TestExecution) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO test_executions (id, task_id, test_id, test_cases, status, feedback,
                                          tester_name, attached_images, passed_test_cases,
                                          total_test_cases, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                run.id.to_string(),
                run.task_id.to_string(),
                run.test_id,
                serde_json::to_string(&run.test_cases)?,
                run.status.as_str(),
                run.feedback,
                run.tester_name,
                serde_json::to_string(&run.attached_images)?,
                run.passed_test_cases as i64,
                run.total_test_cases as i64,
                run.created_at,
                run.updated_at,
            ],
        )?;
        Ok(())
    }

    fn update_execution(&self, run: &TestExecution) -> Result<bool, StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE test_executions SET task_id = ?2, test_id = ?3, test_cases = ?4,
                                        status = ?5, feedback = ?6, tester_name = ?7,
                                        attached_images = ?8, passed_test_cases = ?9,
                                        total_test_cases = ?10, updated_at = ?11
             WHERE id = ?1",
            params![
                run.id.to_string(),
                run.task_id.to_string(),
                run.test_id,
                serde_json::to_string(&run.test_cases)?,
                run.status.as_str(),
                run.feedback,
                run.tester_name,
                serde_json::to_string(&run.attached_images)?,
                run.passed_test_cases as i64,
                run.total_test_cases as i64,
                run.updated_at,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_execution(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.lock();
        let changed = conn.execute(
            "DELETE FROM test_executions WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionDraft;
    use crate::fields::{Priority, TaskStatus};
    use crate::task::TaskDraft;

    fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::open(&dir.path().join("store.sqlite")).unwrap()
    }

    fn sample_task() -> Task {
        TaskDraft {
            title: "Search".into(),
            description: "Verify search relevance".into(),
            priority: Priority::High,
            tags: vec!["search".into(), "ranking".into()],
            test_cases: vec!["exact match first".into()],
            due_date: NaiveDate::from_ymd_opt(2026, 9, 1),
            ..TaskDraft::default()
        }
        .into_task(Uuid::new_v4(), 50, 50)
    }

    fn sample_run(task_id: Uuid, test_id: &str) -> TestExecution {
        ExecutionDraft {
            task_id: Some(task_id.to_string()),
            test_id: test_id.into(),
            test_cases: vec![
                TestCaseResult {
                    test_case: "exact match first".into(),
                    passed: true,
                    notes: Some("fine".into()),
                },
                TestCaseResult {
                    test_case: "typo tolerance".into(),
                    passed: false,
                    notes: None,
                },
            ],
            feedback: "ranking regression".into(),
            tester_name: "carol".into(),
            ..ExecutionDraft::default()
        }
        .into_execution(Uuid::new_v4(), task_id, 60, 60)
    }

    #[test]
    fn tasks_round_trip_including_json_columns() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let task = sample_task();
        store.insert_task(&task).unwrap();
        assert_eq!(store.get_task(task.id).unwrap(), Some(task.clone()));

        let mut updated = task.clone();
        updated.status = TaskStatus::Completed;
        updated.tags.push("regression".into());
        assert!(store.update_task(&updated).unwrap());
        assert_eq!(store.get_task(task.id).unwrap(), Some(updated));

        assert!(store.delete_task(task.id).unwrap());
        assert_eq!(store.get_task(task.id).unwrap(), None);
    }

    #[test]
    fn executions_round_trip_and_find_by_test_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let task = sample_task();
        store.insert_task(&task).unwrap();
        let run = sample_run(task.id, "SRCH-1");
        store.insert_execution(&run).unwrap();

        assert_eq!(
            store.find_execution_by_test_id("SRCH-1").unwrap(),
            Some(run.clone())
        );
        assert_eq!(store.find_execution_by_test_id("SRCH-2").unwrap(), None);
        assert_eq!(store.get_execution(run.id).unwrap(), Some(run.clone()));
        assert_eq!(run.passed_test_cases, 1);
        assert_eq!(run.total_test_cases, 2);
    }

    #[test]
    fn deleting_a_task_leaves_its_runs_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let task = sample_task();
        store.insert_task(&task).unwrap();
        store.insert_execution(&sample_run(task.id, "SRCH-9")).unwrap();

        assert!(store.delete_task(task.id).unwrap());
        let orphans = store.list_executions().unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].task_id, task.id);
    }

    #[test]
    fn schema_version_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let version: i64 = store
            .lock()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, DB_SCHEMA_VERSION);
    }
}
