//! Document-store backend: both collections in a single JSON file.
//!
//! The whole file is loaded at startup and rewritten on every mutation using
//! an atomic write (temp file + rename), so a crash mid-write never leaves a
//! truncated store behind.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::execution::TestExecution;
use crate::store::{Store, StoreError};
use crate::task::Task;

/// On-disk document layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Collections {
    tasks: Vec<Task>,
    #[serde(default)]
    executions: Vec<TestExecution>,
}

/// File-backed document store.
pub struct JsonStore {
    path: PathBuf,
    data: Mutex<Collections>,
}

impl JsonStore {
    /// Load the store from `path`, starting empty if the file doesn't exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let data = if path.exists() {
            let mut buf = String::new();
            File::open(path)?.read_to_string(&mut buf)?;
            serde_json::from_str(&buf)?
        } else {
            Collections::default()
        };
        Ok(JsonStore {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.data.lock().expect("store mutex poisoned")
    }

    /// Atomic-ish write via temp + rename.
    fn save(&self, data: &Collections) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(data)?;
        let mut f = File::create(&tmp)?;
        f.write_all(payload.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }
}

impl Store for JsonStore {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.lock().tasks.clone())
    }

    fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.lock().tasks.iter().find(|t| t.id == id).cloned())
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut data = self.lock();
        data.tasks.push(task.clone());
        self.save(&data)
    }

    fn update_task(&self, task: &Task) -> Result<bool, StoreError> {
        let mut data = self.lock();
        match data.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => {
                *slot = task.clone();
                self.save(&data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_task(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut data = self.lock();
        let before = data.tasks.len();
        data.tasks.retain(|t| t.id != id);
        if data.tasks.len() == before {
            return Ok(false);
        }
        self.save(&data)?;
        Ok(true)
    }

    fn list_executions(&self) -> Result<Vec<TestExecution>, StoreError> {
        Ok(self.lock().executions.clone())
    }

    fn get_execution(&self, id: Uuid) -> Result<Option<TestExecution>, StoreError> {
        Ok(self.lock().executions.iter().find(|r| r.id == id).cloned())
    }

    fn find_execution_by_test_id(
        &self,
        test_id: &str,
    ) -> Result<Option<TestExecution>, StoreError> {
        Ok(self
            .lock()
            .executions
            .iter()
            .find(|r| r.test_id == test_id)
            .cloned())
    }

    fn insert_execution(&self, run: &TestExecution) -> Result<(), StoreError> {
        let mut data = self.lock();
        data.executions.push(run.clone());
        self.save(&data)
    }

    fn update_execution(&self, run: &TestExecution) -> Result<bool, StoreError> {
        let mut data = self.lock();
        match data.executions.iter_mut().find(|r| r.id == run.id) {
            Some(slot) => {
                *slot = run.clone();
                self.save(&data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_execution(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut data = self.lock();
        let before = data.executions.len();
        data.executions.retain(|r| r.id != id);
        if data.executions.len() == before {
            return Ok(false);
        }
        self.save(&data)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{ExecutionDraft, TestCaseResult};
    use crate::task::TaskDraft;

    fn sample_task() -> Task {
        TaskDraft {
            title: "Checkout".into(),
            description: "Verify checkout".into(),
            tags: vec!["payments".into()],
            test_cases: vec!["add to cart".into(), "pay".into()],
            ..TaskDraft::default()
        }
        .into_task(Uuid::new_v4(), 100, 100)
    }

    fn sample_run(task_id: Uuid, test_id: &str) -> TestExecution {
        ExecutionDraft {
            task_id: Some(task_id.to_string()),
            test_id: test_id.into(),
            test_cases: vec![TestCaseResult {
                test_case: "add to cart".into(),
                passed: true,
                notes: None,
            }],
            feedback: "ok".into(),
            tester_name: "bob".into(),
            ..ExecutionDraft::default()
        }
        .into_execution(Uuid::new_v4(), task_id, 100, 100)
    }

    #[test]
    fn crud_round_trip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let task = sample_task();
        let run = sample_run(task.id, "T-1");
        {
            let store = JsonStore::open(&path).unwrap();
            store.insert_task(&task).unwrap();
            store.insert_execution(&run).unwrap();
        }

        let store = JsonStore::open(&path).unwrap();
        assert_eq!(store.list_tasks().unwrap(), vec![task.clone()]);
        assert_eq!(
            store.find_execution_by_test_id("T-1").unwrap(),
            Some(run.clone())
        );

        let mut updated = task.clone();
        updated.title = "Checkout v2".into();
        assert!(store.update_task(&updated).unwrap());
        assert_eq!(store.get_task(task.id).unwrap().unwrap().title, "Checkout v2");

        assert!(store.delete_execution(run.id).unwrap());
        assert!(!store.delete_execution(run.id).unwrap());
    }

    #[test]
    fn deleting_a_task_leaves_its_runs_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(&dir.path().join("store.json")).unwrap();

        let task = sample_task();
        store.insert_task(&task).unwrap();
        store.insert_execution(&sample_run(task.id, "T-9")).unwrap();

        assert!(store.delete_task(task.id).unwrap());
        let orphans = store.list_executions().unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].task_id, task.id);
    }

    #[test]
    fn update_of_absent_rows_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(&dir.path().join("store.json")).unwrap();
        assert!(!store.update_task(&sample_task()).unwrap());
        assert!(!store.delete_task(Uuid::new_v4()).unwrap());
    }
}
