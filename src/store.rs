//! Persistence seam: two interchangeable backends for tasks and test runs.
//!
//! Filtering and sorting of execution lists happens in the API layer so the
//! backends stay behaviorally identical.

pub mod json;
pub mod sqlite;

use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use uuid::Uuid;

use crate::execution::TestExecution;
use crate::task::Task;

/// Which persistence backend to run the server against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Single JSON document file.
    Json,
    /// SQLite database.
    Sqlite,
}

impl Backend {
    /// Default store file name under the data directory.
    pub fn default_file_name(self) -> &'static str {
        match self {
            Backend::Json => "qa_tracker.json",
            Backend::Sqlite => "qa_tracker.sqlite",
        }
    }
}

/// Errors surfaced by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Persistence operations shared by both backends.
pub trait Store: Send + Sync {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;
    fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;
    fn insert_task(&self, task: &Task) -> Result<(), StoreError>;
    /// Returns false when no task with the given id exists.
    fn update_task(&self, task: &Task) -> Result<bool, StoreError>;
    /// Returns false when no task with the given id exists. Executions
    /// referencing the task are intentionally left in place.
    fn delete_task(&self, id: Uuid) -> Result<bool, StoreError>;

    fn list_executions(&self) -> Result<Vec<TestExecution>, StoreError>;
    fn get_execution(&self, id: Uuid) -> Result<Option<TestExecution>, StoreError>;
    /// Lookup by the user-facing run identifier (exact match on the trimmed id).
    fn find_execution_by_test_id(&self, test_id: &str)
        -> Result<Option<TestExecution>, StoreError>;
    fn insert_execution(&self, run: &TestExecution) -> Result<(), StoreError>;
    fn update_execution(&self, run: &TestExecution) -> Result<bool, StoreError>;
    fn delete_execution(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Open the selected backend at the given path.
pub fn open(backend: Backend, path: &Path) -> Result<Arc<dyn Store>, StoreError> {
    match backend {
        Backend::Json => Ok(Arc::new(json::JsonStore::open(path)?)),
        Backend::Sqlite => Ok(Arc::new(sqlite::SqliteStore::open(path)?)),
    }
}
