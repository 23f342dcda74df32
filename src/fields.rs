//! Enumerations and field types shared by the store, the API and the UI.
//!
//! All enums serialize in kebab-case to match the wire form; legacy aliases
//! are accepted on input where the stored data used a different spelling.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a QA task.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Priority of a QA task.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Status of a recorded test run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    #[default]
    Pending,
    InProgress,
    // One data source wrote "success" where the others wrote "completed".
    #[serde(alias = "success")]
    Completed,
    Failed,
}

/// Sort keys accepted by the test-execution list endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    TestId,
    TesterName,
    Status,
}

/// Sort direction for list endpoints.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl TaskStatus {
    /// Wire/storage spelling of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::InProgress => "in-progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl SortField {
    /// Query-parameter spelling, as sent by clients.
    pub fn as_str(self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::TestId => "testId",
            SortField::TesterName => "testerName",
            SortField::Status => "status",
        }
    }
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Parse a task status from stored text, falling back to pending.
pub fn parse_task_status(s: &str) -> TaskStatus {
    match s {
        "in-progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        _ => TaskStatus::Pending,
    }
}

/// Parse a priority from stored text, falling back to medium.
pub fn parse_priority(s: &str) -> Priority {
    match s {
        "low" => Priority::Low,
        "high" => Priority::High,
        _ => Priority::Medium,
    }
}

/// Parse a run status from stored text, falling back to pending.
pub fn parse_run_status(s: &str) -> RunStatus {
    match s {
        "in-progress" => RunStatus::InProgress,
        "completed" | "success" => RunStatus::Completed,
        "failed" => RunStatus::Failed,
        _ => RunStatus::Pending,
    }
}

/// Parse a sort key from query text, falling back to creation time.
pub fn parse_sort_field(s: &str) -> SortField {
    match s {
        "updatedAt" => SortField::UpdatedAt,
        "testId" => SortField::TestId,
        "testerName" => SortField::TesterName,
        "status" => SortField::Status,
        _ => SortField::CreatedAt,
    }
}

/// Parse a sort direction from query text, falling back to descending.
pub fn parse_sort_order(s: &str) -> SortOrder {
    match s {
        "asc" => SortOrder::Asc,
        _ => SortOrder::Desc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_accepts_legacy_success_alias() {
        let status: RunStatus = serde_json::from_str("\"success\"").unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"completed\"");
    }

    #[test]
    fn statuses_round_trip_through_text() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(parse_task_status(status.as_str()), status);
        }
        for status in [
            RunStatus::Pending,
            RunStatus::InProgress,
            RunStatus::Completed,
            RunStatus::Failed,
        ] {
            assert_eq!(parse_run_status(status.as_str()), status);
        }
    }
}
