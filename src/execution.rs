//! Test execution records: one row per recorded run of a task's test cases.
//!
//! Executions reference tasks by id without owning them; deleting a task
//! leaves its runs in place. The pass counts are derived from the test-case
//! list on every write and are never trusted from input.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fields::RunStatus;

/// Outcome of a single test case within a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub test_case: String,
    #[serde(default)]
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A recorded run of a task's test cases by a tester.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestExecution {
    pub id: Uuid,
    pub task_id: Uuid,
    pub test_id: String,
    pub test_cases: Vec<TestCaseResult>,
    #[serde(default)]
    pub status: RunStatus,
    pub feedback: String,
    pub tester_name: String,
    #[serde(default)]
    pub attached_images: Vec<String>,
    #[serde(default)]
    pub passed_test_cases: usize,
    #[serde(default)]
    pub total_test_cases: usize,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TestExecution {
    /// Recompute the derived pass counts from the current test-case list.
    pub fn recount(&mut self) {
        self.passed_test_cases = self.test_cases.iter().filter(|tc| tc.passed).count();
        self.total_test_cases = self.test_cases.len();
    }
}

/// Incoming create/update payload for a test execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub test_id: String,
    #[serde(default)]
    pub test_cases: Vec<TestCaseResult>,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub attached_images: Vec<String>,
    #[serde(default)]
    pub tester_name: String,
}

impl ExecutionDraft {
    /// Validate required fields and return the parsed task reference.
    pub fn validate(&self) -> Result<Uuid, String> {
        let raw = match self.task_id.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err("Task ID is required".into()),
        };
        let task_id = Uuid::parse_str(raw).map_err(|_| "Invalid task ID".to_string())?;
        if self.test_id.trim().is_empty() {
            return Err("Test ID is required".into());
        }
        if self.test_cases.is_empty() {
            return Err("At least one test case is required".into());
        }
        if self.feedback.trim().is_empty() {
            return Err("Feedback is required".into());
        }
        if self.tester_name.trim().is_empty() {
            return Err("Tester name is required".into());
        }
        Ok(task_id)
    }

    /// Build a persisted execution with trimmed text fields and freshly
    /// derived counts. `created_at` is carried over when the draft overwrites
    /// an existing run.
    pub fn into_execution(self, id: Uuid, task_id: Uuid, created_at: i64, now: i64) -> TestExecution {
        let mut run = TestExecution {
            id,
            task_id,
            test_id: self.test_id.trim().to_string(),
            test_cases: self
                .test_cases
                .into_iter()
                .map(|tc| TestCaseResult {
                    test_case: tc.test_case.trim().to_string(),
                    passed: tc.passed,
                    notes: tc.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                })
                .collect(),
            status: self.status,
            feedback: self.feedback.trim().to_string(),
            tester_name: self.tester_name.trim().to_string(),
            attached_images: self.attached_images,
            passed_test_cases: 0,
            total_test_cases: 0,
            created_at,
            updated_at: now,
        };
        run.recount();
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(text: &str, passed: bool) -> TestCaseResult {
        TestCaseResult {
            test_case: text.into(),
            passed,
            notes: None,
        }
    }

    fn draft(task_id: &str) -> ExecutionDraft {
        ExecutionDraft {
            task_id: Some(task_id.into()),
            test_id: "T-100".into(),
            test_cases: vec![case("login", true), case("logout", false)],
            feedback: "looks mostly fine".into(),
            tester_name: "alice".into(),
            ..ExecutionDraft::default()
        }
    }

    #[test]
    fn validation_names_each_missing_field() {
        let id = Uuid::new_v4().to_string();
        assert!(draft(&id).validate().is_ok());

        let mut d = draft(&id);
        d.task_id = None;
        assert_eq!(d.validate().unwrap_err(), "Task ID is required");

        let mut d = draft(&id);
        d.task_id = Some("not-a-uuid".into());
        assert_eq!(d.validate().unwrap_err(), "Invalid task ID");

        let mut d = draft(&id);
        d.test_id = "  ".into();
        assert_eq!(d.validate().unwrap_err(), "Test ID is required");

        let mut d = draft(&id);
        d.test_cases.clear();
        assert_eq!(d.validate().unwrap_err(), "At least one test case is required");

        let mut d = draft(&id);
        d.feedback = String::new();
        assert_eq!(d.validate().unwrap_err(), "Feedback is required");

        let mut d = draft(&id);
        d.tester_name = String::new();
        assert_eq!(d.validate().unwrap_err(), "Tester name is required");
    }

    #[test]
    fn counts_are_derived_from_test_cases() {
        let task_id = Uuid::new_v4();
        let run = draft(&task_id.to_string()).into_execution(Uuid::new_v4(), task_id, 5, 9);
        assert_eq!(run.passed_test_cases, 1);
        assert_eq!(run.total_test_cases, 2);
        assert_eq!(run.created_at, 5);
        assert_eq!(run.updated_at, 9);
    }

    #[test]
    fn recount_tracks_mutated_case_lists() {
        let task_id = Uuid::new_v4();
        let mut run = draft(&task_id.to_string()).into_execution(Uuid::new_v4(), task_id, 1, 1);
        run.test_cases.push(case("audit log", true));
        run.recount();
        assert_eq!(run.passed_test_cases, 2);
        assert_eq!(run.total_test_cases, 3);
    }

    #[test]
    fn wire_form_is_camel_case() {
        let task_id = Uuid::new_v4();
        let run = draft(&task_id.to_string()).into_execution(Uuid::new_v4(), task_id, 1, 1);
        let value = serde_json::to_value(&run).unwrap();
        assert!(value.get("testId").is_some());
        assert!(value.get("passedTestCases").is_some());
        assert!(value["testCases"][0].get("testCase").is_some());
    }
}
