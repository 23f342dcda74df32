//! Task data structure, canonical validation and small field helpers.
//!
//! A task is the unit of QA work: tags, a description and a list of test-case
//! descriptions, plus scheduling metadata. The same validation runs in the
//! form layer and in the API handlers so the two cannot drift apart.

use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fields::{Priority, TaskStatus};

/// A QA task with its test-case list and categorisation metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<String>,
    pub test_cases: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub attached_images: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Incoming create/update payload for a task.
///
/// Every field is defaulted so that missing-field errors come from
/// [`TaskDraft::validate`] with a message naming the field, not from the JSON
/// deserializer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub test_cases: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub attached_images: Vec<String>,
}

impl TaskDraft {
    /// Validate the canonical required fields, returning a message that names
    /// the first missing one.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".into());
        }
        if self.description.trim().is_empty() {
            return Err("Description is required".into());
        }
        if clean_tags(&self.tags).is_empty() {
            return Err("At least one tag is required".into());
        }
        if clean_test_cases(&self.test_cases).is_empty() {
            return Err("At least one valid test case is required".into());
        }
        Ok(())
    }

    /// Build a persisted task from the draft. `created_at` is carried over on
    /// updates and equals `now` on creates.
    pub fn into_task(self, id: Uuid, created_at: i64, now: i64) -> Task {
        Task {
            id,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            status: self.status,
            priority: self.priority,
            assignee: self
                .assignee
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            due_date: self.due_date,
            tags: clean_tags(&self.tags),
            test_cases: clean_test_cases(&self.test_cases),
            notes: self.notes.map(|n| n.trim().to_string()).unwrap_or_default(),
            attached_images: self.attached_images,
            created_at,
            updated_at: now,
        }
    }

    /// Rebuild an editable draft from a persisted task.
    pub fn from_task(task: &Task) -> Self {
        TaskDraft {
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            assignee: task.assignee.clone(),
            due_date: task.due_date,
            tags: task.tags.clone(),
            test_cases: task.test_cases.clone(),
            notes: Some(task.notes.clone()),
            attached_images: task.attached_images.clone(),
        }
    }
}

/// Split comma-separated tag inputs, trimming entries and dropping empties
/// and duplicates. Case and order are preserved.
pub fn clean_tags(inputs: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in inputs {
        for part in raw.split(',') {
            let tag = part.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
    }
    tags
}

/// Trim test-case descriptions and drop empty entries, preserving order.
pub fn clean_test_cases(inputs: &[String]) -> Vec<String> {
    inputs
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Parse human-readable due date input.
///
/// Supports "today", "tomorrow", "in Nd", "in Nw" and `YYYY-MM-DD`.
pub fn parse_due_input(s: &str) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    let today = Local::now().date_naive();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Some(today + Duration::days(days));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Some(today + Duration::weeks(weeks));
            }
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let delta = (d - today).num_days();
            if delta == 0 {
                "today".into()
            } else if delta == 1 {
                "tomorrow".into()
            } else if delta > 1 {
                format!("in {delta}d")
            } else {
                format!("{}d late", -delta)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> TaskDraft {
        TaskDraft {
            title: "Login flow".into(),
            description: "Verify the login page".into(),
            tags: vec!["Bug Fix".into()],
            test_cases: vec!["t1".into()],
            ..TaskDraft::default()
        }
    }

    #[test]
    fn draft_requires_title_description_tags_and_cases() {
        assert!(draft().validate().is_ok());

        let mut missing = draft();
        missing.tags = vec!["  ".into()];
        assert_eq!(
            missing.validate().unwrap_err(),
            "At least one tag is required"
        );

        let mut missing = draft();
        missing.description = String::new();
        assert_eq!(missing.validate().unwrap_err(), "Description is required");

        let mut missing = draft();
        missing.test_cases = vec![String::new()];
        assert_eq!(
            missing.validate().unwrap_err(),
            "At least one valid test case is required"
        );

        let mut missing = draft();
        missing.title = " ".into();
        assert_eq!(missing.validate().unwrap_err(), "Title is required");
    }

    #[test]
    fn clean_tags_splits_trims_and_dedupes_preserving_case() {
        let tags = clean_tags(&["Bug Fix, regression".into(), "Bug Fix".into(), " ".into()]);
        assert_eq!(tags, vec!["Bug Fix".to_string(), "regression".to_string()]);
    }

    #[test]
    fn into_task_drops_blank_test_cases_and_trims_fields() {
        let mut d = draft();
        d.test_cases = vec![" t1 ".into(), "".into(), "t2".into()];
        d.notes = Some("  note  ".into());
        let task = d.into_task(Uuid::new_v4(), 10, 20);
        assert_eq!(task.test_cases, vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(task.notes, "note");
        assert_eq!(task.created_at, 10);
        assert_eq!(task.updated_at, 20);
    }

    #[test]
    fn due_input_accepts_relative_and_iso_forms() {
        let today = Local::now().date_naive();
        assert_eq!(parse_due_input("today"), Some(today));
        assert_eq!(parse_due_input("Tomorrow"), Some(today + Duration::days(1)));
        assert_eq!(parse_due_input("in 3d"), Some(today + Duration::days(3)));
        assert_eq!(parse_due_input("in 2w"), Some(today + Duration::weeks(2)));
        assert_eq!(
            parse_due_input("2026-01-31"),
            NaiveDate::from_ymd_opt(2026, 1, 31)
        );
        assert_eq!(parse_due_input("not a date"), None);
    }

    #[test]
    fn task_serializes_in_camel_case() {
        let task = draft().into_task(Uuid::new_v4(), 1, 1);
        let value = serde_json::to_value(&task).unwrap();
        assert!(value.get("testCases").is_some());
        assert!(value.get("createdAt").is_some());
        assert!(value.get("test_cases").is_none());
    }
}
