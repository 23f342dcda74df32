//! Task form handling for the terminal user interface.
//!
//! The form collects the same canonical field set the API validates, so a
//! submission that passes the client-side check here is accepted server-side
//! too.

use crate::fields::{Priority, TaskStatus};
use crate::task::{clean_tags, clean_test_cases, parse_due_input, Task, TaskDraft};
use crate::tui::input::InputField;

/// Global order constants for the task form fields.
pub const TITLE_ORDER: usize = 0;
pub const DESCRIPTION_ORDER: usize = 1;
pub const TAGS_ORDER: usize = 2;
pub const TEST_CASES_ORDER: usize = 3;
pub const NOTES_ORDER: usize = 4;
pub const ASSIGNEE_ORDER: usize = 5;
pub const DUE_ORDER: usize = 6;
pub const IMAGES_ORDER: usize = 7;
pub const STATUS_ORDER: usize = 8;
pub const PRIORITY_ORDER: usize = 9;

/// Task form for creating and editing tasks.
pub struct TaskForm {
    pub title: InputField,
    pub description: InputField,
    /// Comma-separated tags.
    pub tags: InputField,
    /// Semicolon-separated test-case descriptions.
    pub test_cases: InputField,
    pub notes: InputField,
    pub assignee: InputField,
    pub due: InputField,
    /// Comma-separated image references.
    pub images: InputField,
    pub status: usize,
    pub priority: usize,
    pub current_field: usize,
    pub statuses: Vec<TaskStatus>,
    pub priorities: Vec<Priority>,
}

impl TaskForm {
    /// Create an empty form with default selector positions.
    pub fn new() -> Self {
        let mut form = TaskForm {
            title: InputField::new(),
            description: InputField::new(),
            tags: InputField::new(),
            test_cases: InputField::new(),
            notes: InputField::new(),
            assignee: InputField::new(),
            due: InputField::new(),
            images: InputField::new(),
            status: 0,   // Pending
            priority: 1, // Medium
            current_field: 0,
            statuses: vec![
                TaskStatus::Pending,
                TaskStatus::InProgress,
                TaskStatus::Completed,
                TaskStatus::Failed,
            ],
            priorities: vec![Priority::Low, Priority::Medium, Priority::High],
        };
        form.update_active_field();
        form
    }

    /// Create a form populated from an existing task.
    pub fn from_task(task: &Task) -> Self {
        let mut form = Self::new();
        form.title = InputField::with_value(&task.title);
        form.description = InputField::with_value(&task.description);
        form.tags = InputField::with_value(&task.tags.join(","));
        form.test_cases = InputField::with_value(&task.test_cases.join("; "));
        form.notes = InputField::with_value(&task.notes);
        form.assignee = InputField::with_value(task.assignee.as_deref().unwrap_or(""));
        form.due = InputField::with_value(
            &task.due_date.map(|d| d.to_string()).unwrap_or_default(),
        );
        form.images = InputField::with_value(&task.attached_images.join(","));
        form.status = form
            .statuses
            .iter()
            .position(|&s| s == task.status)
            .unwrap_or(0);
        form.priority = form
            .priorities
            .iter()
            .position(|&p| p == task.priority)
            .unwrap_or(1);
        form.update_active_field();
        form
    }

    /// Get mutable references to the text fields in visual order.
    fn fields_mut(&mut self) -> Vec<&mut InputField> {
        vec![
            &mut self.title,
            &mut self.description,
            &mut self.tags,
            &mut self.test_cases,
            &mut self.notes,
            &mut self.assignee,
            &mut self.due,
            &mut self.images,
        ]
    }

    /// Total number of fields (text fields + selectors).
    pub fn field_count(&self) -> usize {
        10
    }

    /// Move to the next field in the form.
    pub fn next_field(&mut self) {
        self.current_field = (self.current_field + 1) % self.field_count();
        self.update_active_field();
    }

    /// Move to the previous field in the form.
    pub fn prev_field(&mut self) {
        self.current_field = if self.current_field == 0 {
            self.field_count() - 1
        } else {
            self.current_field - 1
        };
        self.update_active_field();
    }

    fn active_input(&mut self) -> Option<&mut InputField> {
        let current = self.current_field;
        if current <= IMAGES_ORDER {
            Some(self.fields_mut().swap_remove(current))
        } else {
            None
        }
    }

    /// Update which field is marked active for rendering.
    pub fn update_active_field(&mut self) {
        let current = self.current_field;
        for (i, field) in self.fields_mut().into_iter().enumerate() {
            field.active = i == current;
        }
    }

    /// Handle character input for the currently active field.
    pub fn handle_char(&mut self, c: char) {
        if let Some(field) = self.active_input() {
            field.handle_char(c);
        }
    }

    /// Handle backspace for the currently active field.
    pub fn handle_backspace(&mut self) {
        if let Some(field) = self.active_input() {
            field.handle_backspace();
        }
    }

    /// Handle left/right arrows: cursor movement in text fields, value cycling
    /// on the selectors.
    pub fn handle_left_right(&mut self, right: bool) {
        match self.current_field {
            STATUS_ORDER => {
                self.status = cycle(self.status, self.statuses.len(), right);
            }
            PRIORITY_ORDER => {
                self.priority = cycle(self.priority, self.priorities.len(), right);
            }
            _ => {
                if let Some(field) = self.active_input() {
                    if right {
                        field.move_cursor_right();
                    } else {
                        field.move_cursor_left();
                    }
                }
            }
        }
    }

    /// Build the API draft from the form contents. Fails with a message
    /// suitable for the status bar when a field doesn't validate.
    pub fn to_draft(&self) -> Result<TaskDraft, String> {
        let due_date = if self.due.is_blank() {
            None
        } else {
            match parse_due_input(&self.due.value) {
                Some(d) => Some(d),
                None => return Err(format!("Unrecognised due date: {}", self.due.value)),
            }
        };
        let draft = TaskDraft {
            title: self.title.value.clone(),
            description: self.description.value.clone(),
            status: self.statuses[self.status],
            priority: self.priorities[self.priority],
            assignee: Some(self.assignee.value.clone()).filter(|a| !a.trim().is_empty()),
            due_date,
            tags: clean_tags(&[self.tags.value.clone()]),
            test_cases: clean_test_cases(
                &self
                    .test_cases
                    .value
                    .split(';')
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>(),
            ),
            notes: Some(self.notes.value.clone()),
            attached_images: clean_tags(&[self.images.value.clone()]),
        };
        draft.validate()?;
        Ok(draft)
    }
}

fn cycle(current: usize, len: usize, right: bool) -> usize {
    if right {
        (current + 1) % len
    } else if current == 0 {
        len - 1
    } else {
        current - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_submission_mirrors_server_validation() {
        let mut form = TaskForm::new();
        assert!(form.to_draft().is_err());

        form.title = InputField::with_value("Login flow");
        form.description = InputField::with_value("Verify the login page");
        form.tags = InputField::with_value("auth, smoke");
        form.test_cases = InputField::with_value("happy path; wrong password");
        let draft = form.to_draft().unwrap();
        assert_eq!(draft.tags, vec!["auth".to_string(), "smoke".to_string()]);
        assert!(draft.validate().is_ok());

        form.due = InputField::with_value("next sprint");
        assert!(form.to_draft().is_err());
    }

    #[test]
    fn field_navigation_wraps_and_tracks_active() {
        let mut form = TaskForm::new();
        assert!(form.title.active);
        for _ in 0..form.field_count() {
            form.next_field();
        }
        assert_eq!(form.current_field, TITLE_ORDER);
        form.prev_field();
        assert_eq!(form.current_field, PRIORITY_ORDER);
    }
}
