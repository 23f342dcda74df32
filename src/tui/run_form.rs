//! Test-run form handling for the terminal user interface.
//!
//! The form is seeded with the selected task's test cases; space toggles a
//! case between pass and fail. Submitting with a test id that already exists
//! overwrites that run server-side.

use crate::execution::{ExecutionDraft, TestCaseResult, TestExecution};
use crate::fields::RunStatus;
use crate::task::Task;
use crate::tui::input::InputField;
use uuid::Uuid;

/// Global order constants for the run form fields.
pub const TEST_ID_ORDER: usize = 0;
pub const TESTER_ORDER: usize = 1;
pub const FEEDBACK_ORDER: usize = 2;
pub const STATUS_ORDER: usize = 3;
/// Test-case toggles start here.
pub const CASES_ORDER: usize = 4;

/// One toggleable case row in the form.
#[derive(Clone)]
pub struct CaseToggle {
    pub text: String,
    pub passed: bool,
}

/// Run form for recording or correcting a test execution.
pub struct RunForm {
    pub task_id: Uuid,
    pub test_id: InputField,
    pub tester: InputField,
    pub feedback: InputField,
    pub status: usize,
    pub cases: Vec<CaseToggle>,
    pub current_field: usize,
    pub statuses: Vec<RunStatus>,
}

impl RunForm {
    /// Create a form for a new run, seeding the case list from the task.
    pub fn for_task(task: &Task) -> Self {
        let mut form = RunForm {
            task_id: task.id,
            test_id: InputField::new(),
            tester: InputField::new(),
            feedback: InputField::new(),
            status: 0, // Pending
            cases: task
                .test_cases
                .iter()
                .map(|c| CaseToggle {
                    text: c.clone(),
                    passed: false,
                })
                .collect(),
            current_field: 0,
            statuses: vec![
                RunStatus::Pending,
                RunStatus::InProgress,
                RunStatus::Completed,
                RunStatus::Failed,
            ],
        };
        form.update_active_field();
        form
    }

    /// Create a form pre-filled from an existing run, for corrections.
    pub fn from_execution(run: &TestExecution) -> Self {
        let mut form = RunForm {
            task_id: run.task_id,
            test_id: InputField::with_value(&run.test_id),
            tester: InputField::with_value(&run.tester_name),
            feedback: InputField::with_value(&run.feedback),
            status: 0,
            cases: run
                .test_cases
                .iter()
                .map(|tc| CaseToggle {
                    text: tc.test_case.clone(),
                    passed: tc.passed,
                })
                .collect(),
            current_field: 0,
            statuses: vec![
                RunStatus::Pending,
                RunStatus::InProgress,
                RunStatus::Completed,
                RunStatus::Failed,
            ],
        };
        form.status = form
            .statuses
            .iter()
            .position(|&s| s == run.status)
            .unwrap_or(0);
        form.update_active_field();
        form
    }

    pub fn field_count(&self) -> usize {
        CASES_ORDER + self.cases.len()
    }

    pub fn next_field(&mut self) {
        self.current_field = (self.current_field + 1) % self.field_count();
        self.update_active_field();
    }

    pub fn prev_field(&mut self) {
        self.current_field = if self.current_field == 0 {
            self.field_count() - 1
        } else {
            self.current_field - 1
        };
        self.update_active_field();
    }

    fn active_input(&mut self) -> Option<&mut InputField> {
        match self.current_field {
            TEST_ID_ORDER => Some(&mut self.test_id),
            TESTER_ORDER => Some(&mut self.tester),
            FEEDBACK_ORDER => Some(&mut self.feedback),
            _ => None,
        }
    }

    pub fn update_active_field(&mut self) {
        let current = self.current_field;
        self.test_id.active = current == TEST_ID_ORDER;
        self.tester.active = current == TESTER_ORDER;
        self.feedback.active = current == FEEDBACK_ORDER;
    }

    pub fn handle_char(&mut self, c: char) {
        // Space toggles the highlighted case instead of typing.
        if c == ' ' && self.current_field >= CASES_ORDER {
            self.toggle_case();
            return;
        }
        if let Some(field) = self.active_input() {
            field.handle_char(c);
        }
    }

    pub fn handle_backspace(&mut self) {
        if let Some(field) = self.active_input() {
            field.handle_backspace();
        }
    }

    pub fn handle_left_right(&mut self, right: bool) {
        match self.current_field {
            STATUS_ORDER => {
                self.status = if right {
                    (self.status + 1) % self.statuses.len()
                } else if self.status == 0 {
                    self.statuses.len() - 1
                } else {
                    self.status - 1
                };
            }
            current if current >= CASES_ORDER => self.toggle_case(),
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

    /// Flip the highlighted case between pass and fail.
    pub fn toggle_case(&mut self) {
        if self.current_field >= CASES_ORDER {
            let idx = self.current_field - CASES_ORDER;
            if let Some(case) = self.cases.get_mut(idx) {
                case.passed = !case.passed;
            }
        }
    }

    /// Build the API draft from the form contents.
    pub fn to_draft(&self) -> Result<ExecutionDraft, String> {
        let draft = ExecutionDraft {
            task_id: Some(self.task_id.to_string()),
            test_id: self.test_id.value.clone(),
            test_cases: self
                .cases
                .iter()
                .map(|case| TestCaseResult {
                    test_case: case.text.clone(),
                    passed: case.passed,
                    notes: None,
                })
                .collect(),
            status: self.statuses[self.status],
            feedback: self.feedback.value.clone(),
            attached_images: Vec::new(),
            tester_name: self.tester.value.clone(),
        };
        draft.validate()?;
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDraft;

    fn task() -> Task {
        TaskDraft {
            title: "Checkout".into(),
            description: "d".into(),
            tags: vec!["payments".into()],
            test_cases: vec!["add to cart".into(), "pay".into()],
            ..TaskDraft::default()
        }
        .into_task(Uuid::new_v4(), 1, 1)
    }

    #[test]
    fn form_seeds_cases_from_the_task_and_toggles() {
        let task = task();
        let mut form = RunForm::for_task(&task);
        assert_eq!(form.cases.len(), 2);
        assert!(!form.cases[0].passed);

        form.current_field = CASES_ORDER;
        form.handle_char(' ');
        assert!(form.cases[0].passed);

        form.test_id = InputField::with_value("RUN-1");
        form.tester = InputField::with_value("alice");
        form.feedback = InputField::with_value("cart works, payment broken");
        let draft = form.to_draft().unwrap();
        let run = draft.into_execution(Uuid::new_v4(), task.id, 1, 1);
        assert_eq!(run.passed_test_cases, 1);
        assert_eq!(run.total_test_cases, 2);
    }

    #[test]
    fn incomplete_form_fails_client_side_validation() {
        let task = task();
        let form = RunForm::for_task(&task);
        assert!(form.to_draft().is_err());
    }
}
