//! Main application logic for the terminal user interface.
//!
//! The `App` struct manages TUI state, renders the interface and coordinates
//! between the screens (task table, run table, forms, dashboard). All data
//! access goes through the shared [`DataContext`]; server errors surface as
//! transient status-bar toasts.

use std::io;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{self, Event, KeyCode};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use uuid::Uuid;

use crate::client::{ApiClient, DataContext, ExecutionFilter};
use crate::fields::{RunStatus, TaskStatus};
use crate::task::format_due_relative;
use crate::tui::colors::{AMBER, DARK_GREEN, DARK_RED, STEEL_BLUE};
use crate::tui::run_form::{RunForm, CASES_ORDER};
use crate::tui::task_form::TaskForm;

/// Screens of the terminal user interface.
#[derive(Clone, Copy, PartialEq)]
enum Screen {
    Tasks,
    TaskDetail,
    AddTask,
    EditTask,
    Runs,
    RecordRun,
    Dashboard,
    Help,
    Confirm,
}

/// Action awaiting confirmation.
#[derive(Clone, Copy)]
enum PendingAction {
    DeleteTask(Uuid),
    DeleteRun(Uuid),
}

/// Main application state for the terminal user interface.
pub struct App {
    screen: Screen,
    prev_screen: Screen,
    ctx: DataContext,
    task_table: TableState,
    run_table: TableState,
    filtered_tasks: Vec<Uuid>,
    selected_task: Option<Uuid>,
    task_form: TaskForm,
    run_form: Option<RunForm>,
    run_filter: ExecutionFilter,
    status_message: String,
    filter_text: String,
    filter_active: bool,
    confirm: Option<PendingAction>,
}

impl App {
    /// Create the app and load the task list from the server (fetch-on-mount).
    pub fn new(mut ctx: DataContext) -> Self {
        let initial_error = ctx.refresh_tasks().err().map(|e| e.to_string());
        let mut app = App {
            screen: Screen::Tasks,
            prev_screen: Screen::Tasks,
            ctx,
            task_table: TableState::default(),
            run_table: TableState::default(),
            filtered_tasks: Vec::new(),
            selected_task: None,
            task_form: TaskForm::new(),
            run_form: None,
            run_filter: ExecutionFilter::default(),
            status_message: String::new(),
            filter_text: String::new(),
            filter_active: false,
            confirm: None,
        };
        if let Some(e) = initial_error {
            app.toast(format!("Failed to load tasks: {e}"));
        }
        app.update_filtered_tasks();
        app
    }

    fn toast(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn go_to(&mut self, screen: Screen) {
        self.prev_screen = self.screen;
        self.screen = screen;
    }

    /// Rebuild the filtered task id list, preserving the selection when the
    /// selected task survives the filter.
    fn update_filtered_tasks(&mut self) {
        let old_selected = self
            .task_table
            .selected()
            .and_then(|idx| self.filtered_tasks.get(idx))
            .copied();

        let needle = self.filter_text.to_lowercase();
        self.filtered_tasks = self
            .ctx
            .tasks
            .iter()
            .filter(|t| {
                needle.is_empty()
                    || t.title.to_lowercase().contains(&needle)
                    || t.description.to_lowercase().contains(&needle)
                    || t.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
            })
            .map(|t| t.id)
            .collect();

        let selection = old_selected
            .and_then(|id| self.filtered_tasks.iter().position(|&t| t == id))
            .or(if self.filtered_tasks.is_empty() {
                None
            } else {
                Some(0)
            });
        self.task_table.select(selection);
    }

    fn selected_task_id(&self) -> Option<Uuid> {
        self.task_table
            .selected()
            .and_then(|idx| self.filtered_tasks.get(idx))
            .copied()
    }

    fn selected_run_index(&self) -> Option<usize> {
        self.run_table
            .selected()
            .filter(|&idx| idx < self.ctx.executions.len())
    }

    fn move_selection(state: &mut TableState, len: usize, down: bool) {
        if len == 0 {
            state.select(None);
            return;
        }
        let current = state.selected().unwrap_or(0);
        let next = if down {
            (current + 1).min(len - 1)
        } else {
            current.saturating_sub(1)
        };
        state.select(Some(next));
    }

    fn refresh_tasks(&mut self) {
        if let Err(e) = self.ctx.refresh_tasks() {
            self.toast(format!("Refresh failed: {e}"));
        }
        self.update_filtered_tasks();
    }

    fn refresh_runs(&mut self) {
        let filter = self.run_filter.clone();
        if let Err(e) = self.ctx.refresh_executions(&filter) {
            self.toast(format!("Refresh failed: {e}"));
        }
        let len = self.ctx.executions.len();
        if len == 0 {
            self.run_table.select(None);
        } else if self.run_table.selected().map_or(true, |idx| idx >= len) {
            self.run_table.select(Some(0));
        }
    }

    fn open_runs(&mut self, task_id: Option<Uuid>) {
        self.run_filter = ExecutionFilter {
            task_id,
            ..ExecutionFilter::default()
        };
        self.refresh_runs();
        self.go_to(Screen::Runs);
    }

    fn open_dashboard(&mut self) {
        if let Err(e) = self.ctx.refresh_stats() {
            self.toast(format!("Failed to load dashboard: {e}"));
        }
        self.go_to(Screen::Dashboard);
    }

    fn open_record_form(&mut self) {
        // Prefer the task behind the selected run, fall back to the task
        // selected in the task table.
        let task_id = self
            .selected_run_index()
            .map(|idx| self.ctx.executions[idx].execution.task_id)
            .or(self.selected_task)
            .or_else(|| self.selected_task_id());
        let Some(task_id) = task_id else {
            self.toast("Select a task first");
            return;
        };
        match self.ctx.task_by_id(task_id) {
            Some(task) => {
                self.run_form = Some(RunForm::for_task(task));
                self.go_to(Screen::RecordRun);
            }
            None => self.toast("Task no longer exists; refresh the task list"),
        }
    }

    // ---------------------------------------------------------------- input

    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                self.status_message.clear();

                let should_quit = match self.screen {
                    Screen::Tasks => self.handle_tasks_input(key.code),
                    Screen::TaskDetail => self.handle_detail_input(key.code),
                    Screen::AddTask | Screen::EditTask => self.handle_task_form_input(key.code),
                    Screen::Runs => self.handle_runs_input(key.code),
                    Screen::RecordRun => self.handle_run_form_input(key.code),
                    Screen::Dashboard => self.handle_dashboard_input(key.code),
                    Screen::Help => {
                        self.screen = self.prev_screen;
                        false
                    }
                    Screen::Confirm => self.handle_confirm_input(key.code),
                };
                if should_quit {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn handle_tasks_input(&mut self, code: KeyCode) -> bool {
        if self.filter_active {
            match code {
                KeyCode::Esc => {
                    self.filter_active = false;
                    self.filter_text.clear();
                    self.update_filtered_tasks();
                }
                KeyCode::Enter => self.filter_active = false,
                KeyCode::Backspace => {
                    self.filter_text.pop();
                    self.update_filtered_tasks();
                }
                KeyCode::Char(c) => {
                    self.filter_text.push(c);
                    self.update_filtered_tasks();
                }
                _ => {}
            }
            return false;
        }

        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Down | KeyCode::Char('j') => {
                Self::move_selection(&mut self.task_table, self.filtered_tasks.len(), true);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                Self::move_selection(&mut self.task_table, self.filtered_tasks.len(), false);
            }
            KeyCode::Enter => {
                if let Some(id) = self.selected_task_id() {
                    self.selected_task = Some(id);
                    self.go_to(Screen::TaskDetail);
                }
            }
            KeyCode::Char('a') => {
                self.task_form = TaskForm::new();
                self.go_to(Screen::AddTask);
            }
            KeyCode::Char('e') => {
                if let Some(id) = self.selected_task_id() {
                    if let Some(task) = self.ctx.task_by_id(id) {
                        self.task_form = TaskForm::from_task(task);
                        self.selected_task = Some(id);
                        self.go_to(Screen::EditTask);
                    }
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_task_id() {
                    self.confirm = Some(PendingAction::DeleteTask(id));
                    self.go_to(Screen::Confirm);
                }
            }
            KeyCode::Char('x') => {
                self.selected_task = self.selected_task_id();
                self.open_runs(None);
            }
            KeyCode::Char('s') => self.open_dashboard(),
            KeyCode::Char('r') => self.refresh_tasks(),
            KeyCode::Char('/') => self.filter_active = true,
            KeyCode::Char('h') => self.go_to(Screen::Help),
            _ => {}
        }
        false
    }

    fn handle_detail_input(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Left => self.screen = Screen::Tasks,
            KeyCode::Char('e') => {
                if let Some(task) = self.selected_task.and_then(|id| self.ctx.task_by_id(id)) {
                    self.task_form = TaskForm::from_task(task);
                    self.go_to(Screen::EditTask);
                }
            }
            KeyCode::Char('x') => self.open_runs(self.selected_task),
            _ => {}
        }
        false
    }

    fn handle_task_form_input(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Esc => self.screen = Screen::Tasks,
            KeyCode::Tab | KeyCode::Down => self.task_form.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.task_form.prev_field(),
            KeyCode::Left => self.task_form.handle_left_right(false),
            KeyCode::Right => self.task_form.handle_left_right(true),
            KeyCode::Backspace => self.task_form.handle_backspace(),
            KeyCode::Enter => self.submit_task_form(),
            KeyCode::Char(c) => self.task_form.handle_char(c),
            _ => {}
        }
        false
    }

    fn submit_task_form(&mut self) {
        let draft = match self.task_form.to_draft() {
            Ok(draft) => draft,
            Err(e) => {
                self.toast(e);
                return;
            }
        };
        let result = if self.screen == Screen::EditTask {
            match self.selected_task {
                Some(id) => self.ctx.update_task(id, &draft).map(|()| "Task updated"),
                None => {
                    self.toast("No task selected");
                    return;
                }
            }
        } else {
            self.ctx.create_task(&draft).map(|()| "Task created")
        };
        match result {
            Ok(message) => {
                self.toast(message);
                self.update_filtered_tasks();
                self.screen = Screen::Tasks;
            }
            Err(e) => self.toast(e.to_string()),
        }
    }

    fn handle_runs_input(&mut self, code: KeyCode) -> bool {
        if self.filter_active {
            match code {
                KeyCode::Esc => {
                    self.filter_active = false;
                    self.filter_text.clear();
                    self.run_filter.search = None;
                    self.refresh_runs();
                }
                KeyCode::Enter => {
                    self.filter_active = false;
                    self.run_filter.search =
                        Some(self.filter_text.clone()).filter(|s| !s.is_empty());
                    self.refresh_runs();
                }
                KeyCode::Backspace => {
                    self.filter_text.pop();
                }
                KeyCode::Char(c) => self.filter_text.push(c),
                _ => {}
            }
            return false;
        }

        match code {
            KeyCode::Esc | KeyCode::Char('q') => self.screen = Screen::Tasks,
            KeyCode::Down | KeyCode::Char('j') => {
                Self::move_selection(&mut self.run_table, self.ctx.executions.len(), true);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                Self::move_selection(&mut self.run_table, self.ctx.executions.len(), false);
            }
            KeyCode::Char('n') => self.open_record_form(),
            KeyCode::Char('e') => {
                if let Some(idx) = self.selected_run_index() {
                    self.run_form = Some(RunForm::from_execution(&self.ctx.executions[idx].execution));
                    self.go_to(Screen::RecordRun);
                }
            }
            KeyCode::Char('d') => {
                if let Some(idx) = self.selected_run_index() {
                    self.confirm = Some(PendingAction::DeleteRun(self.ctx.executions[idx].execution.id));
                    self.go_to(Screen::Confirm);
                }
            }
            KeyCode::Char('s') => self.open_dashboard(),
            KeyCode::Char('r') => self.refresh_runs(),
            KeyCode::Char('/') => self.filter_active = true,
            KeyCode::Char('h') => self.go_to(Screen::Help),
            _ => {}
        }
        false
    }

    fn handle_run_form_input(&mut self, code: KeyCode) -> bool {
        let Some(form) = self.run_form.as_mut() else {
            self.screen = Screen::Runs;
            return false;
        };
        match code {
            KeyCode::Esc => {
                self.run_form = None;
                self.screen = Screen::Runs;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left => form.handle_left_right(false),
            KeyCode::Right => form.handle_left_right(true),
            KeyCode::Backspace => form.handle_backspace(),
            KeyCode::Enter => self.submit_run_form(),
            KeyCode::Char(c) => form.handle_char(c),
            _ => {}
        }
        false
    }

    fn submit_run_form(&mut self) {
        let Some(form) = self.run_form.as_ref() else {
            return;
        };
        let draft = match form.to_draft() {
            Ok(draft) => draft,
            Err(e) => {
                self.toast(e);
                return;
            }
        };
        let filter = self.run_filter.clone();
        match self.ctx.submit_execution(&draft, &filter) {
            Ok(message) => {
                self.toast(message.unwrap_or_else(|| "Test execution recorded".into()));
                self.run_form = None;
                self.screen = Screen::Runs;
            }
            Err(e) => self.toast(e.to_string()),
        }
    }

    fn handle_dashboard_input(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Esc | KeyCode::Char('q') => self.screen = Screen::Tasks,
            KeyCode::Char('r') => {
                if let Err(e) = self.ctx.refresh_stats() {
                    self.toast(format!("Failed to load dashboard: {e}"));
                }
            }
            _ => {}
        }
        false
    }

    fn handle_confirm_input(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.confirm.take() {
                    Some(PendingAction::DeleteTask(id)) => {
                        match self.ctx.delete_task(id) {
                            // Recorded runs referencing the task survive.
                            Ok(()) => self.toast("Task deleted"),
                            Err(e) => self.toast(e.to_string()),
                        }
                        self.update_filtered_tasks();
                        self.screen = Screen::Tasks;
                    }
                    Some(PendingAction::DeleteRun(id)) => {
                        let filter = self.run_filter.clone();
                        match self.ctx.delete_execution(id, &filter) {
                            Ok(()) => self.toast("Test execution deleted"),
                            Err(e) => self.toast(e.to_string()),
                        }
                        self.screen = Screen::Runs;
                    }
                    None => self.screen = self.prev_screen,
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.confirm = None;
                self.screen = self.prev_screen;
            }
            _ => {}
        }
        false
    }

    // --------------------------------------------------------------- render

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
            .split(f.area());

        match self.screen {
            Screen::Tasks => self.render_tasks(f, chunks[0]),
            Screen::TaskDetail => self.render_task_detail(f, chunks[0]),
            Screen::AddTask => self.render_task_form(f, chunks[0], false),
            Screen::EditTask => self.render_task_form(f, chunks[0], true),
            Screen::Runs => self.render_runs(f, chunks[0]),
            Screen::RecordRun => self.render_run_form(f, chunks[0]),
            Screen::Dashboard => self.render_dashboard(f, chunks[0]),
            Screen::Help => self.render_help(f, chunks[0]),
            Screen::Confirm => {
                match self.prev_screen {
                    Screen::Runs => self.render_runs(f, chunks[0]),
                    _ => self.render_tasks(f, chunks[0]),
                }
                self.render_confirm(f, chunks[0]);
            }
        }

        self.render_status_bar(f, chunks[1]);
    }

    fn render_tasks(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let header_text = vec![Line::from(vec![
            Span::styled("QA TRACKER", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                "Tasks",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ])];
        let header_block = Paragraph::new(header_text)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header_block, chunks[0]);

        let header_cells = ["Status", "Pri", "Due", "Cases", "Tags", "Title"]
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().add_modifier(Modifier::BOLD)));
        let header = Row::new(header_cells)
            .style(Style::default().bg(STEEL_BLUE).fg(Color::White))
            .height(1);

        let today = Local::now().date_naive();
        let rows: Vec<Row> = self
            .filtered_tasks
            .iter()
            .filter_map(|&id| self.ctx.task_by_id(id))
            .map(|task| {
                let style = match task.status {
                    TaskStatus::Completed => Style::default().fg(Color::DarkGray),
                    TaskStatus::Failed => Style::default().fg(DARK_RED),
                    TaskStatus::InProgress => {
                        Style::default().fg(STEEL_BLUE).add_modifier(Modifier::BOLD)
                    }
                    TaskStatus::Pending => Style::default().fg(Color::White),
                };
                Row::new(vec![
                    Cell::from(task.status.as_str()),
                    Cell::from(task.priority.as_str()),
                    Cell::from(format_due_relative(task.due_date, today)),
                    Cell::from(task.test_cases.len().to_string()),
                    Cell::from(task.tags.join(",")),
                    Cell::from(task.title.clone()),
                ])
                .style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(12),
            Constraint::Length(7),
            Constraint::Length(10),
            Constraint::Length(6),
            Constraint::Length(24),
            Constraint::Min(25),
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(format!(
                "Tasks ({}/{}) - Press 'h' for help",
                self.filtered_tasks.len(),
                self.ctx.tasks.len()
            )))
            .row_highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, chunks[1], &mut self.task_table);
    }

    fn render_task_detail(&mut self, f: &mut Frame, area: Rect) {
        let Some(task) = self.selected_task.and_then(|id| self.ctx.task_by_id(id)) else {
            let missing = Paragraph::new("Task no longer exists")
                .block(Block::default().borders(Borders::ALL).title("Task"));
            f.render_widget(missing, area);
            return;
        };
        let today = Local::now().date_naive();
        let bold = Style::default().add_modifier(Modifier::BOLD);

        let mut text = vec![
            Line::from(vec![Span::styled("ID: ", bold), Span::raw(task.id.to_string())]),
            Line::from(vec![Span::styled("Title: ", bold), Span::raw(&task.title)]),
            Line::from(vec![
                Span::styled("Status: ", bold),
                Span::raw(task.status.as_str()),
            ]),
            Line::from(vec![
                Span::styled("Priority: ", bold),
                Span::raw(task.priority.as_str()),
            ]),
            Line::from(vec![
                Span::styled("Assignee: ", bold),
                Span::raw(task.assignee.as_deref().unwrap_or("-")),
            ]),
            Line::from(vec![
                Span::styled("Due: ", bold),
                Span::raw(format_due_relative(task.due_date, today)),
            ]),
            Line::from(vec![
                Span::styled("Tags: ", bold),
                Span::raw(task.tags.join(",")),
            ]),
            Line::from(""),
            Line::from(Span::styled("Description:", bold)),
            Line::from(task.description.clone()),
            Line::from(""),
            Line::from(Span::styled("Test cases:", bold)),
        ];
        for (i, case) in task.test_cases.iter().enumerate() {
            text.push(Line::from(format!("  {}. {case}", i + 1)));
        }
        if !task.notes.is_empty() {
            text.push(Line::from(""));
            text.push(Line::from(Span::styled("Notes:", bold)));
            text.push(Line::from(task.notes.clone()));
        }
        if !task.attached_images.is_empty() {
            text.push(Line::from(""));
            text.push(Line::from(vec![
                Span::styled("Images: ", bold),
                Span::raw(task.attached_images.join(", ")),
            ]));
        }

        let paragraph = Paragraph::new(text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Task Details - 'e' edit, 'x' runs, Esc back"),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_task_form(&mut self, f: &mut Frame, area: Rect, is_edit: bool) {
        let form = &self.task_form;
        let text_fields = [
            ("Title", &form.title),
            ("Description", &form.description),
            ("Tags (comma-separated)", &form.tags),
            ("Test cases (semicolon-separated)", &form.test_cases),
            ("Notes", &form.notes),
            ("Assignee", &form.assignee),
            ("Due (YYYY-MM-DD / today / in 3d)", &form.due),
            ("Images", &form.images),
        ];

        let mut lines = Vec::new();
        for (label, field) in text_fields {
            lines.push(field_line(label, &field.value, field.active));
        }
        lines.push(selector_line(
            "Status",
            form.statuses[form.status].as_str(),
            form.current_field == crate::tui::task_form::STATUS_ORDER,
        ));
        lines.push(selector_line(
            "Priority",
            form.priorities[form.priority].as_str(),
            form.current_field == crate::tui::task_form::PRIORITY_ORDER,
        ));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Tab next field | ←/→ cursor or value | Enter save | Esc cancel",
            Style::default().fg(Color::DarkGray),
        )));

        let title = if is_edit { "Edit Task" } else { "Add Task" };
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_runs(&mut self, f: &mut Frame, area: Rect) {
        let header_cells = ["Test ID", "Status", "Passed", "Tester", "Task"]
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().add_modifier(Modifier::BOLD)));
        let header = Row::new(header_cells)
            .style(Style::default().bg(STEEL_BLUE).fg(Color::White))
            .height(1);

        let rows: Vec<Row> = self
            .ctx
            .executions
            .iter()
            .map(|view| {
                let run = &view.execution;
                let style = Style::default().fg(run_status_color(run.status));
                let task = view
                    .task
                    .as_ref()
                    .map(|t| t.description.clone())
                    .unwrap_or_else(|| "(deleted)".into());
                Row::new(vec![
                    Cell::from(run.test_id.clone()),
                    Cell::from(run.status.as_str()),
                    Cell::from(format!(
                        "{}/{}",
                        run.passed_test_cases, run.total_test_cases
                    )),
                    Cell::from(run.tester_name.clone()),
                    Cell::from(task),
                ])
                .style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(14),
            Constraint::Min(20),
        ];

        let scope = match self.run_filter.task_id {
            Some(_) => "task runs",
            None => "all runs",
        };
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(format!(
                "Test Executions ({}, {scope}) - 'n' record, 'e' edit, 'd' delete",
                self.ctx.executions.len()
            )))
            .row_highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, area, &mut self.run_table);
    }

    fn render_run_form(&mut self, f: &mut Frame, area: Rect) {
        let Some(form) = self.run_form.as_ref() else {
            return;
        };
        let mut lines = vec![
            field_line("Test ID", &form.test_id.value, form.test_id.active),
            field_line("Tester", &form.tester.value, form.tester.active),
            field_line("Feedback", &form.feedback.value, form.feedback.active),
            selector_line(
                "Status",
                form.statuses[form.status].as_str(),
                form.current_field == crate::tui::run_form::STATUS_ORDER,
            ),
            Line::from(""),
            Line::from(Span::styled(
                "Test cases (space toggles pass/fail):",
                Style::default().add_modifier(Modifier::BOLD),
            )),
        ];
        for (i, case) in form.cases.iter().enumerate() {
            let active = form.current_field == CASES_ORDER + i;
            let (mark, color) = if case.passed {
                ("[pass]", DARK_GREEN)
            } else {
                ("[fail]", DARK_RED)
            };
            let style = if active {
                Style::default().fg(color).bg(Color::Gray)
            } else {
                Style::default().fg(color)
            };
            lines.push(Line::from(Span::styled(
                format!("  {mark} {}", case.text),
                style,
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Tab next field | Enter save | Esc cancel",
            Style::default().fg(Color::DarkGray),
        )));

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Record Test Run"))
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_dashboard(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(10), Constraint::Min(0)])
            .split(area);

        let bold = Style::default().add_modifier(Modifier::BOLD);
        let text = match &self.ctx.stats {
            Some(stats) => vec![
                Line::from(vec![
                    Span::styled("Tasks: ", bold),
                    Span::raw(stats.total_tasks.to_string()),
                    Span::raw("    "),
                    Span::styled("Test executions: ", bold),
                    Span::raw(stats.total_executions.to_string()),
                ]),
                Line::from(""),
                Line::from(vec![
                    Span::styled("completed ", Style::default().fg(DARK_GREEN)),
                    Span::raw(stats.completed_executions.to_string()),
                    Span::styled("   in-progress ", Style::default().fg(STEEL_BLUE)),
                    Span::raw(stats.in_progress_executions.to_string()),
                    Span::styled("   pending ", Style::default().fg(AMBER)),
                    Span::raw(stats.pending_executions.to_string()),
                    Span::styled("   failed ", Style::default().fg(DARK_RED)),
                    Span::raw(stats.failed_executions.to_string()),
                ]),
                Line::from(""),
                Line::from(vec![
                    Span::styled("Average pass rate: ", bold),
                    Span::raw(format!("{:.1}%", stats.average_pass_rate)),
                ]),
            ],
            None => vec![Line::from("No statistics loaded - press 'r' to refresh")],
        };
        let summary = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Dashboard"))
            .wrap(Wrap { trim: true });
        f.render_widget(summary, chunks[0]);

        let recent: Vec<Row> = self
            .ctx
            .stats
            .as_ref()
            .map(|stats| {
                stats
                    .recent_executions
                    .iter()
                    .map(|view| {
                        let run = &view.execution;
                        Row::new(vec![
                            Cell::from(run.test_id.clone()),
                            Cell::from(run.status.as_str()),
                            Cell::from(format!(
                                "{}/{}",
                                run.passed_test_cases, run.total_test_cases
                            )),
                            Cell::from(run.tester_name.clone()),
                        ])
                        .style(Style::default().fg(run_status_color(run.status)))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let widths = [
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Min(14),
        ];
        let table = Table::new(recent, widths)
            .header(
                Row::new(["Test ID", "Status", "Passed", "Tester"].map(Cell::from))
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(Block::default().borders(Borders::ALL).title("Recent Runs"));
        f.render_widget(table, chunks[1]);
    }

    fn render_help(&mut self, f: &mut Frame, area: Rect) {
        let text = vec![
            Line::from(Span::styled(
                "Key bindings",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Tasks      j/k move   Enter details   a add   e edit   d delete"),
            Line::from("           / filter   r refresh       x runs  s dashboard   q quit"),
            Line::from(""),
            Line::from("Runs       j/k move   n record   e edit   d delete   / search"),
            Line::from("           r refresh  s dashboard   Esc back"),
            Line::from(""),
            Line::from("Forms      Tab/Shift-Tab move   ←/→ cursor or value   space toggle case"),
            Line::from("           Enter save   Esc cancel"),
            Line::from(""),
            Line::from("Press any key to return"),
        ];
        let paragraph = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .alignment(Alignment::Left);
        f.render_widget(paragraph, area);
    }

    fn render_confirm(&mut self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .title("Confirm Action")
            .borders(Borders::ALL)
            .style(Style::default().bg(DARK_RED));

        let area = centered_rect(50, 20, area);
        f.render_widget(Clear, area);

        let action = match self.confirm {
            Some(PendingAction::DeleteTask(_)) => {
                "Delete this task? Recorded runs against it are kept."
            }
            Some(PendingAction::DeleteRun(_)) => "Delete this test execution?",
            None => "",
        };
        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                action,
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("This action cannot be undone."),
            Line::from(""),
            Line::from("Press 'y' to confirm, 'n' to cancel"),
        ];

        let paragraph = Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn render_status_bar(&mut self, f: &mut Frame, area: Rect) {
        let status_text = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else if self.filter_active {
            format!(
                "Search: {} (Esc to clear, Enter to confirm)",
                self.filter_text
            )
        } else {
            match self.screen {
                Screen::Tasks => format!(
                    "Tasks: {} | Press 'h' for help",
                    self.filtered_tasks.len()
                ),
                Screen::TaskDetail => "Task Details".to_string(),
                Screen::AddTask => "Add New Task".to_string(),
                Screen::EditTask => "Edit Task".to_string(),
                Screen::Runs => format!("Test executions: {}", self.ctx.executions.len()),
                Screen::RecordRun => "Record Test Run".to_string(),
                Screen::Dashboard => "Dashboard".to_string(),
                Screen::Help => "Help".to_string(),
                Screen::Confirm => "Confirm Action".to_string(),
            }
        };

        let status = Paragraph::new(status_text)
            .style(Style::default().bg(STEEL_BLUE).fg(Color::White))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    /// Main event loop: render, then poll for input until the user exits.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }
}

fn run_status_color(status: RunStatus) -> Color {
    match status {
        RunStatus::Completed => DARK_GREEN,
        RunStatus::InProgress => STEEL_BLUE,
        RunStatus::Pending => AMBER,
        RunStatus::Failed => DARK_RED,
    }
}

fn field_line<'a>(label: &'a str, value: &'a str, active: bool) -> Line<'a> {
    let label_style = if active {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let marker = if active { "> " } else { "  " };
    Line::from(vec![
        Span::raw(marker),
        Span::styled(format!("{label}: "), label_style),
        Span::raw(value),
    ])
}

fn selector_line<'a>(label: &'a str, value: &'a str, active: bool) -> Line<'a> {
    let label_style = if active {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let marker = if active { "> " } else { "  " };
    Line::from(vec![
        Span::raw(marker),
        Span::styled(format!("{label}: "), label_style),
        Span::raw(format!("< {value} >")),
    ])
}

/// Create a centered rect using a percentage of the available area.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Launch the terminal user interface against a running API server.
pub fn run_tui(server: &str) -> io::Result<()> {
    let ctx = DataContext::new(ApiClient::new(server));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(ctx);
    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}
