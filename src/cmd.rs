//! Command implementations for the CLI interface.
//!
//! `serve` hosts the HTTP API; every other command is a client of it, going
//! through the same [`ApiClient`] the terminal UI uses.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use clap::{CommandFactory, Subcommand};
use clap_complete::{generate, Shell};
use uuid::Uuid;

use crate::api::executions::ExecutionView;
use crate::cli::Cli;
use crate::client::{ApiClient, ClientError, ExecutionFilter};
use crate::execution::{ExecutionDraft, TestCaseResult};
use crate::fields::{Priority, RunStatus, SortField, SortOrder, TaskStatus};
use crate::store::Backend;
use crate::task::{clean_tags, format_due_relative, parse_due_input, Task, TaskDraft};
use crate::tui::app::run_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server.
    Serve {
        /// Listen address.
        #[arg(long, default_value = "127.0.0.1:8787")]
        addr: SocketAddr,
        /// Persistence backend.
        #[arg(long, value_enum, default_value_t = Backend::Json)]
        backend: Backend,
        /// Path to the store file. Defaults to ~/.qat/<backend default>.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Launch the interactive UI against a running server.
    Ui,

    /// Add a new QA task.
    Add {
        /// Short title for the task.
        title: String,
        /// What this task verifies.
        #[arg(long)]
        desc: String,
        /// Comma-separated tags. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Test-case description. May be repeated.
        #[arg(long = "case")]
        test_cases: Vec<String>,
        /// Free-form notes.
        #[arg(long)]
        notes: Option<String>,
        /// Person responsible.
        #[arg(long)]
        assignee: Option<String>,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", or "in Nd".
        #[arg(long)]
        due: Option<String>,
        /// Status: pending | in-progress | completed | failed.
        #[arg(long, value_enum, default_value_t = TaskStatus::Pending)]
        status: TaskStatus,
        /// Priority: low | medium | high.
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
    },

    /// List tasks with optional filters.
    List {
        /// Filter by status.
        #[arg(long, value_enum)]
        status: Option<TaskStatus>,
        /// Filter by priority.
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Filter by tag. May be repeated. Accepts comma-separated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task by ID.
    View {
        /// Task ID to view.
        id: String,
    },

    /// Update fields on a task.
    Update {
        /// Task ID to update.
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        /// Add tags. May be repeated and comma-separated.
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,
        /// Remove tags. May be repeated and comma-separated.
        #[arg(long = "rm-tag")]
        rm_tags: Vec<String>,
        /// Replace the test-case list. May be repeated.
        #[arg(long = "case")]
        test_cases: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", or "in Nd".
        #[arg(long)]
        due: Option<String>,
        /// Clear due date.
        #[arg(long)]
        clear_due: bool,
        #[arg(long, value_enum)]
        status: Option<TaskStatus>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
    },

    /// Mark a task completed.
    Complete {
        /// Task ID to complete.
        id: String,
    },

    /// Delete a task. Recorded runs referencing it are kept.
    Delete {
        /// Task ID to delete.
        id: String,
    },

    /// Record a test run against a task.
    Record {
        /// Task ID the run verifies.
        task: String,
        /// Run identifier; re-using an existing one overwrites that run.
        #[arg(long)]
        test_id: String,
        /// Who ran the tests.
        #[arg(long)]
        tester: String,
        /// Overall feedback for the run.
        #[arg(long)]
        feedback: String,
        /// Case result as "description=pass" or "description=fail". May be repeated.
        #[arg(long = "case")]
        cases: Vec<String>,
        /// Status: pending | in-progress | completed | failed.
        #[arg(long, value_enum, default_value_t = RunStatus::Pending)]
        status: RunStatus,
    },

    /// List recorded test runs.
    Runs {
        /// Filter by status (exact match; "all" disables).
        #[arg(long)]
        status: Option<String>,
        /// Filter by the task a run belongs to.
        #[arg(long)]
        task: Option<String>,
        /// Case-insensitive substring match on the run identifier.
        #[arg(long)]
        test_id: Option<String>,
        /// Free-text search over run id, tester and feedback.
        #[arg(long)]
        search: Option<String>,
        /// Sort key.
        #[arg(long, value_enum)]
        sort: Option<SortField>,
        /// Sort direction.
        #[arg(long, value_enum)]
        order: Option<SortOrder>,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show aggregate dashboard statistics.
    Stats,

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn bail(err: ClientError) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(1);
}

fn parse_id(raw: &str) -> Uuid {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => id,
        Err(_) => {
            eprintln!("Invalid task ID: {raw}");
            std::process::exit(1);
        }
    }
}

fn format_ts(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".into())
}

fn format_day(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".into())
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Print tasks in a formatted table.
fn print_task_table(tasks: &[&Task]) {
    println!(
        "{:<36} {:<12} {:<7} {:<10} {:<6} {}",
        "ID", "Status", "Pri", "Due", "Cases", "Title [tags]"
    );
    let today = chrono::Local::now().date_naive();
    for t in tasks {
        let tags = if t.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tags.join(","))
        };
        println!(
            "{:<36} {:<12} {:<7} {:<10} {:<6} {}{}",
            t.id,
            t.status.as_str(),
            t.priority.as_str(),
            format_due_relative(t.due_date, today),
            t.test_cases.len(),
            truncate(&t.title, 40),
            tags
        );
    }
}

fn print_run_table(runs: &[ExecutionView]) {
    println!(
        "{:<16} {:<12} {:<8} {:<14} {:<12} {}",
        "Test ID", "Status", "Passed", "Tester", "When", "Task"
    );
    for view in runs {
        let run = &view.execution;
        let task = view
            .task
            .as_ref()
            .map(|t| truncate(&t.description, 32))
            .unwrap_or_else(|| "(deleted)".into());
        println!(
            "{:<16} {:<12} {:<8} {:<14} {:<12} {}",
            truncate(&run.test_id, 16),
            run.status.as_str(),
            format!("{}/{}", run.passed_test_cases, run.total_test_cases),
            truncate(&run.tester_name, 14),
            format_day(run.created_at),
            task
        );
    }
}

/// Start the API server.
pub fn cmd_serve(addr: SocketAddr, backend: Backend, db: Option<PathBuf>) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_path = db.unwrap_or_else(|| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let data_dir = PathBuf::from(home).join(".qat");
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            eprintln!("Failed to create data directory {}: {}", data_dir.display(), e);
            std::process::exit(1);
        }
        data_dir.join(backend.default_file_name())
    });

    let store = match crate::store::open(backend, &db_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open store {}: {}", db_path.display(), e);
            std::process::exit(1);
        }
    };
    tracing::info!(path = %db_path.display(), "store ready");

    if let Err(e) = crate::server::run(addr, store) {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Launch the terminal user interface.
pub fn cmd_ui(server: &str) {
    if let Err(e) = run_tui(server) {
        eprintln!("UI error: {e}");
        std::process::exit(1);
    }
}

/// Add a new task through the API.
#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    api: &ApiClient,
    title: String,
    desc: String,
    tags: Vec<String>,
    test_cases: Vec<String>,
    notes: Option<String>,
    assignee: Option<String>,
    due: Option<String>,
    status: TaskStatus,
    priority: Priority,
) {
    let due_date = match due.as_deref() {
        Some(raw) => match parse_due_input(raw) {
            Some(d) => Some(d),
            None => {
                eprintln!("Unrecognised due date: {raw}");
                std::process::exit(1);
            }
        },
        None => None,
    };
    let draft = TaskDraft {
        title,
        description: desc,
        status,
        priority,
        assignee,
        due_date,
        tags,
        test_cases,
        notes,
        attached_images: Vec::new(),
    };
    if let Err(e) = draft.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    match api.create_task(&draft) {
        Ok(task) => println!("Added task {}", task.id),
        Err(e) => bail(e),
    }
}

/// List tasks with optional filtering.
pub fn cmd_list(
    api: &ApiClient,
    status: Option<TaskStatus>,
    priority: Option<Priority>,
    tags: Vec<String>,
    limit: Option<usize>,
) {
    let tags = clean_tags(&tags);
    let tasks = match api.list_tasks() {
        Ok(tasks) => tasks,
        Err(e) => bail(e),
    };
    let mut filtered: Vec<&Task> = tasks
        .iter()
        .filter(|t| {
            if let Some(s) = status {
                if t.status != s {
                    return false;
                }
            }
            if let Some(p) = priority {
                if t.priority != p {
                    return false;
                }
            }
            tags.iter().all(|tag| t.tags.contains(tag))
        })
        .collect();
    if let Some(n) = limit {
        filtered.truncate(n);
    }
    print_task_table(&filtered);
}

/// View detailed information about a single task.
pub fn cmd_view(api: &ApiClient, id: String) {
    let task = match api.get_task(parse_id(&id)) {
        Ok(task) => task,
        Err(e) => bail(e),
    };
    let today = chrono::Local::now().date_naive();
    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Status:       {}", task.status.as_str());
    println!("Priority:     {}", task.priority.as_str());
    println!(
        "Assignee:     {}",
        task.assignee.clone().unwrap_or_else(|| "-".into())
    );
    println!(
        "Due:          {}",
        match task.due_date {
            Some(d) => format!("{d} ({})", format_due_relative(Some(d), today)),
            None => "-".into(),
        }
    );
    println!("Tags:         {}", task.tags.join(","));
    println!("Created UTC:  {}", format_ts(task.created_at));
    println!("Updated UTC:  {}", format_ts(task.updated_at));
    println!("Description:\n{}\n", task.description);
    println!("Test cases:");
    for (i, case) in task.test_cases.iter().enumerate() {
        println!("  {}. {case}", i + 1);
    }
    if !task.notes.is_empty() {
        println!("Notes:\n{}", task.notes);
    }
    if !task.attached_images.is_empty() {
        println!("Images:       {}", task.attached_images.join(", "));
    }
}

/// Update fields on an existing task.
#[allow(clippy::too_many_arguments)]
pub fn cmd_update(
    api: &ApiClient,
    id: String,
    title: Option<String>,
    desc: Option<String>,
    add_tags: Vec<String>,
    rm_tags: Vec<String>,
    test_cases: Vec<String>,
    notes: Option<String>,
    assignee: Option<String>,
    due: Option<String>,
    clear_due: bool,
    status: Option<TaskStatus>,
    priority: Option<Priority>,
) {
    let id = parse_id(&id);
    let task = match api.get_task(id) {
        Ok(task) => task,
        Err(e) => bail(e),
    };
    let mut draft = TaskDraft::from_task(&task);

    if let Some(title) = title {
        draft.title = title;
    }
    if let Some(desc) = desc {
        draft.description = desc;
    }
    if let Some(notes) = notes {
        draft.notes = Some(notes);
    }
    if let Some(assignee) = assignee {
        draft.assignee = Some(assignee);
    }
    if let Some(status) = status {
        draft.status = status;
    }
    if let Some(priority) = priority {
        draft.priority = priority;
    }
    if !test_cases.is_empty() {
        draft.test_cases = test_cases;
    }
    if !add_tags.is_empty() {
        draft.tags.extend(clean_tags(&add_tags));
    }
    if !rm_tags.is_empty() {
        let remove = clean_tags(&rm_tags);
        draft.tags.retain(|t| !remove.contains(t));
    }
    if clear_due {
        draft.due_date = None;
    } else if let Some(raw) = due.as_deref() {
        match parse_due_input(raw) {
            Some(d) => draft.due_date = Some(d),
            None => {
                eprintln!("Unrecognised due date: {raw}");
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = draft.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    match api.update_task(id, &draft) {
        Ok(task) => println!("Updated task {}", task.id),
        Err(e) => bail(e),
    }
}

/// Mark a task completed.
pub fn cmd_complete(api: &ApiClient, id: String) {
    let id = parse_id(&id);
    let task = match api.get_task(id) {
        Ok(task) => task,
        Err(e) => bail(e),
    };
    let mut draft = TaskDraft::from_task(&task);
    draft.status = TaskStatus::Completed;
    match api.update_task(id, &draft) {
        Ok(_) => println!("Completed task {id}"),
        Err(e) => bail(e),
    }
}

/// Delete a task.
pub fn cmd_delete(api: &ApiClient, id: String) {
    let id = parse_id(&id);
    match api.delete_task(id) {
        Ok(()) => println!("Deleted task {id}"),
        Err(e) => bail(e),
    }
}

fn parse_case_spec(spec: &str) -> TestCaseResult {
    let Some((text, outcome)) = spec.rsplit_once('=') else {
        eprintln!("Case must look like \"description=pass\" or \"description=fail\": {spec}");
        std::process::exit(1);
    };
    let passed = match outcome.trim().to_lowercase().as_str() {
        "pass" | "passed" => true,
        "fail" | "failed" => false,
        other => {
            eprintln!("Unknown case outcome \"{other}\" in: {spec}");
            std::process::exit(1);
        }
    };
    TestCaseResult {
        test_case: text.trim().to_string(),
        passed,
        notes: None,
    }
}

/// Record a test run against a task.
pub fn cmd_record(
    api: &ApiClient,
    task: String,
    test_id: String,
    tester: String,
    feedback: String,
    cases: Vec<String>,
    status: RunStatus,
) {
    let task_id = parse_id(&task);
    let draft = ExecutionDraft {
        task_id: Some(task_id.to_string()),
        test_id,
        test_cases: cases.iter().map(|spec| parse_case_spec(spec)).collect(),
        status,
        feedback,
        attached_images: Vec::new(),
        tester_name: tester,
    };
    if let Err(e) = draft.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    match api.submit_execution(&draft) {
        Ok((view, message)) => {
            let run = &view.execution;
            println!(
                "{} ({}/{} passed)",
                message.unwrap_or_else(|| "Recorded test execution".into()),
                run.passed_test_cases,
                run.total_test_cases
            );
        }
        Err(e) => bail(e),
    }
}

/// List recorded test runs.
#[allow(clippy::too_many_arguments)]
pub fn cmd_runs(
    api: &ApiClient,
    status: Option<String>,
    task: Option<String>,
    test_id: Option<String>,
    search: Option<String>,
    sort: Option<SortField>,
    order: Option<SortOrder>,
    limit: Option<usize>,
) {
    let filter = ExecutionFilter {
        status,
        task_id: task.as_deref().map(parse_id),
        test_id,
        search,
        sort_by: sort,
        sort_order: order,
    };
    let mut runs = match api.list_executions(&filter) {
        Ok(runs) => runs,
        Err(e) => bail(e),
    };
    if let Some(n) = limit {
        runs.truncate(n);
    }
    print_run_table(&runs);
}

/// Print aggregate dashboard statistics.
pub fn cmd_stats(api: &ApiClient) {
    let stats = match api.dashboard() {
        Ok(stats) => stats,
        Err(e) => bail(e),
    };
    println!("Tasks:              {}", stats.total_tasks);
    println!("Test executions:    {}", stats.total_executions);
    println!("  completed:        {}", stats.completed_executions);
    println!("  in progress:      {}", stats.in_progress_executions);
    println!("  pending:          {}", stats.pending_executions);
    println!("  failed:           {}", stats.failed_executions);
    println!("Average pass rate:  {:.1}%", stats.average_pass_rate);
    if !stats.recent_executions.is_empty() {
        println!("\nRecent runs:");
        print_run_table(&stats.recent_executions);
    }
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "qat", &mut std::io::stdout());
}
