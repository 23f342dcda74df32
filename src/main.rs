//! # QAT - QA Task Tracker
//!
//! A quality-assurance task tracker: QA tasks carry tags, a description and a
//! test-case list; test runs record per-case pass/fail outcomes, feedback and
//! tester identity; dashboards aggregate the results.
//!
//! ## Key Features
//!
//! - **HTTP JSON API**: uniform `{success, data, error, message}` envelope
//!   over task CRUD, test-execution recording and dashboard statistics
//! - **Two stores**: a JSON document file or SQLite, selected at startup
//! - **Multiple Interfaces**: scriptable CLI for automation + interactive TUI
//!   with forms and tables for visual management
//! - **Upsert-by-test-id**: re-submitting a run with a known test id
//!   overwrites that run instead of duplicating it
//!
//! ## Quick Start
//!
//! ```bash
//! # Host the API (JSON store under ~/.qat by default)
//! qat serve
//!
//! # In another terminal: launch the UI
//! qat ui
//!
//! # Or drive it from the CLI
//! qat add "Login flow" --desc "Verify the login page" --tag auth --case "happy path"
//! qat list
//! qat record <task-id> --test-id RUN-1 --tester alice --feedback "all good" \
//!     --case "happy path=pass"
//! qat stats
//! ```
//!
//! Run `qat serve --backend sqlite` to use the relational store instead of
//! the JSON document file.

use clap::Parser;

pub mod api;
pub mod cli;
pub mod client;
pub mod cmd;
pub mod execution;
pub mod fields;
pub mod server;
pub mod store;
pub mod task;
pub mod tui {
    pub mod app;
    pub mod colors;
    pub mod input;
    pub mod run_form;
    pub mod task_form;
}

use cli::Cli;
use client::ApiClient;
use cmd::*;

fn main() {
    let cli = Cli::parse();

    // Serve, UI and completions don't need an API client.
    match &cli.command {
        Commands::Serve { addr, backend, db } => return cmd_serve(*addr, *backend, db.clone()),
        Commands::Ui => return cmd_ui(&cli.server),
        Commands::Completions { shell } => return cmd_completions(*shell),
        _ => {}
    }

    let api = ApiClient::new(&cli.server);

    match cli.command {
        Commands::Serve { .. } | Commands::Ui | Commands::Completions { .. } => {
            unreachable!("handled above")
        }

        Commands::Add {
            title, desc, tags, test_cases, notes, assignee, due, status, priority,
        } => cmd_add(
            &api, title, desc, tags, test_cases, notes, assignee, due, status, priority,
        ),

        Commands::List { status, priority, tags, limit } => {
            cmd_list(&api, status, priority, tags, limit)
        }

        Commands::View { id } => cmd_view(&api, id),

        Commands::Update {
            id, title, desc, add_tags, rm_tags, test_cases, notes, assignee, due,
            clear_due, status, priority,
        } => cmd_update(
            &api, id, title, desc, add_tags, rm_tags, test_cases, notes, assignee, due,
            clear_due, status, priority,
        ),

        Commands::Complete { id } => cmd_complete(&api, id),

        Commands::Delete { id } => cmd_delete(&api, id),

        Commands::Record { task, test_id, tester, feedback, cases, status } => {
            cmd_record(&api, task, test_id, tester, feedback, cases, status)
        }

        Commands::Runs { status, task, test_id, search, sort, order, limit } => {
            cmd_runs(&api, status, task, test_id, search, sort, order, limit)
        }

        Commands::Stats => cmd_stats(&api),
    }
}
