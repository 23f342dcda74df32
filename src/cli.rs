use clap::Parser;

use crate::cmd::Commands;

/// QA task tracker: create QA tasks, record test runs against them and view
/// aggregate dashboards. `serve` hosts the HTTP API; everything else talks to
/// a running server.
#[derive(Parser)]
#[command(name = "qat", version, about = "QA task and test-run tracking CLI")]
pub struct Cli {
    /// Base URL of the API server used by client commands.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8787")]
    pub server: String,

    #[command(subcommand)]
    pub command: Commands,
}
