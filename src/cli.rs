use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Short usage shown with usage errors.
pub const USAGE: &str = "\
Usage: xo-rotate [--max-snapshots <n>] --token <token> <url>
       xo-rotate [--max-snapshots <n>] --user <user> [--password <password>] <url>";

#[derive(Parser, Debug)]
#[command(
    name = "xo-rotate",
    version,
    about = "Snapshot running Xen Orchestra VMs and rotate old automatic snapshots"
)]
pub struct Cli {
    /// URL of the XO instance to connect to (http://xo.company.tld)
    pub url: Option<String>,

    /// Token to use for authentication
    #[arg(long)]
    pub token: Option<String>,

    /// User to authenticate as
    #[arg(long)]
    pub user: Option<String>,

    /// Password for --user (asked interactively when omitted)
    #[arg(long)]
    pub password: Option<String>,

    /// Delete all automatic snapshots but the last <N> (0 = keep all)
    #[arg(short = 'n', long, value_name = "N", allow_negative_numbers = true)]
    pub max_snapshots: Option<i64>,

    /// Keep the disks of deleted snapshots
    #[arg(long)]
    pub keep_disks: bool,

    /// Show what would be snapshotted and deleted without doing it
    #[arg(long)]
    pub dry_run: bool,

    /// Rotate at most this many VMs at once
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Auto)]
    pub output: OutputFormat,

    /// Also write debug logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Interactive on a terminal, plain otherwise
    Auto,
    /// Spinners per VM
    Interactive,
    /// One line per event
    Plain,
    /// One JSON object per event
    Json,
}
