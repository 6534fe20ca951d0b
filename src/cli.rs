use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "kup")]
#[command(
    about = "Keep LS-DYNA style input decks pointed at the newest include files, and flatten them for export"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Logging level (RUST_LOG overrides)
    #[arg(short, long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report includes that have a newer version next to them
    Check(CheckArgs),

    /// Rewrite decks to reference the newest include versions
    Update(UpdateArgs),

    /// Flatten decks and their includes into self-contained directories
    Export(ExportArgs),

    /// Initialize a keyup.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Whether a rewritten deck may replace the original
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePolicy {
    /// Ask on stdin for every deck
    #[default]
    Ask,
    /// Write without asking
    Always,
    /// Never write; report only
    Never,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Deck files to inspect
    #[arg(value_name = "DECK", required = true)]
    pub decks: Vec<PathBuf>,

    /// Emit JSON output (single-line)
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Deck files to update in place
    #[arg(value_name = "DECK", required = true)]
    pub decks: Vec<PathBuf>,

    /// When to write rewritten decks (defaults to config, then `ask`)
    #[arg(long, value_enum)]
    pub policy: Option<UpdatePolicy>,

    /// Shorthand for --policy always
    #[arg(short, long, conflicts_with = "policy")]
    pub yes: bool,

    /// Show a unified diff of every rewrite
    #[arg(long)]
    pub diff: bool,

    /// Emit JSON output (single-line)
    #[arg(long)]
    pub json: bool,
}

impl UpdateArgs {
    /// Policy chosen on the command line, if any
    pub fn cli_policy(&self) -> Option<UpdatePolicy> {
        if self.yes {
            Some(UpdatePolicy::Always)
        } else {
            self.policy
        }
    }
}

#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Deck files to export
    #[arg(value_name = "DECK", required = true)]
    pub decks: Vec<PathBuf>,

    /// Output root; each deck lands in <OUTPUT>/<deck stem>
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep exporting when an include is missing
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
