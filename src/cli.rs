//! CLI argument parsing for the reset-and-import workflow.
use crate::workflow::DEFAULT_INPUT_PATH;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "conport-import",
    version,
    about = "Import a markdown context export into a workspace's knowledge store",
    after_help = "Examples:\n  conport-import --workspace ~/src/proj\n  conport-import --workspace ~/src/proj --reset\n  conport-import --db-dir ~/.conport --db-file ctx.sqlite --input exports/today"
)]
pub struct RootArgs {
    /// Workspace root the store belongs to
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub workspace: PathBuf,

    /// Export directory, relative to the workspace unless absolute
    #[arg(long, value_name = "PATH", default_value = DEFAULT_INPUT_PATH)]
    pub input: String,

    /// Database filename inside the store directory
    #[arg(long, value_name = "NAME")]
    pub db_file: Option<String>,

    /// Base directory holding one store directory per workspace
    #[arg(long, value_name = "DIR")]
    pub db_dir: Option<PathBuf>,

    /// Delete the workspace's store directory before importing
    #[arg(long)]
    pub reset: bool,

    /// Raise log verbosity on stderr (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
