//! CLI module for shard-restore
//!
//! Provides command-line interface for:
//! - restore: Restore this worker's shard from the latest backup generation

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, RestoreArgs};
pub use commands::{restore, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
