//! CLI module for geoquery
//!
//! Provides command-line interface for:
//! - init: Create an empty store file
//! - query: One-shot query execution
//! - edit: One-shot transaction commit

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    edit, execute_edit, execute_query, init, query, run, run_command, Config, EditRequest,
    QueryRequest,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, read_request_from, write_error, write_response};
