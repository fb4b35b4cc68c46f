//! CLI argument definitions using clap
//!
//! Commands:
//! - geoquery init --config <path>
//! - geoquery query --config <path>
//! - geoquery edit --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::observability::Severity;

/// geoquery - transactional spatial feature queries over a feature store file
#[derive(Parser, Debug)]
#[command(name = "geoquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Minimum log severity (trace, info, warn, error, fatal)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: Severity,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty feature store file
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./geoquery.json")]
        config: PathBuf,
    },

    /// Run one query read from stdin and exit
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./geoquery.json")]
        config: PathBuf,
    },

    /// Commit one transaction read from stdin and exit
    Edit {
        /// Path to configuration file
        #[arg(long, default_value = "./geoquery.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
