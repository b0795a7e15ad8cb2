//! CLI module - command-line interface for the timetracker server.

mod commands;

use clap::{Parser, Subcommand};

/// Timetracker - programme and project delivery tracker
#[derive(Parser)]
#[command(name = "timetracker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server (default)
    Serve,

    /// Write a default config.toml with a generated secret key
    Init,

    /// Reset the bootstrap admin's password and require a change at next login
    ResetAdminPassword {
        /// New temporary password; defaults to the configured bootstrap
        /// password (`BOOTSTRAP_ADMIN_PASSWORD`)
        #[arg(long)]
        password: Option<String>,

        /// Admin email; defaults to the configured bootstrap admin
        #[arg(long)]
        email: Option<String>,
    },
}

pub use commands::*;
