//! CLI module: command-line argument parsing and command execution.

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

/// Preflight media-library validator
///
/// Checks a media library for corrupt streams, mistagged languages, and
/// truncated subtitles before any processing run touches it.
#[derive(Parser)]
#[command(name = "preflight")]
#[command(about = "Preflight validation for media libraries")]
#[command(version)]
pub struct Cli {
    /// Logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Validate a media library tree
    Check(args::CheckArgs),
    /// Manage saved expectation profiles
    #[command(subcommand)]
    Profile(args::ProfileCommands),
}
