//! Command-line argument definitions

use std::path::PathBuf;

use clap::{Args, Subcommand};

fn percentage(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|err| format!("invalid percentage '{}': {}", s, err))?;
    if value > 0.0 && value <= 100.0 {
        Ok(value)
    } else {
        Err(format!("percentage must be within (0, 100], got {}", value))
    }
}

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Root of the media library to validate
    pub path: PathBuf,

    /// Named expectation profile to enforce
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Run consensus checks against directory siblings (default when no
    /// profile is given)
    #[arg(long)]
    pub auto: bool,

    /// Share of siblings required before an absence is a warning
    #[arg(long, value_parser = percentage)]
    pub quorum: Option<f64>,

    /// Share of siblings below which an absence is suppressed
    #[arg(long, value_parser = percentage)]
    pub soft_floor: Option<f64>,

    /// Minimum files per directory for consensus analysis
    #[arg(long)]
    pub min_group: Option<usize>,

    /// Decode depth: sampled or full
    #[arg(long)]
    pub depth: Option<String>,

    /// Emit the full report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Profile management commands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List saved profiles
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Save (or replace) a named profile
    Save(SaveProfileArgs),
    /// Delete a named profile
    Delete {
        /// Profile name
        name: String,
    },
}

/// Arguments for saving a profile
#[derive(Args, Debug)]
pub struct SaveProfileArgs {
    /// Profile name
    pub name: String,

    /// Expected audio languages (BCP-47 tags)
    #[arg(long, value_delimiter = ',')]
    pub audio: Vec<String>,

    /// Expected subtitle languages (BCP-47 tags)
    #[arg(long, value_delimiter = ',')]
    pub subs: Vec<String>,

    /// Require a video track in every file
    #[arg(long)]
    pub require_video: bool,

    /// Warn on tracks without language tags
    #[arg(long)]
    pub require_tags: bool,

    /// Allowed per-stream duration deviation, percent
    #[arg(long, value_parser = percentage)]
    pub duration_tolerance: Option<f64>,

    /// Minimum subtitle runtime coverage, percent
    #[arg(long, value_parser = percentage)]
    pub subtitle_threshold: Option<f64>,

    /// Probe same-stem external audio sidecars
    #[arg(long)]
    pub external_audio: bool,

    /// Media extensions to validate
    #[arg(long, value_delimiter = ',')]
    pub extensions: Vec<String>,
}
