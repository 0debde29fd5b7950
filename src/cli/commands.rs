//! Command execution for the CLI

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::check::{CheckRequest, CheckRunner};
use crate::cli::args::{CheckArgs, ProfileCommands, SaveProfileArgs};
use crate::domain::{
    AutoCheckConfig, DecodeDepth, ExpectationProfile, IssueSource, Severity, ValidationReport,
};
use crate::profiles::ProfileStore;
use crate::progress::ConsoleCallbacks;
use crate::report::code_label;
use crate::settings::{resolve_decode_depth, TomlSettings};

/// Directory holding the profile and settings stores.
///
/// `PREFLIGHT_CONFIG_DIR` overrides the default of
/// `$HOME/.config/preflight`; without a home directory the current
/// directory is used.
fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("PREFLIGHT_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".config").join("preflight"),
        None => PathBuf::from("."),
    }
}

fn profile_store() -> ProfileStore {
    ProfileStore::new(config_dir().join("profiles.toml"))
}

/// Execute the check command. Returns `true` when the report contains
/// error-severity findings, which maps to a failing exit code.
pub async fn execute_check_command(args: CheckArgs, cancel_flag: Arc<AtomicBool>) -> Result<bool> {
    let profile = match &args.profile {
        Some(name) => Some(
            profile_store()
                .get(name)
                .with_context(|| format!("cannot load profile '{}'", name))?,
        ),
        None => None,
    };

    // Auto mode runs when requested explicitly or when no profile names
    // expectations to enforce.
    let auto = if args.auto || profile.is_none() {
        let mut config = AutoCheckConfig::default();
        if let Some(quorum) = args.quorum {
            config.quorum_pct = quorum;
        }
        if let Some(soft_floor) = args.soft_floor {
            config.soft_floor_pct = soft_floor;
        }
        if let Some(min_group) = args.min_group {
            config.min_group_size = min_group;
        }
        Some(config)
    } else {
        None
    };

    let explicit_depth = args
        .depth
        .as_deref()
        .map(DecodeDepth::parse)
        .transpose()
        .context("invalid --depth value")?;
    let settings = TomlSettings::new(config_dir().join("settings.toml"));
    let decode_depth = resolve_decode_depth(explicit_depth, &settings);

    let callbacks = ConsoleCallbacks::new(cancel_flag);
    let runner = CheckRunner::new();
    let report = runner
        .run(
            CheckRequest {
                root: args.path.clone(),
                profile,
                auto,
                decode_depth,
            },
            &callbacks,
        )
        .await
        .with_context(|| format!("check failed for {}", args.path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render_human(&report);
    }
    Ok(report.has_errors())
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "ERROR",
        Severity::Warning => "WARN ",
        Severity::Info => "INFO ",
    }
}

fn source_tag(source: IssueSource) -> &'static str {
    match source {
        IssueSource::Profile => "profile",
        IssueSource::Structural => "structural",
        IssueSource::Auto => "auto",
    }
}

fn render_human(report: &ValidationReport) {
    println!(
        "Checked {} file(s) under {}",
        report.total_files,
        report.root.display()
    );

    if !report.summaries.is_empty() {
        println!();
        println!("Summary:");
        for summary in &report.summaries {
            println!("  [{}] {}", source_tag(summary.source), summary.text);
        }
    }

    if !report.issues.is_empty() {
        println!();
        println!("Findings:");
        for issue in &report.issues {
            let location = match issue.stream {
                Some(stream) => format!("{}#{}", issue.path.display(), stream),
                None => issue.path.display().to_string(),
            };
            println!(
                "  {} {} - {}: {}",
                severity_tag(issue.severity),
                code_label(issue.code),
                location,
                issue.message
            );
        }
    }

    println!();
    println!(
        "{} error(s), {} warning(s), {} informational",
        report.error_count, report.warning_count, report.info_count
    );
}

/// Execute a profile management command.
pub fn execute_profile_command(command: ProfileCommands) -> Result<()> {
    let store = profile_store();
    match command {
        ProfileCommands::List { json } => {
            let profiles = store.list().context("cannot list profiles")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&profiles)?);
            } else if profiles.is_empty() {
                println!("No saved profiles");
            } else {
                for profile in profiles {
                    println!(
                        "{}: audio [{}], subtitles [{}]{}{}",
                        profile.name,
                        profile.expected_audio_languages.join(", "),
                        profile.expected_subtitle_languages.join(", "),
                        if profile.require_video_track {
                            ", requires video"
                        } else {
                            ""
                        },
                        if profile.require_language_tags {
                            ", requires language tags"
                        } else {
                            ""
                        },
                    );
                }
            }
        }
        ProfileCommands::Save(args) => {
            let profile = profile_from_args(args);
            store
                .save(&profile)
                .with_context(|| format!("cannot save profile '{}'", profile.name))?;
            info!("saved profile {}", profile.name);
            println!("Saved profile '{}'", profile.name);
        }
        ProfileCommands::Delete { name } => {
            store
                .delete(&name)
                .with_context(|| format!("cannot delete profile '{}'", name))?;
            println!("Deleted profile '{}'", name);
        }
    }
    Ok(())
}

fn profile_from_args(args: SaveProfileArgs) -> ExpectationProfile {
    let mut profile = ExpectationProfile::new(args.name);
    profile.expected_audio_languages = args.audio;
    profile.expected_subtitle_languages = args.subs;
    profile.require_video_track = args.require_video;
    profile.require_language_tags = args.require_tags;
    if let Some(tolerance) = args.duration_tolerance {
        profile.duration_tolerance_pct = tolerance;
    }
    if let Some(threshold) = args.subtitle_threshold {
        profile.subtitle_line_threshold_pct = threshold;
    }
    profile.check_external_audio = args.external_audio;
    if !args.extensions.is_empty() {
        profile.video_extensions = args.extensions;
    }
    profile
}
