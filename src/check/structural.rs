//! Structural checks that run unconditionally for every probed file:
//! probe failures, duration anomalies, and subtitle integrity.

use crate::domain::{
    FileCheckResult, Issue, IssueCode, IssueSource, Severity, SubtitleOrigin, SubtitleSource,
};

/// Default per-stream duration tolerance when no profile is supplied.
pub const DEFAULT_DURATION_TOLERANCE_PCT: f64 = 5.0;

/// Default minimum runtime coverage for subtitles, percent.
pub const DEFAULT_SUBTITLE_THRESHOLD_PCT: f64 = 60.0;

/// Run the structural pass over one file, appending findings.
pub fn run_structural_checks(
    file: &FileCheckResult,
    duration_tolerance_pct: f64,
    subtitle_threshold_pct: f64,
    issues: &mut Vec<Issue>,
) {
    if let Some(probe_error) = &file.probe_error {
        issues.push(Issue::new(
            Severity::Error,
            IssueSource::Structural,
            IssueCode::ProbeFailed,
            &file.path,
            format!("Metadata probe failed: {}", probe_error),
        ));
        return;
    }
    let Some(probe) = &file.probe else {
        return;
    };

    match probe.duration {
        None => issues.push(Issue::new(
            Severity::Warning,
            IssueSource::Structural,
            IssueCode::UnknownDuration,
            &file.path,
            "Container duration could not be determined",
        )),
        Some(container_duration) => {
            check_stream_durations(file, container_duration, duration_tolerance_pct, issues);
        }
    }

    // Subtitle checks run regardless; coverage needs a runtime reference
    // and is skipped when the duration is unknown.
    let reference_duration = probe.duration.unwrap_or(f64::INFINITY);
    for source in &file.subtitle_sources {
        check_subtitle_source(file, source, reference_duration, subtitle_threshold_pct, issues);
    }
}

/// Flag audio streams whose reported duration deviates from the container
/// duration beyond the tolerance. These findings carry the stream index
/// so the correlator can pair them with decode failures.
fn check_stream_durations(
    file: &FileCheckResult,
    container_duration: f64,
    tolerance_pct: f64,
    issues: &mut Vec<Issue>,
) {
    let Some(probe) = file.probe.as_ref() else {
        return;
    };
    let tolerance = container_duration * tolerance_pct / 100.0;
    for track in &probe.audio_tracks {
        let Some(stream_duration) = track.duration else {
            continue;
        };
        let deviation = (stream_duration - container_duration).abs();
        if deviation > tolerance {
            let mut issue = Issue::new(
                Severity::Warning,
                IssueSource::Structural,
                IssueCode::DurationMismatch,
                &file.path,
                format!(
                    "Audio stream {} runs {:.1}s but the container runs {:.1}s (deviation {:.1}s)",
                    track.stream_index, stream_duration, container_duration, deviation
                ),
            )
            .with_stream(track.stream_index);
            if let Some(language) = &track.language {
                issue = issue.with_language(language.clone());
            }
            issues.push(issue);
        }
    }
}

fn check_subtitle_source(
    file: &FileCheckResult,
    source: &SubtitleSource,
    container_duration: f64,
    threshold_pct: f64,
    issues: &mut Vec<Issue>,
) {
    let Some(analysis) = &source.analysis else {
        return;
    };
    let label = match &source.origin {
        SubtitleOrigin::External { path } => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        SubtitleOrigin::Embedded { stream_index } => format!("embedded stream {}", stream_index),
    };

    if analysis.is_empty {
        issues.push(Issue::new(
            Severity::Warning,
            IssueSource::Structural,
            IssueCode::SubtitleEmpty,
            &file.path,
            format!("Subtitle {} is empty", label),
        ));
        return;
    }
    if let Some(anomaly) = &analysis.encoding_anomaly {
        issues.push(Issue::new(
            Severity::Warning,
            IssueSource::Structural,
            IssueCode::SubtitleEncodingAnomaly,
            &file.path,
            format!("Subtitle {} has an encoding anomaly: {}", label, anomaly),
        ));
    }
    if let Some(parse_error) = &analysis.parse_error {
        issues.push(Issue::new(
            Severity::Warning,
            IssueSource::Structural,
            IssueCode::SubtitleParseFailed,
            &file.path,
            format!("Subtitle {} failed to parse: {}", label, parse_error),
        ));
        return;
    }

    if container_duration.is_finite() && container_duration > 0.0 {
        if let Some(last_end) = analysis.last_event_end {
            let coverage_pct = (last_end / container_duration * 100.0).min(100.0);
            if coverage_pct < threshold_pct {
                issues.push(Issue::new(
                    Severity::Warning,
                    IssueSource::Structural,
                    IssueCode::SubtitleLowCoverage,
                    &file.path,
                    format!(
                        "Subtitle {} covers only {:.0}% of the runtime ({} cues, last ends at {:.0}s of {:.0}s)",
                        label, coverage_pct, analysis.event_count, last_end, container_duration
                    ),
                ));
            }
        }
    }
}
