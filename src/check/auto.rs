//! Auto-mode consistency checks: compare each file against its
//! directory consensus.
//!
//! Auto mode infers expectations rather than enforcing stated ones, so
//! it never produces Error severity.

use crate::check::consensus::{duration_fences, is_bonus_content, MIN_DURATION_GROUP};
use crate::domain::{
    AutoCheckConfig, DirectoryConsensus, FileCheckResult, Issue, IssueCode, IssueSource, Severity,
    SubtitleOrigin,
};
use crate::lang;

/// Run consistency checks for one directory group against its consensus.
pub fn run_auto_checks(
    files: &[&FileCheckResult],
    consensus: &DirectoryConsensus,
    _config: &AutoCheckConfig,
    issues: &mut Vec<Issue>,
) {
    let fences = duration_fences(&consensus.durations);
    if fences.is_none() {
        issues.push(Issue::new(
            Severity::Info,
            IssueSource::Auto,
            IssueCode::GroupTooSmall,
            &consensus.directory,
            format!(
                "Duration outlier analysis skipped: {} files is fewer than the {} needed for stable quartiles",
                consensus.durations.len(),
                MIN_DURATION_GROUP
            ),
        ));
    }

    for file in files {
        if is_bonus_content(&file.file_name()) {
            continue;
        }
        let Some(probe) = &file.probe else {
            continue;
        };

        check_language_presence(file, consensus, issues);

        if let Some(expected_count) = consensus.consensus_track_count {
            let actual = probe.audio_tracks.len();
            if actual != expected_count {
                issues.push(Issue::new(
                    Severity::Warning,
                    IssueSource::Auto,
                    IssueCode::TrackCountAnomaly,
                    &file.path,
                    format!(
                        "File has {} audio track(s) while {} of {} siblings have {}",
                        actual,
                        consensus
                            .track_count_histogram
                            .get(&expected_count)
                            .copied()
                            .unwrap_or(0),
                        consensus.file_count,
                        expected_count
                    ),
                ));
            }
        }

        if let (Some(fences), Some(duration)) = (&fences, probe.duration) {
            if fences.is_outlier(duration) {
                let mut issue = Issue::new(
                    Severity::Warning,
                    IssueSource::Auto,
                    IssueCode::DurationOutlier,
                    &file.path,
                    format!(
                        "Duration {:.0}s deviates from the group median {:.0}s (expected range {:.0}s to {:.0}s)",
                        duration, fences.median, fences.low, fences.high
                    ),
                );
                // Attach the dominant audio stream so a matching decode
                // failure can be correlated into one finding.
                if let Some(track) = probe.audio_tracks.first() {
                    issue = issue.with_stream(track.stream_index);
                }
                issues.push(issue);
            }
        }

        for track in &probe.audio_tracks {
            if track.language.is_none() {
                issues.push(
                    Issue::new(
                        Severity::Info,
                        IssueSource::Auto,
                        IssueCode::UntaggedAudioTrack,
                        &file.path,
                        format!(
                            "Audio stream {} is untagged and excluded from consensus",
                            track.stream_index
                        ),
                    )
                    .with_stream(track.stream_index),
                );
            }
        }

        for source in &file.subtitle_sources {
            if source.language.is_some() {
                continue;
            }
            let mut issue = Issue::new(
                Severity::Info,
                IssueSource::Auto,
                IssueCode::UntaggedSubtitleTrack,
                &file.path,
                match &source.origin {
                    SubtitleOrigin::Embedded { stream_index } => format!(
                        "Subtitle stream {} is untagged and excluded from consensus",
                        stream_index
                    ),
                    SubtitleOrigin::External { path } => format!(
                        "Subtitle file {} has no determinable language and is excluded from consensus",
                        path.display()
                    ),
                },
            );
            if let SubtitleOrigin::Embedded { stream_index } = source.origin {
                issue = issue.with_stream(stream_index);
            }
            issues.push(issue);
        }
    }
}

/// Flag quorum languages missing from a file as Warning, soft-floor
/// languages as Info. Below the soft floor nothing is emitted.
fn check_language_presence(
    file: &FileCheckResult,
    consensus: &DirectoryConsensus,
    issues: &mut Vec<Issue>,
) {
    let Some(probe) = file.probe.as_ref() else {
        return;
    };

    let has_audio = |bucket: &str| {
        probe.audio_tracks.iter().any(|track| {
            track
                .language
                .as_deref()
                .map(|tag| lang::matches(tag, bucket))
                .unwrap_or(false)
        })
    };
    let has_subtitle = |bucket: &str| {
        file.subtitle_sources.iter().any(|source| {
            source
                .language
                .as_deref()
                .map(|tag| lang::matches(tag, bucket))
                .unwrap_or(false)
        })
    };

    for (languages, severity) in [
        (&consensus.quorum_audio_languages, Severity::Warning),
        (&consensus.soft_audio_languages, Severity::Info),
    ] {
        for bucket in languages {
            if !has_audio(bucket) {
                let support = consensus.audio_language_support.get(bucket).copied().unwrap_or(0);
                issues.push(
                    Issue::with_subject(
                        severity,
                        IssueSource::Auto,
                        IssueCode::MissingConsensusAudio,
                        &file.path,
                        "Missing audio language ",
                        bucket.clone(),
                        format!(" present in {} of {} sibling files", support, consensus.file_count),
                    )
                    .with_language(bucket.clone()),
                );
            }
        }
    }

    for (languages, severity) in [
        (&consensus.quorum_subtitle_languages, Severity::Warning),
        (&consensus.soft_subtitle_languages, Severity::Info),
    ] {
        for bucket in languages {
            if !has_subtitle(bucket) {
                let support = consensus
                    .subtitle_language_support
                    .get(bucket)
                    .copied()
                    .unwrap_or(0);
                issues.push(
                    Issue::with_subject(
                        severity,
                        IssueSource::Auto,
                        IssueCode::MissingConsensusSubtitle,
                        &file.path,
                        "Missing subtitle language ",
                        bucket.clone(),
                        format!(" present in {} of {} sibling files", support, consensus.file_count),
                    )
                    .with_language(bucket.clone()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::consensus::{build_consensus, ConsensusOutcome};
    use crate::domain::{AudioTrack, ProbeSnapshot};
    use std::path::{Path, PathBuf};

    fn file_with_audio(name: &str, langs: &[&str], duration: f64) -> FileCheckResult {
        let mut result = FileCheckResult::new(PathBuf::from(format!("/lib/show/{}", name)));
        result.probe = Some(ProbeSnapshot {
            container: "matroska".to_string(),
            duration: Some(duration),
            video_tracks: Vec::new(),
            audio_tracks: langs
                .iter()
                .enumerate()
                .map(|(i, lang)| AudioTrack {
                    stream_index: i + 1,
                    codec: "aac".to_string(),
                    language: Some(lang.to_string()),
                    duration: None,
                    channels: Some(2),
                })
                .collect(),
        });
        result
    }

    fn run_group(files: &[FileCheckResult], config: &AutoCheckConfig) -> Vec<Issue> {
        let refs: Vec<&FileCheckResult> = files.iter().collect();
        let ConsensusOutcome::Consensus(consensus) =
            build_consensus(Path::new("/lib/show"), &refs, config)
        else {
            panic!("expected consensus");
        };
        let mut issues = Vec::new();
        run_auto_checks(&refs, &consensus, config, &mut issues);
        issues
    }

    #[test]
    fn one_file_missing_quorum_language_gets_one_warning() {
        // 24 files, 23 with Japanese, quorum 75%, soft floor 20%.
        let mut files: Vec<FileCheckResult> = (0..23)
            .map(|i| file_with_audio(&format!("ep{:02}.mkv", i), &["jpn"], 1400.0))
            .collect();
        files.push(file_with_audio("ep23.mkv", &["eng"], 1400.0));

        let issues = run_group(&files, &AutoCheckConfig::default());
        let missing: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.code == IssueCode::MissingConsensusAudio)
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].severity, Severity::Warning);
        assert_eq!(missing[0].language.as_deref(), Some("ja"));
        assert!(missing[0].path.ends_with("ep23.mkv"));
    }

    #[test]
    fn auto_mode_never_emits_error() {
        let mut files: Vec<FileCheckResult> = (0..9)
            .map(|i| file_with_audio(&format!("ep{:02}.mkv", i), &["jpn", "eng"], 1400.0))
            .collect();
        files.push(file_with_audio("ep09.mkv", &["ger"], 300.0));

        let issues = run_group(&files, &AutoCheckConfig::default());
        assert!(!issues.is_empty());
        assert!(issues.iter().all(|i| i.severity != Severity::Error));
    }

    #[test]
    fn tied_mode_suppresses_track_count_check() {
        let files: Vec<FileCheckResult> = vec![
            file_with_audio("a.mkv", &["jpn"], 1400.0),
            file_with_audio("b.mkv", &["jpn"], 1400.0),
            file_with_audio("c.mkv", &["jpn", "eng"], 1400.0),
            file_with_audio("d.mkv", &["jpn", "eng"], 1400.0),
        ];
        let issues = run_group(&files, &AutoCheckConfig::default());
        assert!(issues.iter().all(|i| i.code != IssueCode::TrackCountAnomaly));
    }

    #[test]
    fn duration_outlier_is_flagged() {
        let mut files: Vec<FileCheckResult> = (0..7)
            .map(|i| file_with_audio(&format!("ep{:02}.mkv", i), &["jpn"], 1400.0 + i as f64))
            .collect();
        files.push(file_with_audio("ep07.mkv", &["jpn"], 600.0));

        let issues = run_group(&files, &AutoCheckConfig::default());
        let outliers: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.code == IssueCode::DurationOutlier)
            .collect();
        assert_eq!(outliers.len(), 1);
        assert!(outliers[0].path.ends_with("ep07.mkv"));
    }

    #[test]
    fn small_group_gets_duration_skip_note() {
        let files: Vec<FileCheckResult> = (0..4)
            .map(|i| file_with_audio(&format!("ep{:02}.mkv", i), &["jpn"], 1400.0))
            .collect();
        let issues = run_group(&files, &AutoCheckConfig::default());
        let notes: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.code == IssueCode::GroupTooSmall)
            .collect();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Info);
    }

    #[test]
    fn untagged_tracks_get_info_notes() {
        use crate::domain::SubtitleSource;

        let mut files: Vec<FileCheckResult> = (0..6)
            .map(|i| file_with_audio(&format!("ep{:02}.mkv", i), &["jpn"], 1400.0))
            .collect();
        // One untagged embedded subtitle and one untagged audio track.
        files[0].subtitle_sources.push(SubtitleSource {
            origin: SubtitleOrigin::Embedded { stream_index: 3 },
            language: None,
            codec: Some("subrip".to_string()),
            analysis: None,
        });
        if let Some(probe) = files[1].probe.as_mut() {
            probe.audio_tracks.push(AudioTrack {
                stream_index: 2,
                codec: "aac".to_string(),
                language: None,
                duration: None,
                channels: Some(2),
            });
        }

        let issues = run_group(&files, &AutoCheckConfig::default());

        let sub_notes: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.code == IssueCode::UntaggedSubtitleTrack)
            .collect();
        assert_eq!(sub_notes.len(), 1);
        assert_eq!(sub_notes[0].severity, Severity::Info);
        assert_eq!(sub_notes[0].stream, Some(3));
        assert!(sub_notes[0].path.ends_with("ep00.mkv"));

        let audio_notes: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.code == IssueCode::UntaggedAudioTrack)
            .collect();
        assert_eq!(audio_notes.len(), 1);
        assert_eq!(audio_notes[0].stream, Some(2));
    }

    #[test]
    fn bonus_files_are_not_checked_against_consensus() {
        let mut files: Vec<FileCheckResult> = (0..6)
            .map(|i| file_with_audio(&format!("ep{:02}.mkv", i), &["jpn"], 1400.0))
            .collect();
        files.push(file_with_audio("Series.SP01.mkv", &["eng"], 300.0));

        let issues = run_group(&files, &AutoCheckConfig::default());
        assert!(issues
            .iter()
            .all(|i| !i.path.ends_with("Series.SP01.mkv")));
    }
}
