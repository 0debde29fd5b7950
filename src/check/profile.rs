//! Profile checks: enforce user-declared expectations against one file.
//!
//! Profile mode encodes explicit intent, so missing expected languages
//! are Error severity, unlike auto mode which never exceeds Warning.

use crate::domain::{
    ExpectationProfile, FileCheckResult, Issue, IssueCode, IssueSource, Severity,
};
use crate::lang;

/// Run profile checks over one file, appending findings.
///
/// Files whose probe failed are skipped; the structural pass already
/// reported them.
pub fn run_profile_checks(
    file: &FileCheckResult,
    profile: &ExpectationProfile,
    issues: &mut Vec<Issue>,
) {
    let Some(probe) = &file.probe else {
        return;
    };

    if profile.require_video_track && probe.video_tracks.is_empty() {
        issues.push(Issue::new(
            Severity::Error,
            IssueSource::Profile,
            IssueCode::MissingVideoTrack,
            &file.path,
            "No video track present",
        ));
    }

    for expected in &profile.expected_audio_languages {
        let found = probe.audio_tracks.iter().any(|track| {
            track
                .language
                .as_deref()
                .map(|tag| lang::matches(tag, expected))
                .unwrap_or(false)
        });
        if !found {
            issues.push(
                Issue::with_subject(
                    Severity::Error,
                    IssueSource::Profile,
                    IssueCode::MissingExpectedAudio,
                    &file.path,
                    "Expected audio language ",
                    expected.clone(),
                    " not present",
                )
                .with_language(expected.clone()),
            );
        }
    }

    for expected in &profile.expected_subtitle_languages {
        let found = file.subtitle_sources.iter().any(|source| {
            source
                .language
                .as_deref()
                .map(|tag| lang::matches(tag, expected))
                .unwrap_or(false)
        });
        if !found {
            issues.push(
                Issue::with_subject(
                    Severity::Error,
                    IssueSource::Profile,
                    IssueCode::MissingExpectedSubtitle,
                    &file.path,
                    "Expected subtitle language ",
                    expected.clone(),
                    " not present",
                )
                .with_language(expected.clone()),
            );
        }
    }

    if profile.require_language_tags {
        for track in &probe.audio_tracks {
            if track.language.is_none() {
                issues.push(
                    Issue::new(
                        Severity::Warning,
                        IssueSource::Profile,
                        IssueCode::UntaggedAudioTrack,
                        &file.path,
                        format!("Audio stream {} has no language tag", track.stream_index),
                    )
                    .with_stream(track.stream_index),
                );
            }
        }
        for source in &file.subtitle_sources {
            if source.language.is_none() {
                issues.push(Issue::new(
                    Severity::Warning,
                    IssueSource::Profile,
                    IssueCode::UntaggedSubtitleTrack,
                    &file.path,
                    "Subtitle source has no determinable language",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AudioTrack, ProbeSnapshot, SubtitleOrigin, SubtitleSource, VideoTrack};
    use std::path::PathBuf;

    fn file_with(langs: &[Option<&str>], with_video: bool) -> FileCheckResult {
        let mut file = FileCheckResult::new(PathBuf::from("/lib/show/ep01.mkv"));
        file.probe = Some(ProbeSnapshot {
            container: "matroska".to_string(),
            duration: Some(1400.0),
            video_tracks: if with_video {
                vec![VideoTrack {
                    stream_index: 0,
                    codec: "h264".to_string(),
                    duration: None,
                }]
            } else {
                Vec::new()
            },
            audio_tracks: langs
                .iter()
                .enumerate()
                .map(|(i, lang)| AudioTrack {
                    stream_index: i + 1,
                    codec: "aac".to_string(),
                    language: lang.map(str::to_string),
                    duration: None,
                    channels: Some(2),
                })
                .collect(),
        });
        file
    }

    #[test]
    fn missing_expected_audio_is_an_error() {
        let file = file_with(&[Some("eng")], true);
        let mut profile = ExpectationProfile::new("anime");
        profile.expected_audio_languages = vec!["ja".to_string()];

        let mut issues = Vec::new();
        run_profile_checks(&file, &profile, &mut issues);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::MissingExpectedAudio);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].subject, "ja");
    }

    #[test]
    fn bcp47_matching_not_string_equality() {
        // Track tagged "jpn" satisfies expectation "ja".
        let file = file_with(&[Some("jpn")], true);
        let mut profile = ExpectationProfile::new("anime");
        profile.expected_audio_languages = vec!["ja".to_string()];

        let mut issues = Vec::new();
        run_profile_checks(&file, &profile, &mut issues);
        assert!(issues.is_empty());
    }

    #[test]
    fn missing_video_track_when_required() {
        let file = file_with(&[Some("jpn")], false);
        let mut profile = ExpectationProfile::new("anime");
        profile.require_video_track = true;

        let mut issues = Vec::new();
        run_profile_checks(&file, &profile, &mut issues);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::MissingVideoTrack);
    }

    #[test]
    fn untagged_tracks_warned_when_tags_required() {
        let mut file = file_with(&[Some("jpn"), None], true);
        file.subtitle_sources.push(SubtitleSource {
            origin: SubtitleOrigin::Embedded { stream_index: 3 },
            language: None,
            codec: Some("subrip".to_string()),
            analysis: None,
        });
        let mut profile = ExpectationProfile::new("strict");
        profile.require_language_tags = true;

        let mut issues = Vec::new();
        run_profile_checks(&file, &profile, &mut issues);
        let codes: Vec<IssueCode> = issues.iter().map(|i| i.code).collect();
        assert!(codes.contains(&IssueCode::UntaggedAudioTrack));
        assert!(codes.contains(&IssueCode::UntaggedSubtitleTrack));
        assert!(issues.iter().all(|i| i.severity == Severity::Warning));
    }

    #[test]
    fn expected_subtitle_found_in_external_source() {
        let mut file = file_with(&[Some("jpn")], true);
        file.subtitle_sources.push(SubtitleSource {
            origin: SubtitleOrigin::External {
                path: PathBuf::from("/lib/show/ep01.en.srt"),
            },
            language: Some("en".to_string()),
            codec: Some("srt".to_string()),
            analysis: None,
        });
        let mut profile = ExpectationProfile::new("dual");
        profile.expected_subtitle_languages = vec!["en".to_string()];

        let mut issues = Vec::new();
        run_profile_checks(&file, &profile, &mut issues);
        assert!(issues.is_empty());
    }
}
