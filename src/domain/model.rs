//! Core domain model: issue taxonomy, expectation profiles, per-file
//! snapshots, directory consensus, and the final validation report.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PreflightError, PreflightResult};

/// Severity of a finding. Only `Error` gates downstream actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Which pass produced a finding. Variant order is the summary
/// presentation order: profile first, then structural, then auto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueSource {
    Profile,
    Structural,
    Auto,
}

/// Coarse grouping of issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueCategory {
    Structural,
    Language,
    Subtitle,
    Consistency,
}

/// Closed vocabulary of machine-readable issue codes.
///
/// Adding a variant here requires updating the label map in the report
/// module; the exhaustive match there enforces lockstep at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    // Structural
    NoMediaFiles,
    ProbeFailed,
    DecodeToolFailed,
    DecodeCorrupt,
    CorruptTrack,
    MissingVideoTrack,
    UnknownDuration,
    DurationMismatch,
    ExternalAudioError,
    // Language
    MissingExpectedAudio,
    MissingExpectedSubtitle,
    UntaggedAudioTrack,
    UntaggedSubtitleTrack,
    // Subtitle
    SubtitleParseFailed,
    SubtitleEmpty,
    SubtitleEncodingAnomaly,
    SubtitleLowCoverage,
    // Auto-mode consistency
    MissingConsensusAudio,
    MissingConsensusSubtitle,
    TrackCountAnomaly,
    DurationOutlier,
    GroupTooSmall,
}

impl IssueCode {
    /// Category a code belongs to.
    pub fn category(self) -> IssueCategory {
        use IssueCode::*;
        match self {
            NoMediaFiles | ProbeFailed | DecodeToolFailed | DecodeCorrupt | CorruptTrack
            | MissingVideoTrack | UnknownDuration | DurationMismatch | ExternalAudioError => {
                IssueCategory::Structural
            }
            MissingExpectedAudio | MissingExpectedSubtitle | UntaggedAudioTrack
            | UntaggedSubtitleTrack => IssueCategory::Language,
            SubtitleParseFailed | SubtitleEmpty | SubtitleEncodingAnomaly
            | SubtitleLowCoverage => IssueCategory::Subtitle,
            MissingConsensusAudio | MissingConsensusSubtitle | TrackCountAnomaly
            | DurationOutlier | GroupTooSmall => IssueCategory::Consistency,
        }
    }
}

/// One finding produced by a check pass.
///
/// The message is stored pre-split (prefix/subject/suffix) so renderers
/// can highlight the subject; `subject` is empty when the finding has no
/// associated language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub source: IssueSource,
    pub code: IssueCode,
    pub category: IssueCategory,
    pub path: PathBuf,
    pub message: String,
    pub prefix: String,
    pub subject: String,
    pub suffix: String,
    /// Absolute stream index the finding refers to, when track-scoped.
    pub stream: Option<usize>,
    /// Language tag the finding refers to, when language-scoped.
    pub language: Option<String>,
}

impl Issue {
    /// Build an issue with a plain (unsplit) message.
    pub fn new(
        severity: Severity,
        source: IssueSource,
        code: IssueCode,
        path: &Path,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            severity,
            source,
            code,
            category: code.category(),
            path: path.to_path_buf(),
            prefix: message.clone(),
            subject: String::new(),
            suffix: String::new(),
            message,
            stream: None,
            language: None,
        }
    }

    /// Build an issue whose message highlights a language subject.
    pub fn with_subject(
        severity: Severity,
        source: IssueSource,
        code: IssueCode,
        path: &Path,
        prefix: impl Into<String>,
        subject: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        let (prefix, subject, suffix) = (prefix.into(), subject.into(), suffix.into());
        Self {
            severity,
            source,
            code,
            category: code.category(),
            path: path.to_path_buf(),
            message: format!("{}{}{}", prefix, subject, suffix),
            prefix,
            subject,
            suffix,
            stream: None,
            language: None,
        }
    }

    pub fn with_stream(mut self, stream: usize) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// User-declared expectations for a library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationProfile {
    pub name: String,
    #[serde(default)]
    pub expected_audio_languages: Vec<String>,
    #[serde(default)]
    pub expected_subtitle_languages: Vec<String>,
    #[serde(default)]
    pub require_video_track: bool,
    #[serde(default)]
    pub require_language_tags: bool,
    /// Allowed per-stream deviation from container duration, percent.
    #[serde(default = "default_duration_tolerance")]
    pub duration_tolerance_pct: f64,
    /// Minimum share of the runtime a subtitle must cover, percent.
    #[serde(default = "default_subtitle_threshold")]
    pub subtitle_line_threshold_pct: f64,
    #[serde(default)]
    pub check_external_audio: bool,
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
}

fn default_duration_tolerance() -> f64 {
    5.0
}

fn default_subtitle_threshold() -> f64 {
    60.0
}

/// Extensions treated as media files when no profile overrides them.
pub fn default_video_extensions() -> Vec<String> {
    ["mkv", "mp4", "avi", "mov", "webm", "m2ts", "ts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl ExpectationProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected_audio_languages: Vec::new(),
            expected_subtitle_languages: Vec::new(),
            require_video_track: false,
            require_language_tags: false,
            duration_tolerance_pct: default_duration_tolerance(),
            subtitle_line_threshold_pct: default_subtitle_threshold(),
            check_external_audio: false,
            video_extensions: default_video_extensions(),
        }
    }

    /// Validate threshold ranges.
    pub fn validate(&self) -> PreflightResult<()> {
        if self.name.trim().is_empty() {
            return Err(PreflightError::InvalidConfig {
                message: "profile name cannot be empty".to_string(),
            });
        }
        for (label, value) in [
            ("duration_tolerance_pct", self.duration_tolerance_pct),
            ("subtitle_line_threshold_pct", self.subtitle_line_threshold_pct),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(PreflightError::InvalidConfig {
                    message: format!("{} must be within [0, 100], got {}", label, value),
                });
            }
        }
        Ok(())
    }
}

/// Auto-mode tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoCheckConfig {
    pub enabled: bool,
    /// Share of siblings that must carry a property for its absence
    /// elsewhere to be a Warning, percent.
    pub quorum_pct: f64,
    /// Below this share a property's absence is suppressed, percent.
    pub soft_floor_pct: f64,
    /// Directories with fewer files than this are skipped.
    pub min_group_size: usize,
}

impl Default for AutoCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            quorum_pct: 75.0,
            soft_floor_pct: 20.0,
            min_group_size: 3,
        }
    }
}

impl AutoCheckConfig {
    pub fn validate(&self) -> PreflightResult<()> {
        for (label, value) in [("quorum_pct", self.quorum_pct), ("soft_floor_pct", self.soft_floor_pct)] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(PreflightError::InvalidConfig {
                    message: format!("{} must be within (0, 100], got {}", label, value),
                });
            }
        }
        if self.quorum_pct <= self.soft_floor_pct {
            return Err(PreflightError::InvalidConfig {
                message: format!(
                    "quorum_pct ({}) must be greater than soft_floor_pct ({})",
                    self.quorum_pct, self.soft_floor_pct
                ),
            });
        }
        Ok(())
    }
}

/// How deep decode-integrity checking goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeDepth {
    /// Decode three short windows per targeted stream.
    Sampled,
    /// Decode targeted audio streams end-to-end. Video stays sampled.
    Full,
}

impl Default for DecodeDepth {
    fn default() -> Self {
        DecodeDepth::Sampled
    }
}

impl DecodeDepth {
    pub fn parse(value: &str) -> PreflightResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sampled" => Ok(DecodeDepth::Sampled),
            "full" => Ok(DecodeDepth::Full),
            other => Err(PreflightError::InvalidConfig {
                message: format!("invalid decode depth: {}. Valid values: sampled, full", other),
            }),
        }
    }
}

/// Which streams a decode pass should target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeScope {
    /// Absolute stream indices of audio streams to decode.
    pub audio_streams: BTreeSet<usize>,
    pub check_video: bool,
}

impl DecodeScope {
    pub fn is_empty(&self) -> bool {
        self.audio_streams.is_empty() && !self.check_video
    }
}

/// Snapshot of one video track from the probe pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTrack {
    pub stream_index: usize,
    pub codec: String,
    pub duration: Option<f64>,
}

/// Snapshot of one audio track from the probe pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub stream_index: usize,
    pub codec: String,
    pub language: Option<String>,
    pub duration: Option<f64>,
    pub channels: Option<u32>,
}

/// Where a subtitle source comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubtitleOrigin {
    /// Embedded subtitle stream inside the container.
    Embedded { stream_index: usize },
    /// Sidecar subtitle file next to the media file.
    External { path: PathBuf },
}

/// Structural analysis of a text subtitle source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleAnalysis {
    pub parse_error: Option<String>,
    pub encoding_anomaly: Option<String>,
    pub is_empty: bool,
    pub event_count: usize,
    /// End time of the last cue, seconds.
    pub last_event_end: Option<f64>,
}

/// One subtitle source (embedded stream or sidecar file).
///
/// Language is `None` for untagged/unguessable sources; they still count
/// as present so file coverage is never under-reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSource {
    pub origin: SubtitleOrigin,
    pub language: Option<String>,
    pub codec: Option<String>,
    /// Populated for sidecar text subtitles; embedded streams are not
    /// extracted during probing.
    pub analysis: Option<SubtitleAnalysis>,
}

/// Container-level probe snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSnapshot {
    pub container: String,
    pub duration: Option<f64>,
    pub video_tracks: Vec<VideoTrack>,
    pub audio_tracks: Vec<AudioTrack>,
}

/// Result of decoding one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecodeOutcome {
    Clean,
    /// Decoder reported bitstream errors in a checked window.
    Corrupt { detail: String },
    /// The decode tool itself could not run. Reported as an error, never
    /// silently treated as clean.
    ToolFailure { detail: String },
}

impl DecodeOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, DecodeOutcome::Clean)
    }
}

/// Per-file state created once during the probe pass.
///
/// Immutable afterwards except for the explicit decode-result annotation
/// step (`annotate_decode`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileCheckResult {
    pub path: PathBuf,
    pub directory: PathBuf,
    pub probe: Option<ProbeSnapshot>,
    pub probe_error: Option<String>,
    pub subtitle_sources: Vec<SubtitleSource>,
    /// Decode outcome per absolute stream index.
    pub decode_results: BTreeMap<usize, DecodeOutcome>,
}

impl FileCheckResult {
    pub fn new(path: PathBuf) -> Self {
        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            path,
            directory,
            probe: None,
            probe_error: None,
            subtitle_sources: Vec::new(),
            decode_results: BTreeMap::new(),
        }
    }

    /// The one sanctioned mutation after probing: record a decode result.
    pub fn annotate_decode(&mut self, stream: usize, outcome: DecodeOutcome) {
        self.decode_results.insert(stream, outcome);
    }

    /// True when probing succeeded and no checked stream is corrupt.
    pub fn is_intact(&self) -> bool {
        self.probe_error.is_none() && self.decode_results.values().all(DecodeOutcome::is_clean)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Inferred norm for one directory group.
///
/// Computed once after probing; never mutated by later passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryConsensus {
    pub directory: PathBuf,
    /// Files counted toward consensus (bonus content excluded).
    pub file_count: usize,
    pub bonus_excluded: usize,
    /// Language bucket -> number of files carrying it.
    pub audio_language_support: BTreeMap<String, usize>,
    pub subtitle_language_support: BTreeMap<String, usize>,
    pub track_count_histogram: BTreeMap<usize, usize>,
    pub durations: Vec<f64>,
    /// Language buckets at or above quorum confidence.
    pub quorum_audio_languages: Vec<String>,
    /// Language buckets between soft floor and quorum.
    pub soft_audio_languages: Vec<String>,
    pub quorum_subtitle_languages: Vec<String>,
    pub soft_subtitle_languages: Vec<String>,
    /// Modal audio track count; `None` when the mode is tied.
    pub consensus_track_count: Option<usize>,
    pub median_duration: Option<f64>,
}

/// One deduplicated summary sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub code: IssueCode,
    pub source: IssueSource,
    pub text: String,
    pub affected_files: usize,
}

/// Full output of one validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub root: PathBuf,
    pub profile: Option<ExpectationProfile>,
    pub auto_config: Option<AutoCheckConfig>,
    pub decode_depth: DecodeDepth,
    pub total_files: usize,
    pub issues: Vec<Issue>,
    pub summaries: Vec<Summary>,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub consensus: BTreeMap<String, DirectoryConsensus>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

impl ValidationReport {
    pub fn new(root: PathBuf, decode_depth: DecodeDepth) -> Self {
        Self {
            root,
            profile: None,
            auto_config: None,
            decode_depth,
            total_files: 0,
            issues: Vec::new(),
            summaries: Vec::new(),
            error_count: 0,
            warning_count: 0,
            info_count: 0,
            consensus: BTreeMap::new(),
            generated_at: chrono::Utc::now(),
        }
    }

    /// Recompute severity counts from the current issue list. Must be
    /// called after correlation, never before.
    pub fn recount(&mut self) {
        self.error_count = 0;
        self.warning_count = 0;
        self.info_count = 0;
        for issue in &self.issues {
            match issue.severity {
                Severity::Error => self.error_count += 1,
                Severity::Warning => self.warning_count += 1,
                Severity::Info => self.info_count += 1,
            }
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn issue_subject_splitting() {
        let issue = Issue::with_subject(
            Severity::Warning,
            IssueSource::Auto,
            IssueCode::MissingConsensusAudio,
            Path::new("/lib/show/ep01.mkv"),
            "Missing audio language ",
            "ja",
            " present in most sibling files",
        )
        .with_language("ja");
        assert_eq!(issue.message, "Missing audio language ja present in most sibling files");
        assert_eq!(issue.subject, "ja");
        assert_eq!(issue.category, IssueCategory::Consistency);
    }

    #[test]
    fn intactness_reflects_probe_and_decode_state() {
        let mut file = FileCheckResult::new(PathBuf::from("/lib/show/ep01.mkv"));
        assert!(file.is_intact());

        file.annotate_decode(1, DecodeOutcome::Clean);
        assert!(file.is_intact());

        file.annotate_decode(
            2,
            DecodeOutcome::Corrupt {
                detail: "bitstream damage".to_string(),
            },
        );
        assert!(!file.is_intact());

        let mut unreadable = FileCheckResult::new(PathBuf::from("/lib/show/ep02.mkv"));
        unreadable.probe_error = Some("container unreadable".to_string());
        assert!(!unreadable.is_intact());
    }

    #[test]
    fn decode_scope_emptiness() {
        let mut scope = DecodeScope::default();
        assert!(scope.is_empty());
        scope.check_video = true;
        assert!(!scope.is_empty());
        scope.check_video = false;
        scope.audio_streams.insert(1);
        assert!(!scope.is_empty());
    }

    #[test]
    fn issue_without_language_has_empty_subject() {
        let issue = Issue::new(
            Severity::Error,
            IssueSource::Structural,
            IssueCode::ProbeFailed,
            Path::new("/lib/broken.mkv"),
            "Probe failed",
        );
        assert!(issue.subject.is_empty());
        assert!(issue.language.is_none());
    }

    #[test]
    fn auto_config_validation() {
        assert!(AutoCheckConfig::default().validate().is_ok());

        let bad = AutoCheckConfig {
            quorum_pct: 20.0,
            soft_floor_pct: 75.0,
            ..AutoCheckConfig::default()
        };
        assert!(bad.validate().is_err());

        let zero = AutoCheckConfig {
            soft_floor_pct: 0.0,
            ..AutoCheckConfig::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn profile_threshold_validation() {
        let mut profile = ExpectationProfile::new("anime");
        assert!(profile.validate().is_ok());
        profile.duration_tolerance_pct = 120.0;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn decode_depth_parsing() {
        assert_eq!(DecodeDepth::parse("sampled").unwrap(), DecodeDepth::Sampled);
        assert_eq!(DecodeDepth::parse("FULL").unwrap(), DecodeDepth::Full);
        assert!(DecodeDepth::parse("deep").is_err());
    }

    #[test]
    fn recount_tracks_final_list_only() {
        let mut report = ValidationReport::new(PathBuf::from("/lib"), DecodeDepth::Sampled);
        report.issues.push(Issue::new(
            Severity::Error,
            IssueSource::Structural,
            IssueCode::ProbeFailed,
            Path::new("/lib/a.mkv"),
            "Probe failed",
        ));
        report.issues.push(Issue::new(
            Severity::Warning,
            IssueSource::Auto,
            IssueCode::DurationOutlier,
            Path::new("/lib/b.mkv"),
            "Duration outlier",
        ));
        report.recount();
        assert_eq!((report.error_count, report.warning_count, report.info_count), (1, 1, 0));

        report.issues.pop();
        report.recount();
        assert_eq!((report.error_count, report.warning_count, report.info_count), (1, 0, 0));
    }
}
