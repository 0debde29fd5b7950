//! Report post-processing: issue correlation, summary generation, and
//! the human label map for the issue-code vocabulary.

pub mod correlate;
pub mod summary;

use crate::domain::IssueCode;

/// Human-facing label per issue code.
///
/// The match is exhaustive on purpose: adding a code without a label
/// fails compilation, keeping consumer-facing maps in lockstep with the
/// vocabulary.
pub fn code_label(code: IssueCode) -> &'static str {
    match code {
        IssueCode::NoMediaFiles => "No media files found",
        IssueCode::ProbeFailed => "Metadata probe failed",
        IssueCode::DecodeToolFailed => "Decode tool unavailable",
        IssueCode::DecodeCorrupt => "Stream failed decode check",
        IssueCode::CorruptTrack => "Corrupt track",
        IssueCode::MissingVideoTrack => "No video track",
        IssueCode::UnknownDuration => "Unknown duration",
        IssueCode::DurationMismatch => "Stream duration mismatch",
        IssueCode::ExternalAudioError => "External audio problem",
        IssueCode::MissingExpectedAudio => "Missing expected audio language",
        IssueCode::MissingExpectedSubtitle => "Missing expected subtitle language",
        IssueCode::UntaggedAudioTrack => "Untagged audio track",
        IssueCode::UntaggedSubtitleTrack => "Untagged subtitle track",
        IssueCode::SubtitleParseFailed => "Subtitle failed to parse",
        IssueCode::SubtitleEmpty => "Empty subtitle file",
        IssueCode::SubtitleEncodingAnomaly => "Subtitle encoding anomaly",
        IssueCode::SubtitleLowCoverage => "Subtitle covers too little of the runtime",
        IssueCode::MissingConsensusAudio => "Audio language missing versus siblings",
        IssueCode::MissingConsensusSubtitle => "Subtitle language missing versus siblings",
        IssueCode::TrackCountAnomaly => "Audio track count differs from siblings",
        IssueCode::DurationOutlier => "Duration is an outlier in its group",
        IssueCode::GroupTooSmall => "Group too small for analysis",
    }
}
