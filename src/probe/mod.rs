//! Media probing: metadata extraction and subtitle candidate collection.

pub mod ffprobe;
pub mod subtitles;

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{ProbeSnapshot, SubtitleSource};
use crate::error::PreflightResult;

pub use ffprobe::{probe_file, FFPROBE_BIN};
pub use subtitles::{analyze_subtitle_file, collect_subtitle_sidecars};

/// Port over the metadata probe tool so the check pipeline can run
/// against a fake in tests.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Probe one file, returning the container snapshot and any embedded
    /// subtitle sources.
    async fn probe(&self, path: &Path) -> PreflightResult<(ProbeSnapshot, Vec<SubtitleSource>)>;
}

/// ffprobe-backed prober used in production.
pub struct FfprobeProber;

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> PreflightResult<(ProbeSnapshot, Vec<SubtitleSource>)> {
        ffprobe::probe_file(path).await
    }
}
