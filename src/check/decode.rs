//! Decode-integrity checking via external ffmpeg invocations.
//!
//! Streams decode to the null muxer so bitstream errors surface during
//! actual decode, not just header parsing. Work is throttled by a
//! semaphore sized to available cores, separate from the probe pool.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::domain::{DecodeDepth, DecodeOutcome, DecodeScope, ProbeSnapshot};
use crate::progress::CheckCallbacks;

/// Name of the decode binary resolved via `PATH`.
pub const FFMPEG_BIN: &str = "ffmpeg";

/// Length of one sampled decode window, seconds.
const WINDOW_SECONDS: f64 = 10.0;

/// Sampled depth decodes this many windows per stream.
const WINDOW_COUNT: usize = 3;

/// Gap kept between the last window and end of file.
const NEAR_END_MARGIN: f64 = 2.0;

/// Identity of one physical stream, used to deduplicate decode work
/// across the profile and auto passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub path: PathBuf,
    pub stream: usize,
}

/// Result of checking one file.
#[derive(Debug, Default)]
pub struct FileDecodeReport {
    /// Outcome per absolute stream index actually checked.
    pub outcomes: BTreeMap<usize, DecodeOutcome>,
    /// Set when cancellation interrupted the check; recorded outcomes
    /// remain valid.
    pub cancelled: bool,
}

/// What part of a stream to decode.
#[derive(Debug, Clone, PartialEq)]
enum WindowPlan {
    /// Decode the stream end-to-end.
    Whole,
    /// Decode `(start, length)` windows, seconds.
    Windows(Vec<(f64, f64)>),
}

/// Bounded-concurrency decode checker.
pub struct DecodeChecker {
    permits: Arc<Semaphore>,
}

impl DecodeChecker {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Sized to available cores; decode work is CPU-bound.
    pub fn with_default_workers() -> Self {
        Self::new(num_cpus::get())
    }

    /// Check the scoped streams of one file.
    ///
    /// Streams already present in `checked` are skipped and their keys
    /// left untouched; newly checked streams are added to `checked`.
    /// Cancellation is polled between windows.
    pub async fn check_file(
        &self,
        path: &Path,
        probe: &ProbeSnapshot,
        scope: &DecodeScope,
        depth: DecodeDepth,
        checked: &mut HashSet<StreamKey>,
        callbacks: &dyn CheckCallbacks,
    ) -> FileDecodeReport {
        let mut report = FileDecodeReport::default();

        let mut targets: Vec<(usize, bool)> = scope
            .audio_streams
            .iter()
            .map(|idx| (*idx, false))
            .collect();
        if scope.check_video {
            if let Some(video) = probe.video_tracks.first() {
                targets.push((video.stream_index, true));
            }
        }

        for (stream_index, is_video) in targets {
            let key = StreamKey {
                path: path.to_path_buf(),
                stream: stream_index,
            };
            if checked.contains(&key) {
                debug!("stream {}:{} already checked, skipping", path.display(), stream_index);
                continue;
            }
            if callbacks.should_cancel() {
                report.cancelled = true;
                return report;
            }

            let plan = plan_windows(probe.duration, depth, is_video);
            let outcome = self
                .decode_stream(path, stream_index, &plan, callbacks)
                .await;
            match outcome {
                Some(outcome) => {
                    if !outcome.is_clean() {
                        warn!("stream {}:{} failed decode check", path.display(), stream_index);
                    }
                    checked.insert(key);
                    report.outcomes.insert(stream_index, outcome);
                }
                None => {
                    // Cancelled mid-stream: nothing recorded for it.
                    report.cancelled = true;
                    return report;
                }
            }
        }

        report
    }

    /// Decode one stream according to the window plan. Returns `None`
    /// when cancelled between windows.
    async fn decode_stream(
        &self,
        path: &Path,
        stream_index: usize,
        plan: &WindowPlan,
        callbacks: &dyn CheckCallbacks,
    ) -> Option<DecodeOutcome> {
        let windows: Vec<Option<(f64, f64)>> = match plan {
            WindowPlan::Whole => vec![None],
            WindowPlan::Windows(windows) => windows.iter().copied().map(Some).collect(),
        };

        for window in windows {
            if callbacks.should_cancel() {
                return None;
            }
            let outcome = self.decode_window(path, stream_index, window).await;
            if !outcome.is_clean() {
                return Some(outcome);
            }
        }
        Some(DecodeOutcome::Clean)
    }

    /// Run one ffmpeg invocation decoding a window (or the whole stream)
    /// to the null muxer.
    async fn decode_window(
        &self,
        path: &Path,
        stream_index: usize,
        window: Option<(f64, f64)>,
    ) -> DecodeOutcome {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return DecodeOutcome::ToolFailure {
                    detail: "decode worker pool closed".to_string(),
                }
            }
        };

        let mut command = Command::new(FFMPEG_BIN);
        command.args(["-hide_banner", "-nostdin", "-v", "error"]);
        if let Some((start, length)) = window {
            command.args(["-ss", &format!("{:.3}", start), "-t", &format!("{:.3}", length)]);
        }
        command
            .arg("-i")
            .arg(path)
            .args(["-map", &format!("0:{}", stream_index)])
            .args(["-f", "null", "-"]);

        let output = match command.output().await {
            Ok(output) => output,
            Err(err) => {
                // Tool missing or unspawnable is an error result, never
                // silently clean.
                return DecodeOutcome::ToolFailure {
                    detail: format!("cannot invoke {}: {}", FFMPEG_BIN, err),
                };
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        classify_decode_output(output.status.success(), &stderr)
    }
}

/// Map ffmpeg exit status and error output to a decode outcome.
fn classify_decode_output(success: bool, stderr: &str) -> DecodeOutcome {
    let trimmed = stderr.trim();
    if success && trimmed.is_empty() {
        return DecodeOutcome::Clean;
    }
    // -v error keeps stderr quiet unless the decoder reported problems.
    let detail = if trimmed.is_empty() {
        "decoder exited with failure status".to_string()
    } else {
        trimmed.lines().take(3).collect::<Vec<_>>().join("; ")
    };
    DecodeOutcome::Corrupt { detail }
}

/// Build the window plan for one stream.
///
/// Video targets are always sampled, at both depths; full decode never
/// escalates to video.
fn plan_windows(duration: Option<f64>, depth: DecodeDepth, is_video: bool) -> WindowPlan {
    if depth == DecodeDepth::Full && !is_video {
        return WindowPlan::Whole;
    }

    let Some(duration) = duration else {
        // Unknown duration: a single window from the start.
        return WindowPlan::Windows(vec![(0.0, WINDOW_SECONDS)]);
    };

    if duration < WINDOW_COUNT as f64 * WINDOW_SECONDS {
        return WindowPlan::Whole;
    }

    let near_end = (duration - WINDOW_SECONDS - NEAR_END_MARGIN).max(0.0);
    let middle = (duration / 2.0 - WINDOW_SECONDS / 2.0).max(0.0);
    WindowPlan::Windows(vec![
        (0.0, WINDOW_SECONDS),
        (middle, WINDOW_SECONDS),
        (near_end, WINDOW_SECONDS),
    ])
}
