//! FFprobe adapter for media file probing.

use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::domain::{AudioTrack, ProbeSnapshot, SubtitleOrigin, SubtitleSource, VideoTrack};
use crate::error::{PreflightError, PreflightResult};
use crate::lang;

/// Name of the probe binary resolved via `PATH`.
pub const FFPROBE_BIN: &str = "ffprobe";

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<RawStream>,
    format: Option<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    channels: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: RawTags,
}

#[derive(Debug, Default, Deserialize)]
struct RawTags {
    language: Option<String>,
    #[serde(rename = "DURATION")]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

/// Probe one file with ffprobe, returning the container snapshot and the
/// embedded subtitle sources.
///
/// A missing probe binary surfaces as `ToolInvocation`; a probe that runs
/// but rejects the file surfaces as `ProbeError`.
pub async fn probe_file(path: &Path) -> PreflightResult<(ProbeSnapshot, Vec<SubtitleSource>)> {
    let output = Command::new(FFPROBE_BIN)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| PreflightError::ToolInvocation {
            tool: FFPROBE_BIN.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PreflightError::ProbeError {
            path: path.display().to_string(),
            message: if stderr.trim().is_empty() {
                format!("ffprobe exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            },
        });
    }

    let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    Ok(build_snapshot(parsed))
}

fn build_snapshot(raw: FfprobeOutput) -> (ProbeSnapshot, Vec<SubtitleSource>) {
    let container = raw
        .format
        .as_ref()
        .and_then(|f| f.format_name.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let format_duration = raw
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds);

    let mut video_tracks = Vec::new();
    let mut audio_tracks = Vec::new();
    let mut embedded_subs = Vec::new();

    for stream in raw.streams {
        let codec = stream.codec_name.clone().unwrap_or_else(|| "unknown".to_string());
        let language = normalize_language(stream.tags.language.as_deref());
        let duration = stream
            .duration
            .as_deref()
            .and_then(parse_seconds)
            .or_else(|| stream.tags.duration.as_deref().and_then(parse_tag_duration));

        match stream.codec_type.as_deref() {
            Some("video") => video_tracks.push(VideoTrack {
                stream_index: stream.index,
                codec,
                duration,
            }),
            Some("audio") => audio_tracks.push(AudioTrack {
                stream_index: stream.index,
                codec,
                language,
                duration,
                channels: stream.channels,
            }),
            Some("subtitle") => embedded_subs.push(SubtitleSource {
                origin: SubtitleOrigin::Embedded {
                    stream_index: stream.index,
                },
                language,
                codec: Some(codec),
                analysis: None,
            }),
            _ => debug!("ignoring stream {} of type {:?}", stream.index, stream.codec_type),
        }
    }

    let duration = format_duration.or_else(|| {
        video_tracks
            .iter()
            .filter_map(|t| t.duration)
            .chain(audio_tracks.iter().filter_map(|t| t.duration))
            .fold(None, |max: Option<f64>, d| {
                Some(max.map_or(d, |m| m.max(d)))
            })
    });

    let snapshot = ProbeSnapshot {
        container,
        duration,
        video_tracks,
        audio_tracks,
    };
    (snapshot, embedded_subs)
}

fn normalize_language(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    if lang::is_undetermined(raw) {
        None
    } else {
        Some(raw.to_string())
    }
}

fn parse_seconds(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|d| *d > 0.0)
}

/// Matroska stores per-stream duration as an `HH:MM:SS.nnnnnnnnn` tag.
fn parse_tag_duration(raw: &str) -> Option<f64> {
    let mut parts = raw.split(':');
    let hours: f64 = parts.next()?.trim().parse().ok()?;
    let minutes: f64 = parts.next()?.trim().parse().ok()?;
    let seconds: f64 = parts.next()?.trim().parse().ok()?;
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    (total > 0.0).then_some(total)
}
