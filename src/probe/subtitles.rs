//! Sidecar subtitle collection and structural analysis.
//!
//! Candidates whose language cannot be guessed from the filename are kept
//! and tagged undetermined rather than dropped, so subtitle presence is
//! never under-counted.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::domain::{SubtitleAnalysis, SubtitleOrigin, SubtitleSource};
use crate::lang::LanguageTag;

/// Sidecar extensions treated as subtitle candidates.
const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "vtt", "sub"];

/// Collect sidecar subtitle files belonging to `media_path`.
///
/// A sidecar belongs to a media file when its stem equals the media stem
/// or extends it with dot-separated tokens (`ep01.ja.srt`). The first
/// parseable token after the stem is taken as the language guess.
pub fn collect_subtitle_sidecars(media_path: &Path) -> Vec<SubtitleSource> {
    let Some(dir) = media_path.parent() else {
        return Vec::new();
    };
    let Some(media_stem) = media_path.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("cannot read {} for sidecar subtitles: {}", dir.display(), err);
            return Vec::new();
        }
    };

    let mut sources = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !is_subtitle_file(&path) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !stem_belongs_to(stem, media_stem) {
            continue;
        }

        let language = guess_language_from_stem(stem, media_stem);
        let analysis = analyze_subtitle_file(&path);
        sources.push(SubtitleSource {
            origin: SubtitleOrigin::External { path: path.clone() },
            language,
            codec: path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase()),
            analysis: Some(analysis),
        });
    }

    sources.sort_by(|a, b| {
        let key = |s: &SubtitleSource| match &s.origin {
            SubtitleOrigin::External { path } => path.clone(),
            SubtitleOrigin::Embedded { .. } => Default::default(),
        };
        key(a).cmp(&key(b))
    });
    sources
}

fn is_subtitle_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SUBTITLE_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

fn stem_belongs_to(sub_stem: &str, media_stem: &str) -> bool {
    sub_stem == media_stem
        || (sub_stem.len() > media_stem.len()
            && sub_stem.starts_with(media_stem)
            && sub_stem.as_bytes()[media_stem.len()] == b'.')
}

/// Guess a language tag from the dot tokens following the media stem.
/// Returns `None` (undetermined) when no token parses as a language.
fn guess_language_from_stem(sub_stem: &str, media_stem: &str) -> Option<String> {
    let suffix = sub_stem.strip_prefix(media_stem)?.trim_start_matches('.');
    suffix.split('.').find_map(|token| {
        // Only 2-3 letter primary subtags are trustworthy guesses; longer
        // tokens ("forced", "commentary") are flags, not languages.
        let first = token.split(['-', '_']).next().unwrap_or("");
        if first.len() < 2 || first.len() > 3 {
            return None;
        }
        LanguageTag::parse(token).map(|tag| tag.canonical())
    })
}

/// Analyze a text subtitle file: parse failures, emptiness, encoding
/// anomalies, cue count, and last-cue end time.
pub fn analyze_subtitle_file(path: &Path) -> SubtitleAnalysis {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            return SubtitleAnalysis {
                parse_error: Some(format!("cannot read file: {}", err)),
                ..SubtitleAnalysis::default()
            }
        }
    };

    if bytes.is_empty() {
        return SubtitleAnalysis {
            is_empty: true,
            ..SubtitleAnalysis::default()
        };
    }

    let (text, encoding_anomaly) = decode_text(&bytes);
    if text.trim().is_empty() {
        return SubtitleAnalysis {
            is_empty: true,
            encoding_anomaly,
            ..SubtitleAnalysis::default()
        };
    }

    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let (event_count, last_event_end, parse_error) = parse_cues(&text, &format);

    SubtitleAnalysis {
        parse_error,
        encoding_anomaly,
        is_empty: false,
        event_count,
        last_event_end,
    }
}

/// Decode subtitle bytes, reporting encodings the pipeline cannot pass
/// through untouched.
fn decode_text(bytes: &[u8]) -> (String, Option<String>) {
    // UTF-16 with BOM decodes fine but is an anomaly worth surfacing.
    if bytes.len() >= 2 && (bytes[..2] == [0xFF, 0xFE] || bytes[..2] == [0xFE, 0xFF]) {
        let little_endian = bytes[0] == 0xFF;
        let text = decode_utf16(&bytes[2..], little_endian);
        return (text, Some("UTF-16 encoded subtitle".to_string()));
    }

    // A UTF-8 BOM is harmless; strip it so a BOM-only file reads empty.
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(bytes);

    // Heavy NUL presence without a BOM is almost always mislabeled UTF-16.
    let nul_count = bytes.iter().filter(|b| **b == 0).count();
    if nul_count * 3 > bytes.len() {
        let text = decode_utf16(bytes, true);
        return (text, Some("UTF-16 without byte-order mark".to_string()));
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), None),
        Err(_) => (
            String::from_utf8_lossy(bytes).into_owned(),
            Some("invalid UTF-8 byte sequences".to_string()),
        ),
    }
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    char::decode_utf16(units.into_iter())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Count cues and find the last cue end across SRT/VTT/ASS content.
fn parse_cues(text: &str, format: &str) -> (usize, Option<f64>, Option<String>) {
    let mut count = 0usize;
    let mut last_end: Option<f64> = None;

    for line in text.lines() {
        let line = line.trim();
        if let Some(end) = parse_timing_line(line) {
            count += 1;
            last_end = Some(last_end.map_or(end, |prev: f64| prev.max(end)));
        } else if line.starts_with("Dialogue:") {
            if let Some(end) = parse_ass_dialogue(line) {
                count += 1;
                last_end = Some(last_end.map_or(end, |prev: f64| prev.max(end)));
            }
        }
    }

    if count == 0 {
        let detail = match format {
            "ass" | "ssa" => "no Dialogue events found",
            _ => "no cue timings found",
        };
        return (0, None, Some(detail.to_string()));
    }
    (count, last_end, None)
}

/// SRT/VTT timing line: `00:00:01,000 --> 00:00:03,000`.
fn parse_timing_line(line: &str) -> Option<f64> {
    let (_, end) = line.split_once("-->")?;
    parse_timestamp(end.split_whitespace().next()?)
}

/// ASS dialogue line: `Dialogue: 0,0:00:01.00,0:00:03.00,Style,...`.
fn parse_ass_dialogue(line: &str) -> Option<f64> {
    let fields: Vec<&str> = line.splitn(5, ',').collect();
    if fields.len() < 4 {
        return None;
    }
    parse_timestamp(fields[2].trim())
}

/// Parse `H:MM:SS.cc`, `HH:MM:SS,mmm`, or `MM:SS.mmm` timestamps.
fn parse_timestamp(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (h.parse::<f64>().ok()?, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        [m, s] => (0.0, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        _ => return None,
    };
    let total = h * 3600.0 + m * 60.0 + s;
    (total >= 0.0).then_some(total)
}
