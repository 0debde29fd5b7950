//! Directory consensus: derive the "norm" for a directory group from the
//! majority of its files and the thresholds in `AutoCheckConfig`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::debug;

use crate::domain::{AutoCheckConfig, DirectoryConsensus, FileCheckResult};
use crate::lang::LanguageTag;

/// Groups need at least this many files for stable quartile estimates.
pub const MIN_DURATION_GROUP: usize = 6;

/// Tukey fence multiplier.
const IQR_FENCE: f64 = 1.5;

/// Absolute deviation floor for the IQR=0 fallback, seconds.
const ABSOLUTE_FLOOR_SECONDS: f64 = 120.0;

/// Relative deviation floor for the IQR=0 fallback.
const PCT_FLOOR: f64 = 0.05;

/// Bonus markers that are long enough to match as plain substrings.
const SUBSTRING_BONUS_TOKENS: &[&str] =
    &["trailer", "sample", "featurette", "interview", "creditless", "preview"];

/// Bonus markers that collide with legitimate title words; they only
/// match between word delimiters, optionally followed by digits (`SP01`).
const DELIMITED_BONUS_TOKENS: &[&str] = &[
    "sp", "ova", "oad", "op", "ed", "ncop", "nced", "pv", "cm", "special", "specials", "extra",
    "extras", "omake",
];

/// Result of attempting to build a consensus for one directory.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsensusOutcome {
    Consensus(DirectoryConsensus),
    /// Group smaller than `min_group_size` after bonus exclusion.
    TooSmall { file_count: usize },
}

/// Required support count for a quorum over `file_count` files.
///
/// `ceil(quorum_pct/100 * file_count)`: 75% over 24 files requires 18,
/// over 10 files requires 8.
pub fn required_support(quorum_pct: f64, file_count: usize) -> usize {
    (quorum_pct / 100.0 * file_count as f64).ceil() as usize
}

/// Build the consensus for one directory group.
///
/// Bonus-content files are excluded before any counting; files whose
/// probe failed carry no fingerprint and are excluded as well (they
/// already produced a structural finding).
pub fn build_consensus(
    directory: &Path,
    files: &[&FileCheckResult],
    config: &AutoCheckConfig,
) -> ConsensusOutcome {
    let mut fingerprints: Vec<&FileCheckResult> = Vec::new();
    let mut bonus_excluded = 0usize;
    for file in files {
        if is_bonus_content(&file.file_name()) {
            bonus_excluded += 1;
            continue;
        }
        if file.probe.is_some() {
            fingerprints.push(file);
        }
    }

    let file_count = fingerprints.len();
    if file_count < config.min_group_size {
        debug!(
            "directory {} has {} usable files, below minimum group size {}",
            directory.display(),
            file_count,
            config.min_group_size
        );
        return ConsensusOutcome::TooSmall { file_count };
    }

    // Per-file language tag sets.
    let audio_tags: Vec<Vec<LanguageTag>> = fingerprints
        .iter()
        .map(|f| {
            f.probe
                .as_ref()
                .map(|p| {
                    p.audio_tracks
                        .iter()
                        .filter_map(|t| t.language.as_deref())
                        .filter_map(LanguageTag::parse)
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();
    let subtitle_tags: Vec<Vec<LanguageTag>> = fingerprints
        .iter()
        .map(|f| {
            f.subtitle_sources
                .iter()
                .filter_map(|s| s.language.as_deref())
                .filter_map(LanguageTag::parse)
                .collect()
        })
        .collect();

    let audio_language_support = language_support(&audio_tags);
    let subtitle_language_support = language_support(&subtitle_tags);

    let mut track_count_histogram: BTreeMap<usize, usize> = BTreeMap::new();
    let mut durations = Vec::new();
    for file in &fingerprints {
        if let Some(probe) = &file.probe {
            *track_count_histogram.entry(probe.audio_tracks.len()).or_insert(0) += 1;
            if let Some(duration) = probe.duration {
                durations.push(duration);
            }
        }
    }

    let consensus_track_count = unique_mode(&track_count_histogram);
    durations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_duration = median(&durations);

    let required = required_support(config.quorum_pct, file_count);
    let classify = |support: &BTreeMap<String, usize>| {
        let mut quorum = Vec::new();
        let mut soft = Vec::new();
        for (language, count) in support {
            if *count >= required {
                quorum.push(language.clone());
            } else if *count as f64 * 100.0 >= config.soft_floor_pct * file_count as f64 {
                soft.push(language.clone());
            }
            // Below the soft floor: suppressed entirely.
        }
        (quorum, soft)
    };
    let (quorum_audio_languages, soft_audio_languages) = classify(&audio_language_support);
    let (quorum_subtitle_languages, soft_subtitle_languages) = classify(&subtitle_language_support);

    ConsensusOutcome::Consensus(DirectoryConsensus {
        directory: directory.to_path_buf(),
        file_count,
        bonus_excluded,
        audio_language_support,
        subtitle_language_support,
        track_count_histogram,
        durations,
        quorum_audio_languages,
        soft_audio_languages,
        quorum_subtitle_languages,
        soft_subtitle_languages,
        consensus_track_count,
        median_duration,
    })
}

/// Count per-language support across files.
///
/// Tags collapse to their primary subtag for bucketing unless the group
/// contains two or more distinct script/region-refined variants of the
/// same primary; those stay separate buckets (and a bare primary tag
/// keeps its own bucket alongside them).
fn language_support(per_file_tags: &[Vec<LanguageTag>]) -> BTreeMap<String, usize> {
    let mut refined_variants: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for tags in per_file_tags {
        for tag in tags {
            if tag.is_refined() {
                refined_variants
                    .entry(tag.primary.clone())
                    .or_default()
                    .insert(tag.canonical());
            }
        }
    }
    let split_primaries: BTreeSet<&String> = refined_variants
        .iter()
        .filter(|(_, variants)| variants.len() >= 2)
        .map(|(primary, _)| primary)
        .collect();

    let mut support: BTreeMap<String, usize> = BTreeMap::new();
    for tags in per_file_tags {
        let mut buckets: BTreeSet<String> = BTreeSet::new();
        for tag in tags {
            let key = if split_primaries.contains(&tag.primary) && tag.is_refined() {
                tag.canonical()
            } else {
                tag.primary.clone()
            };
            buckets.insert(key);
        }
        for bucket in buckets {
            *support.entry(bucket).or_insert(0) += 1;
        }
    }
    support
}

/// Modal value of a histogram; `None` when the mode is tied.
fn unique_mode(histogram: &BTreeMap<usize, usize>) -> Option<usize> {
    let max = histogram.values().copied().max()?;
    let mut modes = histogram.iter().filter(|(_, count)| **count == max);
    let (value, _) = modes.next()?;
    if modes.next().is_some() {
        return None;
    }
    Some(*value)
}

fn median(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Outlier fences over a sorted duration list.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationFences {
    pub median: f64,
    pub low: f64,
    pub high: f64,
    /// True when IQR was zero and the absolute/relative floor applied.
    pub degenerate: bool,
}

/// Compute Tukey fences (1.5 x IQR beyond Q1/Q3) over sorted durations.
///
/// Returns `None` for groups smaller than [`MIN_DURATION_GROUP`]. When
/// IQR is zero (near-identical durations), falls back to
/// `max(120s, 5% x median)` around the median so trivial deviations are
/// not flagged while genuine truncation still is.
pub fn duration_fences(sorted: &[f64]) -> Option<DurationFences> {
    if sorted.len() < MIN_DURATION_GROUP {
        return None;
    }
    let median = median(sorted)?;

    // Tukey hinges: quartiles are medians of the lower and upper halves,
    // excluding the middle element for odd-sized groups.
    let half = sorted.len() / 2;
    let q1 = self::median(&sorted[..half])?;
    let q3 = self::median(&sorted[sorted.len() - half..])?;
    let iqr = q3 - q1;

    if iqr > 0.0 {
        Some(DurationFences {
            median,
            low: q1 - IQR_FENCE * iqr,
            high: q3 + IQR_FENCE * iqr,
            degenerate: false,
        })
    } else {
        let floor = ABSOLUTE_FLOOR_SECONDS.max(PCT_FLOOR * median);
        Some(DurationFences {
            median,
            low: median - floor,
            high: median + floor,
            degenerate: true,
        })
    }
}

impl DurationFences {
    pub fn is_outlier(&self, duration: f64) -> bool {
        duration < self.low || duration > self.high
    }
}

/// Classify a filename as bonus content (specials, trailers, samples).
///
/// Matching is case-insensitive. Long unambiguous tokens match as
/// substrings; short collision-prone tokens require word-boundary
/// delimiters on both sides, with trailing digits allowed (`SP01`).
pub fn is_bonus_content(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    if SUBSTRING_BONUS_TOKENS.iter().any(|token| lower.contains(token)) {
        return true;
    }
    DELIMITED_BONUS_TOKENS
        .iter()
        .any(|token| has_delimited_token(&lower, token))
}

fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b'.' | b'-' | b'_' | b'[' | b']' | b'(' | b')' | b' ')
}

fn has_delimited_token(name: &str, token: &str) -> bool {
    let bytes = name.as_bytes();
    let mut search_from = 0;
    while let Some(pos) = name[search_from..].find(token) {
        let start = search_from + pos;
        let end = start + token.len();
        let left_ok = start == 0 || is_delimiter(bytes[start - 1]);
        let mut after = end;
        while after < bytes.len() && bytes[after].is_ascii_digit() {
            after += 1;
        }
        let right_ok = after == bytes.len() || is_delimiter(bytes[after]);
        if left_ok && right_ok {
            return true;
        }
        search_from = start + 1;
    }
    false
}
