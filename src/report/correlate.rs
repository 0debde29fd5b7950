//! Issue correlation: merge independent findings that describe the same
//! underlying defect into one higher-quality finding.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::domain::{Issue, IssueCode};

/// Correlate the raw issue list.
///
/// An audio track with both a decode-failure finding and a
/// duration-deviation finding on the same file and stream position is
/// condensed into one "corrupt track" finding; everything else passes
/// through unchanged. Callers must recompute severity counts afterwards.
pub fn correlate(issues: Vec<Issue>) -> Vec<Issue> {
    // (path, stream) -> indices of candidate pair members.
    let mut decode_failures: HashMap<(PathBuf, usize), usize> = HashMap::new();
    let mut duration_deviations: HashMap<(PathBuf, usize), usize> = HashMap::new();

    for (idx, issue) in issues.iter().enumerate() {
        let Some(stream) = issue.stream else {
            continue;
        };
        let key = (issue.path.clone(), stream);
        match issue.code {
            IssueCode::DecodeCorrupt => {
                decode_failures.entry(key).or_insert(idx);
            }
            IssueCode::DurationMismatch | IssueCode::DurationOutlier => {
                duration_deviations.entry(key).or_insert(idx);
            }
            _ => {}
        }
    }

    let mut remove = vec![false; issues.len()];
    let mut merged = Vec::new();
    for (key, decode_idx) in &decode_failures {
        let Some(duration_idx) = duration_deviations.get(key) else {
            continue;
        };
        let decode = &issues[*decode_idx];
        let deviation = &issues[*duration_idx];
        remove[*decode_idx] = true;
        remove[*duration_idx] = true;

        let language = decode
            .language
            .clone()
            .or_else(|| deviation.language.clone());
        let identity = match &language {
            Some(language) => format!("Audio stream {} ({})", key.1, language),
            None => format!("Audio stream {}", key.1),
        };
        debug!("correlating decode failure and duration deviation on {}:{}", key.0.display(), key.1);

        let mut issue = Issue::new(
            // The stricter of the two originals wins.
            decode.severity.min(deviation.severity),
            decode.source,
            IssueCode::CorruptTrack,
            &key.0,
            format!(
                "{} is corrupt: {}; {}",
                identity,
                lowercase_first(&decode.message),
                lowercase_first(&deviation.message)
            ),
        )
        .with_stream(key.1);
        if let Some(language) = language {
            issue = issue.with_language(language);
        }
        merged.push(issue);
    }

    let mut result: Vec<Issue> = issues
        .into_iter()
        .enumerate()
        .filter_map(|(idx, issue)| (!remove[idx]).then_some(issue))
        .collect();
    merged.sort_by(|a, b| (a.path.clone(), a.stream).cmp(&(b.path.clone(), b.stream)));
    result.extend(merged);
    result
}

fn lowercase_first(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
