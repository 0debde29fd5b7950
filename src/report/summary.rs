//! Summary generation: aggregate raw issues into deduplicated sentences
//! keyed by issue code and source.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::domain::{DirectoryConsensus, Issue, IssueCode, IssueSource, Severity, Summary};
use crate::report::code_label;

/// How many file names a per-file summary sentence lists before eliding.
const MAX_LISTED_FILES: usize = 5;

/// Build ordered summaries from the post-correlation issue list.
///
/// Info findings are excluded. Where every file of a consensus group
/// shares one finding, the group collapses to a directory-level sentence.
/// Ordering: profile findings, then structural, then auto; alphabetical
/// by label within each source.
pub fn summarize(
    issues: &[Issue],
    consensus: &BTreeMap<String, DirectoryConsensus>,
) -> Vec<Summary> {
    let mut groups: BTreeMap<(IssueSource, IssueCode), Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        if issue.severity == Severity::Info {
            continue;
        }
        groups.entry((issue.source, issue.code)).or_default().push(issue);
    }

    let mut summaries: Vec<Summary> = groups
        .into_iter()
        .map(|((source, code), members)| build_summary(source, code, &members, consensus))
        .collect();

    summaries.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| code_label(a.code).cmp(code_label(b.code)))
    });
    summaries
}

fn build_summary(
    source: IssueSource,
    code: IssueCode,
    members: &[&Issue],
    consensus: &BTreeMap<String, DirectoryConsensus>,
) -> Summary {
    let affected: BTreeSet<PathBuf> = members.iter().map(|i| i.path.clone()).collect();

    // Directory-level collapse: one sentence when every file of a known
    // group carries this finding.
    let directories: BTreeSet<PathBuf> = affected
        .iter()
        .filter_map(|p| p.parent().map(|d| d.to_path_buf()))
        .collect();
    if directories.len() == 1 {
        if let Some(directory) = directories.iter().next() {
            if let Some(group) = consensus.get(&directory.display().to_string()) {
                if affected.len() == group.file_count && group.file_count > 1 {
                    return Summary {
                        code,
                        source,
                        text: format!(
                            "{}: all {} files in {}",
                            code_label(code),
                            group.file_count,
                            directory.display()
                        ),
                        affected_files: affected.len(),
                    };
                }
            }
        }
    }

    let mut names: Vec<String> = affected
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect();
    names.sort();
    let listed = if names.len() > MAX_LISTED_FILES {
        format!(
            "{}, and {} more",
            names[..MAX_LISTED_FILES].join(", "),
            names.len() - MAX_LISTED_FILES
        )
    } else {
        names.join(", ")
    };

    Summary {
        code,
        source,
        text: format!(
            "{}: {} file(s) affected ({})",
            code_label(code),
            affected.len(),
            listed
        ),
        affected_files: affected.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn issue(severity: Severity, source: IssueSource, code: IssueCode, path: &str) -> Issue {
        Issue::new(severity, source, code, Path::new(path), "detail")
    }

    #[test]
    fn info_findings_are_excluded() {
        let issues = vec![issue(
            Severity::Info,
            IssueSource::Auto,
            IssueCode::GroupTooSmall,
            "/lib/show",
        )];
        assert!(summarize(&issues, &BTreeMap::new()).is_empty());
    }

    #[test]
    fn grouped_by_code_and_source_with_counts() {
        let issues = vec![
            issue(Severity::Warning, IssueSource::Auto, IssueCode::MissingConsensusAudio, "/lib/show/a.mkv"),
            issue(Severity::Warning, IssueSource::Auto, IssueCode::MissingConsensusAudio, "/lib/show/b.mkv"),
            issue(Severity::Error, IssueSource::Profile, IssueCode::MissingExpectedAudio, "/lib/show/a.mkv"),
        ];
        let summaries = summarize(&issues, &BTreeMap::new());
        assert_eq!(summaries.len(), 2);
        // Profile findings come first.
        assert_eq!(summaries[0].source, IssueSource::Profile);
        assert_eq!(summaries[1].affected_files, 2);
        assert!(summaries[1].text.contains("a.mkv, b.mkv"));
    }

    #[test]
    fn whole_group_collapses_to_directory_sentence() {
        let mut consensus_map = BTreeMap::new();
        consensus_map.insert(
            "/lib/show".to_string(),
            DirectoryConsensus {
                directory: PathBuf::from("/lib/show"),
                file_count: 3,
                ..DirectoryConsensus::default()
            },
        );
        let issues: Vec<Issue> = (0..3)
            .map(|i| {
                issue(
                    Severity::Warning,
                    IssueSource::Auto,
                    IssueCode::TrackCountAnomaly,
                    &format!("/lib/show/ep{:02}.mkv", i),
                )
            })
            .collect();

        let summaries = summarize(&issues, &consensus_map);
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].text.contains("all 3 files in /lib/show"));
    }

    #[test]
    fn partial_group_keeps_per_file_sentence() {
        let mut consensus_map = BTreeMap::new();
        consensus_map.insert(
            "/lib/show".to_string(),
            DirectoryConsensus {
                directory: PathBuf::from("/lib/show"),
                file_count: 10,
                ..DirectoryConsensus::default()
            },
        );
        let issues = vec![issue(
            Severity::Warning,
            IssueSource::Auto,
            IssueCode::TrackCountAnomaly,
            "/lib/show/ep01.mkv",
        )];
        let summaries = summarize(&issues, &consensus_map);
        assert!(summaries[0].text.contains("1 file(s) affected"));
    }

    #[test]
    fn long_file_lists_are_elided() {
        let issues: Vec<Issue> = (0..8)
            .map(|i| {
                issue(
                    Severity::Warning,
                    IssueSource::Structural,
                    IssueCode::SubtitleEmpty,
                    &format!("/lib/show/ep{:02}.mkv", i),
                )
            })
            .collect();
        let summaries = summarize(&issues, &BTreeMap::new());
        assert!(summaries[0].text.contains("and 3 more"));
    }

    #[test]
    fn source_ordering_is_profile_structural_auto() {
        let issues = vec![
            issue(Severity::Warning, IssueSource::Auto, IssueCode::DurationOutlier, "/l/a.mkv"),
            issue(Severity::Warning, IssueSource::Structural, IssueCode::SubtitleEmpty, "/l/a.mkv"),
            issue(Severity::Error, IssueSource::Profile, IssueCode::MissingVideoTrack, "/l/a.mkv"),
        ];
        let summaries = summarize(&issues, &BTreeMap::new());
        let sources: Vec<IssueSource> = summaries.iter().map(|s| s.source).collect();
        assert_eq!(
            sources,
            vec![IssueSource::Profile, IssueSource::Structural, IssueSource::Auto]
        );
    }
}
