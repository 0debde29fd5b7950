//! End-to-end pipeline tests running the check runner against a fake
//! prober, so no external tools are needed.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use preflight::check::{CheckRequest, CheckRunner};
use preflight::domain::{
    AudioTrack, AutoCheckConfig, DecodeDepth, IssueCode, ProbeSnapshot, Severity, SubtitleSource,
};
use preflight::probe::MediaProber;
use preflight::progress::NoOpCallbacks;
use preflight::{PreflightError, PreflightResult};

struct FakeProber {
    snapshots: BTreeMap<PathBuf, ProbeSnapshot>,
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, path: &Path) -> PreflightResult<(ProbeSnapshot, Vec<SubtitleSource>)> {
        self.snapshots
            .get(path)
            .cloned()
            .map(|snapshot| (snapshot, Vec::new()))
            .ok_or_else(|| PreflightError::ProbeError {
                path: path.display().to_string(),
                message: "simulated probe failure".to_string(),
            })
    }
}

/// Snapshot without any decodable streams, so the pipeline never spawns
/// an external decoder.
fn snapshot(duration: f64, audio_langs: &[&str]) -> ProbeSnapshot {
    ProbeSnapshot {
        container: "matroska".to_string(),
        duration: Some(duration),
        video_tracks: Vec::new(),
        audio_tracks: audio_langs
            .iter()
            .enumerate()
            .map(|(i, lang)| AudioTrack {
                stream_index: i + 1,
                codec: "aac".to_string(),
                language: Some(lang.to_string()),
                duration: None,
                channels: Some(2),
            })
            .collect(),
    }
}

struct Library {
    dir: TempDir,
    snapshots: BTreeMap<PathBuf, ProbeSnapshot>,
}

impl Library {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            snapshots: BTreeMap::new(),
        }
    }

    fn add(&mut self, name: &str, snapshot: ProbeSnapshot) -> PathBuf {
        let path = self.dir.path().join(name);
        File::create(&path).unwrap();
        self.snapshots.insert(path.clone(), snapshot);
        path
    }

    async fn run_auto(&self) -> preflight::ValidationReport {
        let runner = CheckRunner::with_prober(Arc::new(FakeProber {
            snapshots: self.snapshots.clone(),
        }));
        runner
            .run(
                CheckRequest {
                    root: self.dir.path().to_path_buf(),
                    profile: None,
                    auto: Some(AutoCheckConfig::default()),
                    decode_depth: DecodeDepth::Sampled,
                },
                &NoOpCallbacks,
            )
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn outlier_and_summary_flow() {
    let mut library = Library::new();
    for i in 0..7 {
        library.add(&format!("ep{:02}.mkv", i), snapshot(1400.0 + i as f64, &[]));
    }
    let short = library.add("ep07.mkv", snapshot(480.0, &[]));

    let report = library.run_auto().await;

    let outliers: Vec<_> = report
        .issues
        .iter()
        .filter(|i| i.code == IssueCode::DurationOutlier)
        .collect();
    assert_eq!(outliers.len(), 1);
    assert_eq!(outliers[0].path, short);
    assert_eq!(outliers[0].severity, Severity::Warning);

    // The warning surfaces in the summary section.
    assert!(report
        .summaries
        .iter()
        .any(|s| s.code == IssueCode::DurationOutlier && s.affected_files == 1));
    assert_eq!(report.error_count, 0);
    assert_eq!(report.warning_count, 1);
}

#[tokio::test]
async fn probe_failures_do_not_poison_the_group() {
    let mut library = Library::new();
    for i in 0..6 {
        library.add(&format!("ep{:02}.mkv", i), snapshot(1400.0, &[]));
    }
    // Present on disk but unknown to the prober: probe fails.
    let broken = library.dir.path().join("ep06.mkv");
    File::create(&broken).unwrap();

    let report = library.run_auto().await;

    assert!(report
        .issues
        .iter()
        .any(|i| i.code == IssueCode::ProbeFailed && i.path == broken));
    // The remaining files still form a consensus group.
    assert_eq!(report.consensus.len(), 1);
    let consensus = report.consensus.values().next().unwrap();
    assert_eq!(consensus.file_count, 6);
}

#[tokio::test]
async fn bonus_content_is_excluded_from_consensus() {
    let mut library = Library::new();
    for i in 0..6 {
        library.add(&format!("ep{:02}.mkv", i), snapshot(1400.0, &[]));
    }
    let bonus = library.add("Show - NCOP.mkv", snapshot(90.0, &[]));

    let report = library.run_auto().await;

    // The 90-second opening is not a duration outlier: it never entered
    // the duration pool.
    assert!(report
        .issues
        .iter()
        .all(|i| !(i.code == IssueCode::DurationOutlier && i.path == bonus)));
    let consensus = report.consensus.values().next().unwrap();
    assert_eq!(consensus.bonus_excluded, 1);
    assert_eq!(consensus.file_count, 6);
}

#[tokio::test]
async fn small_directory_is_noted_not_flagged() {
    let mut library = Library::new();
    library.add("a.mkv", snapshot(1400.0, &[]));
    library.add("b.mkv", snapshot(300.0, &[]));

    let report = library.run_auto().await;

    assert!(report
        .issues
        .iter()
        .any(|i| i.code == IssueCode::GroupTooSmall && i.severity == Severity::Info));
    assert!(report.consensus.is_empty());
    // Info findings never reach the summary section.
    assert!(report.summaries.is_empty());
    assert!(!report.has_errors());
}

#[tokio::test]
async fn repeated_runs_yield_identical_findings() {
    let mut library = Library::new();
    for i in 0..7 {
        library.add(&format!("ep{:02}.mkv", i), snapshot(1400.0, &["jpn", "eng"]));
    }
    library.add("ep07.mkv", snapshot(520.0, &["jpn"]));
    // A probe failure should also reproduce identically.
    File::create(library.dir.path().join("ep08.mkv")).unwrap();

    let first = library.run_auto().await;
    let second = library.run_auto().await;

    let key = |report: &preflight::ValidationReport| -> Vec<(PathBuf, IssueCode, Severity, String)> {
        report
            .issues
            .iter()
            .map(|i| (i.path.clone(), i.code, i.severity, i.message.clone()))
            .collect()
    };
    assert!(!first.issues.is_empty());
    assert_eq!(key(&first), key(&second));
    assert_eq!(first.summaries, second.summaries);
    assert_eq!(first.error_count, second.error_count);
    assert_eq!(first.warning_count, second.warning_count);
}

#[tokio::test]
async fn report_round_trips_through_json() {
    let mut library = Library::new();
    for i in 0..6 {
        library.add(&format!("ep{:02}.mkv", i), snapshot(1400.0, &[]));
    }
    library.add("ep06.mkv", snapshot(500.0, &[]));

    let report = library.run_auto().await;
    let json = serde_json::to_string_pretty(&report).unwrap();
    let parsed: preflight::ValidationReport = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.total_files, report.total_files);
    assert_eq!(parsed.issues, report.issues);
    assert_eq!(parsed.error_count, report.error_count);
    assert_eq!(parsed.consensus.len(), report.consensus.len());
}
