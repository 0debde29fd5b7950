//! Check orchestration: discovery, probing, decode passes, the three
//! check families, correlation, and summary assembly.
//!
//! Pass order is fixed. Probing builds the per-file snapshots, the
//! structural pass runs for every file, then the profile and auto passes
//! run on top, sharing one decode dedup set so no stream is decoded
//! twice.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::check::auto::run_auto_checks;
use crate::check::consensus::{build_consensus, ConsensusOutcome};
use crate::check::decode::{DecodeChecker, StreamKey};
use crate::check::profile::run_profile_checks;
use crate::check::resolve::{resolve_audio_streams, FallbackPolicy, Resolution};
use crate::check::structural::{
    run_structural_checks, DEFAULT_DURATION_TOLERANCE_PCT, DEFAULT_SUBTITLE_THRESHOLD_PCT,
};
use crate::discover::discover_media_files;
use crate::domain::{
    default_video_extensions, AutoCheckConfig, DecodeDepth, DecodeOutcome, DecodeScope,
    DirectoryConsensus, ExpectationProfile, FileCheckResult, Issue, IssueCode, IssueSource,
    Severity, ValidationReport,
};
use crate::error::{PreflightError, PreflightResult};
use crate::probe::{collect_subtitle_sidecars, FfprobeProber, MediaProber};
use crate::progress::{CheckCallbacks, ProgressChannel};
use crate::report::correlate::correlate;
use crate::report::summary::summarize;

/// Sidecar extensions treated as external audio candidates.
const AUDIO_SIDECAR_EXTENSIONS: &[&str] =
    &["mka", "mp3", "aac", "ac3", "dts", "flac", "m4a", "ogg", "opus", "wav"];

/// One validation run, fully described.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub root: PathBuf,
    /// Expectations to enforce; `None` skips the profile pass.
    pub profile: Option<ExpectationProfile>,
    /// Consensus tuning; `None` skips the auto pass.
    pub auto: Option<AutoCheckConfig>,
    pub decode_depth: DecodeDepth,
}

/// Drives a full validation run.
pub struct CheckRunner {
    prober: Arc<dyn MediaProber>,
    probe_workers: usize,
    decode_workers: usize,
}

impl Default for CheckRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckRunner {
    pub fn new() -> Self {
        Self {
            prober: Arc::new(FfprobeProber),
            probe_workers: num_cpus::get(),
            decode_workers: num_cpus::get(),
        }
    }

    /// Swap the prober; used by tests and embedders.
    pub fn with_prober(prober: Arc<dyn MediaProber>) -> Self {
        Self {
            prober,
            probe_workers: num_cpus::get(),
            decode_workers: num_cpus::get(),
        }
    }

    /// Run one full check and assemble the report.
    pub async fn run(
        &self,
        request: CheckRequest,
        callbacks: &dyn CheckCallbacks,
    ) -> PreflightResult<ValidationReport> {
        let CheckRequest {
            root,
            profile,
            auto,
            decode_depth,
        } = request;
        if let Some(profile) = &profile {
            profile.validate()?;
        }
        if let Some(auto) = &auto {
            auto.validate()?;
        }

        let extensions = profile
            .as_ref()
            .map(|p| p.video_extensions.clone())
            .unwrap_or_else(default_video_extensions);
        let paths = discover_media_files(&root, &extensions)?;

        let mut report = ValidationReport::new(root.clone(), decode_depth);
        report.profile = profile.clone();
        report.auto_config = auto.clone();
        report.total_files = paths.len();

        let mut issues: Vec<Issue> = Vec::new();
        if paths.is_empty() {
            issues.push(Issue::new(
                Severity::Error,
                IssueSource::Structural,
                IssueCode::NoMediaFiles,
                &root,
                format!("No media files found under {}", root.display()),
            ));
            report.issues = issues;
            report.recount();
            return Ok(report);
        }
        info!("checking {} media files under {}", paths.len(), root.display());
        callbacks.on_log(&format!(
            "Checking {} media file(s) under {}",
            paths.len(),
            root.display()
        ));

        let mut files = self.probe_pass(&paths, callbacks).await?;

        let (duration_tolerance, subtitle_threshold) = profile
            .as_ref()
            .map(|p| (p.duration_tolerance_pct, p.subtitle_line_threshold_pct))
            .unwrap_or((DEFAULT_DURATION_TOLERANCE_PCT, DEFAULT_SUBTITLE_THRESHOLD_PCT));
        for file in &files {
            run_structural_checks(file, duration_tolerance, subtitle_threshold, &mut issues);
        }

        let checker = DecodeChecker::new(self.decode_workers);
        let mut checked_streams: HashSet<StreamKey> = HashSet::new();

        if let Some(profile) = &profile {
            self.profile_pass(
                &mut files,
                profile,
                decode_depth,
                &checker,
                &mut checked_streams,
                callbacks,
                &mut issues,
            )
            .await?;
        }

        if let Some(auto_config) = &auto {
            if auto_config.enabled {
                self.auto_pass(
                    &mut files,
                    auto_config,
                    decode_depth,
                    &checker,
                    &mut checked_streams,
                    callbacks,
                    &mut issues,
                    &mut report.consensus,
                )
                .await?;
            }
        }

        let issues = correlate(issues);
        report.summaries = summarize(&issues, &report.consensus);
        report.issues = issues;
        report.recount();
        Ok(report)
    }

    /// Probe every file concurrently, bounded by the probe worker pool.
    async fn probe_pass(
        &self,
        paths: &[PathBuf],
        callbacks: &dyn CheckCallbacks,
    ) -> PreflightResult<Vec<FileCheckResult>> {
        let total = paths.len() as u64;
        callbacks.on_start(ProgressChannel::Probe, total);

        let permits = Arc::new(Semaphore::new(self.probe_workers.max(1)));
        let mut join_set = JoinSet::new();
        for (idx, path) in paths.iter().enumerate() {
            let permits = permits.clone();
            let prober = self.prober.clone();
            let path = path.clone();
            join_set.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let mut result = FileCheckResult::new(path.clone());
                match prober.probe(&path).await {
                    Ok((snapshot, embedded_subs)) => {
                        result.probe = Some(snapshot);
                        result.subtitle_sources = embedded_subs;
                        result
                            .subtitle_sources
                            .extend(collect_subtitle_sidecars(&path));
                    }
                    Err(err) => result.probe_error = Some(err.to_string()),
                }
                (idx, result)
            });
        }

        let mut collected: Vec<(usize, FileCheckResult)> = Vec::with_capacity(paths.len());
        while let Some(joined) = join_set.join_next().await {
            if callbacks.should_cancel() {
                return Err(PreflightError::Cancelled);
            }
            let entry = joined.map_err(|err| PreflightError::ProbeError {
                path: "<probe worker>".to_string(),
                message: err.to_string(),
            })?;
            collected.push(entry);
            callbacks.on_progress(ProgressChannel::Probe, collected.len() as u64, total);
        }

        collected.sort_by_key(|(idx, _)| *idx);
        Ok(collected.into_iter().map(|(_, file)| file).collect())
    }

    /// Profile pass: scoped decode, expectation checks, external audio.
    #[allow(clippy::too_many_arguments)]
    async fn profile_pass(
        &self,
        files: &mut [FileCheckResult],
        profile: &ExpectationProfile,
        depth: DecodeDepth,
        checker: &DecodeChecker,
        checked: &mut HashSet<StreamKey>,
        callbacks: &dyn CheckCallbacks,
        issues: &mut Vec<Issue>,
    ) -> PreflightResult<()> {
        let scopes: Vec<Option<DecodeScope>> = files
            .iter()
            .map(|file| {
                file.probe.as_ref().map(|probe| {
                    decode_scope(
                        probe_resolution(file, &profile.expected_audio_languages, FallbackPolicy::FirstStream),
                        !probe.video_tracks.is_empty(),
                    )
                })
            })
            .collect();

        let total: u64 = files
            .iter()
            .zip(&scopes)
            .map(|(file, scope)| match scope {
                Some(scope) => planned_targets(file, scope, checked),
                None => 0,
            })
            .sum();
        callbacks.on_start(ProgressChannel::Decode, total);
        callbacks.on_log(&format!("Profile pass: {} decode target(s) planned", total));

        let mut completed = 0u64;
        for (file, scope) in files.iter_mut().zip(&scopes) {
            if callbacks.should_cancel() {
                return Err(PreflightError::Cancelled);
            }
            if let (Some(probe), Some(scope)) = (file.probe.clone(), scope) {
                if !scope.is_empty() {
                    let decode_report = checker
                        .check_file(&file.path, &probe, scope, depth, checked, callbacks)
                        .await;
                    if decode_report.cancelled {
                        return Err(PreflightError::Cancelled);
                    }
                    completed += decode_report.outcomes.len() as u64;
                    callbacks.on_progress(ProgressChannel::Decode, completed, total);
                    emit_decode_issues(
                        file,
                        decode_report.outcomes,
                        Severity::Error,
                        IssueSource::Profile,
                        issues,
                    );
                }
            }

            run_profile_checks(file, profile, issues);
            if profile.check_external_audio {
                self.check_external_audio(file, depth, checker, checked, callbacks, issues)
                    .await?;
            }
        }
        Ok(())
    }

    /// Auto pass: per-directory consensus, scoped decode, consistency
    /// checks.
    #[allow(clippy::too_many_arguments)]
    async fn auto_pass(
        &self,
        files: &mut [FileCheckResult],
        config: &AutoCheckConfig,
        depth: DecodeDepth,
        checker: &DecodeChecker,
        checked: &mut HashSet<StreamKey>,
        callbacks: &dyn CheckCallbacks,
        issues: &mut Vec<Issue>,
        consensus_map: &mut BTreeMap<String, DirectoryConsensus>,
    ) -> PreflightResult<()> {
        let mut groups: BTreeMap<PathBuf, Vec<usize>> = BTreeMap::new();
        for (idx, file) in files.iter().enumerate() {
            groups.entry(file.directory.clone()).or_default().push(idx);
        }

        // Consensus first for every group, so decode scopes and progress
        // totals are known before any work starts.
        let mut decided: Vec<(PathBuf, DirectoryConsensus, Vec<usize>)> = Vec::new();
        for (directory, indices) in groups {
            let members: Vec<&FileCheckResult> = indices.iter().map(|i| &files[*i]).collect();
            match build_consensus(&directory, &members, config) {
                ConsensusOutcome::TooSmall { file_count } => {
                    debug!("group {} too small for consensus", directory.display());
                    issues.push(Issue::new(
                        Severity::Info,
                        IssueSource::Auto,
                        IssueCode::GroupTooSmall,
                        &directory,
                        format!(
                            "Directory skipped: {} usable file(s) is below the minimum group size {}",
                            file_count, config.min_group_size
                        ),
                    ));
                }
                ConsensusOutcome::Consensus(consensus) => {
                    decided.push((directory, consensus, indices));
                }
            }
        }

        let mut scopes: Vec<(usize, DecodeScope)> = Vec::new();
        for (_, consensus, indices) in &decided {
            for idx in indices {
                let file = &files[*idx];
                // Files the profile pass already found corrupt get no
                // further decode work.
                if !file.is_intact() {
                    continue;
                }
                let Some(probe) = &file.probe else { continue };
                let scope = decode_scope(
                    probe_resolution(file, &consensus.quorum_audio_languages, FallbackPolicy::AllStreams),
                    !probe.video_tracks.is_empty(),
                );
                if scope.is_empty() {
                    continue;
                }
                scopes.push((*idx, scope));
            }
        }

        let total: u64 = scopes
            .iter()
            .map(|(idx, scope)| planned_targets(&files[*idx], scope, checked))
            .sum();
        callbacks.on_start(ProgressChannel::Decode, total);
        callbacks.on_log(&format!("Consensus pass: {} decode target(s) planned", total));

        let mut completed = 0u64;
        for (idx, scope) in &scopes {
            if callbacks.should_cancel() {
                return Err(PreflightError::Cancelled);
            }
            let file = &mut files[*idx];
            let Some(probe) = file.probe.clone() else { continue };
            let decode_report = checker
                .check_file(&file.path, &probe, scope, depth, checked, callbacks)
                .await;
            if decode_report.cancelled {
                return Err(PreflightError::Cancelled);
            }
            completed += decode_report.outcomes.len() as u64;
            callbacks.on_progress(ProgressChannel::Decode, completed, total);
            // Auto mode infers expectations, so corrupt streams stay
            // Warning here; tool failures are structural errors either way.
            emit_decode_issues(
                file,
                decode_report.outcomes,
                Severity::Warning,
                IssueSource::Auto,
                issues,
            );
        }

        for (directory, consensus, indices) in decided {
            let members: Vec<&FileCheckResult> = indices.iter().map(|i| &files[*i]).collect();
            run_auto_checks(&members, &consensus, config, issues);
            consensus_map.insert(directory.display().to_string(), consensus);
        }
        Ok(())
    }

    /// Probe same-stem audio sidecars and decode their streams. All
    /// findings land on the owning media file, naming the sidecar.
    async fn check_external_audio(
        &self,
        file: &FileCheckResult,
        depth: DecodeDepth,
        checker: &DecodeChecker,
        checked: &mut HashSet<StreamKey>,
        callbacks: &dyn CheckCallbacks,
        issues: &mut Vec<Issue>,
    ) -> PreflightResult<()> {
        for sidecar in collect_audio_sidecars(&file.path) {
            let snapshot = match self.prober.probe(&sidecar).await {
                Ok((snapshot, _)) => snapshot,
                Err(err) => {
                    issues.push(Issue::new(
                        Severity::Error,
                        IssueSource::Profile,
                        IssueCode::ExternalAudioError,
                        &file.path,
                        format!("External audio {} cannot be probed: {}", sidecar.display(), err),
                    ));
                    continue;
                }
            };
            if snapshot.audio_tracks.is_empty() {
                issues.push(Issue::new(
                    Severity::Error,
                    IssueSource::Profile,
                    IssueCode::ExternalAudioError,
                    &file.path,
                    format!("External audio {} contains no audio streams", sidecar.display()),
                ));
                continue;
            }

            let scope = DecodeScope {
                audio_streams: snapshot.audio_tracks.iter().map(|t| t.stream_index).collect(),
                check_video: false,
            };
            let decode_report = checker
                .check_file(&sidecar, &snapshot, &scope, depth, checked, callbacks)
                .await;
            if decode_report.cancelled {
                return Err(PreflightError::Cancelled);
            }
            for (stream, outcome) in decode_report.outcomes {
                match outcome {
                    DecodeOutcome::Clean => {}
                    DecodeOutcome::Corrupt { detail } => issues.push(Issue::new(
                        Severity::Error,
                        IssueSource::Profile,
                        IssueCode::ExternalAudioError,
                        &file.path,
                        format!(
                            "External audio {} stream {} failed decode check: {}",
                            sidecar.display(),
                            stream,
                            detail
                        ),
                    )),
                    DecodeOutcome::ToolFailure { detail } => issues.push(
                        Issue::new(
                            Severity::Error,
                            IssueSource::Structural,
                            IssueCode::DecodeToolFailed,
                            &file.path,
                            format!(
                                "Decode tool failed on external audio {}: {}",
                                sidecar.display(),
                                detail
                            ),
                        ),
                    ),
                }
            }
        }
        Ok(())
    }
}

fn probe_resolution(
    file: &FileCheckResult,
    requested: &[String],
    policy: FallbackPolicy,
) -> Resolution {
    let probe = file.probe.as_ref();
    match probe {
        Some(probe) => resolve_audio_streams(probe, requested, policy),
        None => Resolution {
            streams: Default::default(),
            used_fallback: false,
        },
    }
}

fn decode_scope(resolution: Resolution, check_video: bool) -> DecodeScope {
    DecodeScope {
        audio_streams: resolution.streams,
        check_video,
    }
}

/// Count decode targets for one file that are not already deduplicated.
fn planned_targets(file: &FileCheckResult, scope: &DecodeScope, checked: &HashSet<StreamKey>) -> u64 {
    let mut count = 0u64;
    let not_checked = |stream: usize| {
        !checked.contains(&StreamKey {
            path: file.path.clone(),
            stream,
        })
    };
    for stream in &scope.audio_streams {
        if not_checked(*stream) {
            count += 1;
        }
    }
    if scope.check_video {
        if let Some(video) = file.probe.as_ref().and_then(|p| p.video_tracks.first()) {
            if not_checked(video.stream_index) {
                count += 1;
            }
        }
    }
    count
}

/// Turn decode outcomes into issues and annotate them onto the file.
fn emit_decode_issues(
    file: &mut FileCheckResult,
    outcomes: BTreeMap<usize, DecodeOutcome>,
    corrupt_severity: Severity,
    corrupt_source: IssueSource,
    issues: &mut Vec<Issue>,
) {
    for (stream, outcome) in outcomes {
        match &outcome {
            DecodeOutcome::Clean => {}
            DecodeOutcome::Corrupt { detail } => {
                let mut issue = Issue::new(
                    corrupt_severity,
                    corrupt_source,
                    IssueCode::DecodeCorrupt,
                    &file.path,
                    format!("Stream {} failed decode check: {}", stream, detail),
                )
                .with_stream(stream);
                if let Some(language) = stream_language(file, stream) {
                    issue = issue.with_language(language);
                }
                issues.push(issue);
            }
            DecodeOutcome::ToolFailure { detail } => {
                issues.push(
                    Issue::new(
                        Severity::Error,
                        IssueSource::Structural,
                        IssueCode::DecodeToolFailed,
                        &file.path,
                        format!("Decode tool failed on stream {}: {}", stream, detail),
                    )
                    .with_stream(stream),
                );
            }
        }
        file.annotate_decode(stream, outcome);
    }
}

fn stream_language(file: &FileCheckResult, stream: usize) -> Option<String> {
    file.probe
        .as_ref()?
        .audio_tracks
        .iter()
        .find(|t| t.stream_index == stream)
        .and_then(|t| t.language.clone())
}

/// Same-stem audio sidecar files next to a media file.
fn collect_audio_sidecars(media_path: &Path) -> Vec<PathBuf> {
    let Some(dir) = media_path.parent() else {
        return Vec::new();
    };
    let Some(media_stem) = media_path.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut sidecars = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_audio = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| AUDIO_SIDECAR_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
            .unwrap_or(false);
        if !is_audio {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let belongs = stem == media_stem
            || (stem.len() > media_stem.len()
                && stem.starts_with(media_stem)
                && stem.as_bytes()[media_stem.len()] == b'.');
        if belongs {
            sidecars.push(path);
        }
    }
    sidecars.sort();
    sidecars
}
