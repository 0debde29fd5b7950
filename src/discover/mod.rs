//! Media file discovery.
//!
//! Applies the same skip rules as the downstream processing pipeline
//! (generated artifact directories, merged outputs) so the checker never
//! validates a different file set than processing will consume.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{PreflightError, PreflightResult};

/// Directories produced by the pipeline itself; never validated.
const ARTIFACT_DIRS: &[&str] = &["extracted", "merged", ".preflight", ".cache"];

/// Suffix stamped onto merged output files by the processing pipeline.
const MERGED_OUTPUT_MARKER: &str = ".merged";

/// Recursively discover media files under `root` matching `extensions`.
///
/// Hidden directories and known artifact directories are pruned; results
/// are sorted for deterministic runs.
pub fn discover_media_files(root: &Path, extensions: &[String]) -> PreflightResult<Vec<PathBuf>> {
    if !root.exists() {
        return Err(PreflightError::PathNotFound {
            path: root.display().to_string(),
        });
    }

    let mut files = Vec::new();
    // Skip rules apply only below the root: a library handed to us under
    // a hidden or artifact-named directory is still checked.
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !is_skipped_dir(entry.path(), entry.file_type().is_dir())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_merged_output(path) {
            continue;
        }
        if has_extension(path, extensions) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    debug!("discovered {} media files under {}", files.len(), root.display());
    Ok(files)
}

fn is_skipped_dir(path: &Path, is_dir: bool) -> bool {
    if !is_dir {
        return false;
    }
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => {
            (name.starts_with('.') && name.len() > 1)
                || ARTIFACT_DIRS.iter().any(|d| name.eq_ignore_ascii_case(d))
        }
        None => false,
    }
}

fn is_merged_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| stem.to_ascii_lowercase().ends_with(MERGED_OUTPUT_MARKER))
        .unwrap_or(false)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
