//! User settings provider backing the decode-depth resolution chain.
//!
//! The core never reads process-wide state: depth resolves explicitly as
//! argument -> settings provider -> default sampled.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::DecodeDepth;

/// Read access to persisted user settings.
pub trait SettingsProvider: Send + Sync {
    /// Persisted decode depth, if the user configured one.
    fn decode_depth(&self) -> Option<DecodeDepth>;
}

/// Resolve the effective decode depth.
pub fn resolve_decode_depth(
    explicit: Option<DecodeDepth>,
    settings: &dyn SettingsProvider,
) -> DecodeDepth {
    explicit
        .or_else(|| settings.decode_depth())
        .unwrap_or_default()
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    decode_depth: Option<String>,
}

/// TOML-file-backed settings.
pub struct TomlSettings {
    path: PathBuf,
}

impl TomlSettings {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> SettingsFile {
        match fs::read_to_string(&self.path) {
            Ok(raw) => toml::from_str(&raw).unwrap_or_else(|err| {
                debug!("ignoring malformed settings file {}: {}", self.path.display(), err);
                SettingsFile::default()
            }),
            Err(_) => SettingsFile::default(),
        }
    }
}

impl SettingsProvider for TomlSettings {
    fn decode_depth(&self) -> Option<DecodeDepth> {
        self.load()
            .decode_depth
            .as_deref()
            .and_then(|raw| DecodeDepth::parse(raw).ok())
    }
}

/// Fixed settings for tests and embedding.
pub struct StaticSettings {
    pub depth: Option<DecodeDepth>,
}

impl SettingsProvider for StaticSettings {
    fn decode_depth(&self) -> Option<DecodeDepth> {
        self.depth
    }
}
