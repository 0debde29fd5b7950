//! Named expectation-profile persistence.
//!
//! Profiles live in their own TOML file, independent of the settings
//! store. Save is an upsert keyed by profile name.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::ExpectationProfile;
use crate::error::{PreflightError, PreflightResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: BTreeMap<String, ExpectationProfile>,
}

/// Keyed CRUD over named profiles.
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// All saved profiles, sorted by name.
    pub fn list(&self) -> PreflightResult<Vec<ExpectationProfile>> {
        Ok(self.load()?.profiles.into_values().collect())
    }

    /// Fetch one profile by name.
    pub fn get(&self, name: &str) -> PreflightResult<ExpectationProfile> {
        self.load()?
            .profiles
            .remove(name)
            .ok_or_else(|| PreflightError::ProfileNotFound {
                name: name.to_string(),
            })
    }

    /// Insert or replace a profile under its name.
    pub fn save(&self, profile: &ExpectationProfile) -> PreflightResult<()> {
        profile.validate()?;
        let mut file = self.load()?;
        file.profiles.insert(profile.name.clone(), profile.clone());
        self.store(&file)
    }

    /// Remove a profile; missing names are an error.
    pub fn delete(&self, name: &str) -> PreflightResult<()> {
        let mut file = self.load()?;
        if file.profiles.remove(name).is_none() {
            return Err(PreflightError::ProfileNotFound {
                name: name.to_string(),
            });
        }
        self.store(&file)
    }

    fn load(&self) -> PreflightResult<ProfileFile> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => toml::from_str(&raw).map_err(|e| PreflightError::ProfileStore {
                message: format!("cannot parse {}: {}", self.path.display(), e),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ProfileFile::default()),
            Err(err) => Err(PreflightError::ProfileStore {
                message: format!("cannot read {}: {}", self.path.display(), err),
            }),
        }
    }

    fn store(&self, file: &ProfileFile) -> PreflightResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(file).map_err(|e| PreflightError::ProfileStore {
            message: format!("cannot serialize profiles: {}", e),
        })?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_is_upsert_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profiles.toml"));

        let mut profile = ExpectationProfile::new("anime");
        profile.expected_audio_languages = vec!["ja".to_string()];
        store.save(&profile).unwrap();

        profile.expected_audio_languages = vec!["ja".to_string(), "en".to_string()];
        store.save(&profile).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].expected_audio_languages.len(), 2);
    }

    #[test]
    fn delete_missing_profile_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profiles.toml"));
        let err = store.delete("nope").unwrap_err();
        assert!(matches!(err, PreflightError::ProfileNotFound { .. }));
    }

    #[test]
    fn get_returns_saved_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profiles.toml"));
        store.save(&ExpectationProfile::new("movies")).unwrap();
        assert_eq!(store.get("movies").unwrap().name, "movies");
        assert!(store.get("absent").is_err());
    }
}
