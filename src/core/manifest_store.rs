use crate::models::error::SError;
use crate::models::manifest::{ProfileManifest, MANIFEST_VERSION};
use crate::models::paths::{GamePaths, ProfilePaths};
use crate::utils::json::Json;
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// A manifest as read from disk. `warning` is set when the file existed but
/// could not be used, in which case `value` is the empty state.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub warning: Option<SError>,
}

impl<T> Loaded<T> {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// Reads and writes one JSON manifest file.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: Utf8PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_profile(profile_root: &Utf8Path) -> Self {
        Self::new(ProfilePaths::new(profile_root).manifest)
    }

    pub fn for_mods(game_root: &Utf8Path) -> Self {
        Self::new(GamePaths::new(game_root).mods_manifest)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Never fails: a missing file is the empty state, an unreadable one is the
    /// empty state plus a warning.
    pub fn load<T: DeserializeOwned + Default>(&self) -> Loaded<T> {
        if !self.path.exists() {
            debug!("no manifest at {}, starting empty", self.path);
            return Loaded {
                value: T::default(),
                warning: None,
            };
        }

        match Json::read::<T>(&self.path) {
            Ok(value) => Loaded {
                value,
                warning: None,
            },
            Err(e) => {
                warn!("manifest {} unusable, treating as empty: {e}", self.path);
                let warning = match e {
                    SError::CorruptManifest(_) => e,
                    other => SError::CorruptManifest(other.to_string()),
                };
                Loaded {
                    value: T::default(),
                    warning: Some(warning),
                }
            }
        }
    }

    /// Where an unreadable manifest is moved before it is overwritten.
    pub fn corrupt_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}.corrupt", self.path))
    }

    /// Renames the current file to `corrupt_path()`, replacing any earlier
    /// one. Does nothing when there is no file.
    pub fn set_aside(&self) -> Result<Option<Utf8PathBuf>, SError> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let target = self.corrupt_path();
        std::fs::rename(&self.path, &target)?;
        warn!("kept unreadable manifest as {target}");
        Ok(Some(target))
    }

    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), SError> {
        debug!("writing manifest {}", self.path);
        Json::write_atomic(&self.path, value)
    }
}

pub fn load(profile_root: &Utf8Path) -> Loaded<ProfileManifest> {
    ManifestStore::for_profile(profile_root).load()
}

pub fn save(profile_root: &Utf8Path, manifest: &ProfileManifest) -> Result<(), SError> {
    let mut stamped = manifest.clone();
    stamped.version = MANIFEST_VERSION;
    ManifestStore::for_profile(profile_root).save(&stamped)
}
