use crate::core::manifest_store::ManifestStore;
use crate::models::error::SError;
use crate::models::paths::ProfilePaths;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One detected save-storage location.
#[derive(Debug, Clone)]
pub struct SaveProfile {
    pub id: String,
    /// Directory the game reads its live save from.
    pub root: Utf8PathBuf,
    pub paths: ProfilePaths,
    pub store: ManifestStore,
}

impl SaveProfile {
    pub fn new(id: impl Into<String>, root: impl Into<Utf8PathBuf>) -> Self {
        let root = root.into();
        Self {
            id: id.into(),
            paths: ProfilePaths::new(&root),
            store: ManifestStore::for_profile(&root),
            root,
        }
    }

    /// Staging area used while swapping the live save.
    pub fn staging_dir(&self) -> Utf8PathBuf {
        self.paths.manager.join("staging")
    }
}

/// The profiles found among the candidate locations handed to the engine.
#[derive(Debug, Clone, Default)]
pub struct ProfileRepository {
    profiles: BTreeMap<String, SaveProfile>,
}

impl ProfileRepository {
    /// Keeps the candidates whose root directory exists. Candidates are
    /// supplied by the caller; nothing is searched for here.
    pub fn discover<I, S, P>(candidates: I) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: AsRef<Utf8Path>,
    {
        let profiles = candidates
            .into_iter()
            .filter_map(|(id, root)| {
                let id = id.into();
                let root = root.as_ref();
                if root.as_str().is_empty() || !root.is_dir() {
                    debug!("profile candidate '{id}' not present at '{root}'");
                    return None;
                }
                info!("found save profile '{id}' at {root}");
                Some((id.clone(), SaveProfile::new(id, root)))
            })
            .collect();

        Self { profiles }
    }

    pub fn profiles(&self) -> impl Iterator<Item = &SaveProfile> {
        self.profiles.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Result<&SaveProfile, SError> {
        self.profiles
            .get(id)
            .ok_or_else(|| SError::NotFound(format!("profile '{id}'")))
    }

    pub fn store(&self, id: &str) -> Result<&ManifestStore, SError> {
        self.get(id).map(|p| &p.store)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
