use crate::config::EngineSettings;
use crate::core::cross_copy;
use crate::core::mod_manager::ModManager;
use crate::core::process_guard::{GameLock, ProcessWatcher};
use crate::core::profile::ProfileRepository;
use crate::core::slot_manager::SlotManager;
use crate::models::error::SError;
use crate::models::outcome::Discrepancy;
use crate::models::paths::GamePaths;
use camino::{Utf8Path, Utf8PathBuf};
use dunce::canonicalize;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of checking a directory picked as the game root.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GameRootReport {
    pub root: Utf8PathBuf,
    /// Expected game files that were not found. The root is still usable.
    pub missing: Vec<Utf8PathBuf>,
}

impl GameRootReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Canonicalizes `path` and reports which expected game files are absent.
pub fn validate_game_root(path: &Utf8Path) -> Result<GameRootReport, SError> {
    if !path.is_dir() {
        return Err(SError::NotFound(format!("game root {path}")));
    }
    let root = Utf8PathBuf::try_from(canonicalize(path)?)?;

    let paths = GamePaths::new(&root);
    let missing: Vec<Utf8PathBuf> = [&paths.shipping_exe]
        .into_iter()
        .filter(|p| !p.is_file())
        .filter_map(|p| p.strip_prefix(&root).ok().map(Utf8Path::to_path_buf))
        .collect();

    if !missing.is_empty() {
        warn!("game root {root} is missing {} expected file(s)", missing.len());
    }
    Ok(GameRootReport { root, missing })
}

/// Everything the engine manages: one slot manager per discovered profile and
/// the mod manager of the configured game root, all behind one game lock.
pub struct Engine {
    settings: EngineSettings,
    lock: Arc<dyn GameLock>,
    profiles: ProfileRepository,
    slots: BTreeMap<String, Mutex<SlotManager>>,
    mods: Option<Mutex<ModManager>>,
}

impl Engine {
    /// Builds the engine with a process watcher polling for the game.
    pub fn start(settings: EngineSettings) -> Result<Self, SError> {
        let watcher = ProcessWatcher::spawn(settings.process_name.clone(), settings.poll_interval())?;
        Ok(Self::with_lock(settings, Arc::new(watcher)))
    }

    /// Builds the engine around a caller-provided game lock.
    pub fn with_lock(settings: EngineSettings, lock: Arc<dyn GameLock>) -> Self {
        let profiles = ProfileRepository::discover(settings.profiles.clone());

        let slots = profiles
            .profiles()
            .map(|p| {
                let manager = SlotManager::open(p.clone(), settings.live_save.clone(), lock.clone());
                (p.id.clone(), Mutex::new(manager))
            })
            .collect();

        let mods = settings.game_root.as_ref().map(|root| {
            Mutex::new(ModManager::open(root.clone(), settings.mod_layout(), lock.clone()))
        });

        let engine = Self {
            settings,
            lock,
            profiles,
            slots,
            mods,
        };

        for (scope, found) in engine.reconcile() {
            for d in found {
                warn!("{scope}: {d}");
            }
        }
        info!("engine ready with {} profile(s)", engine.profiles.len());
        engine
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn profiles(&self) -> &ProfileRepository {
        &self.profiles
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    fn slot_handle(&self, profile_id: &str) -> Result<&Mutex<SlotManager>, SError> {
        self.slots
            .get(profile_id)
            .ok_or_else(|| SError::NotFound(format!("profile '{profile_id}'")))
    }

    pub fn with_slots<F, R>(&self, profile_id: &str, f: F) -> Result<R, SError>
    where
        F: FnOnce(&mut SlotManager) -> Result<R, SError>,
    {
        let mut guard = self.slot_handle(profile_id)?.lock();
        f(&mut guard)
    }

    pub fn with_mods<F, R>(&self, f: F) -> Result<R, SError>
    where
        F: FnOnce(&mut ModManager) -> Result<R, SError>,
    {
        let handle = self
            .mods
            .as_ref()
            .ok_or_else(|| SError::NotFound("game root is not configured".into()))?;
        let mut guard = handle.lock();
        f(&mut guard)
    }

    /// Copies `slot_id` from one profile to another. See [`cross_copy::copy_slot`].
    #[instrument(skip(self))]
    pub fn copy_slot(&self, from: &str, slot_id: &str, to: &str) -> Result<String, SError> {
        if from == to {
            let guard = self.slot_handle(from)?.lock();
            let name = guard.slot_record(slot_id)?.name.clone();
            return Err(SError::DuplicateName(name));
        }

        let source = self.slot_handle(from)?;
        let dest = self.slot_handle(to)?;
        // Always lock in profile id order.
        let (source, mut dest) = if from < to {
            let s = source.lock();
            (s, dest.lock())
        } else {
            let d = dest.lock();
            (source.lock(), d)
        };
        cross_copy::copy_slot(&source, slot_id, &mut dest)
    }

    /// Drift between manifests and disk, keyed by profile id (mods under
    /// `"mods"`). Only scopes with findings are listed.
    pub fn reconcile(&self) -> BTreeMap<String, Vec<Discrepancy>> {
        let mut report = BTreeMap::new();

        for (id, handle) in &self.slots {
            match handle.lock().reconcile() {
                Ok(found) if !found.is_empty() => {
                    report.insert(id.clone(), found);
                }
                Ok(_) => {}
                Err(e) => warn!("could not scan profile '{id}': {e}"),
            }
        }

        if let Some(handle) = &self.mods {
            let found = handle.lock().reconcile();
            if !found.is_empty() {
                report.insert("mods".to_string(), found);
            }
        }

        report
    }
}
