use crate::core::archive::{self, ArchiveEntry, Extraction, ModLayout};
use crate::core::manifest_store::{Loaded, ManifestStore};
use crate::core::process_guard::{ensure_unlocked, GameLock};
use crate::models::error::{FileFailure, SError};
use crate::models::manifest::{ModManifest, ModRecord, MANIFEST_VERSION};
use crate::models::mod_dto::{InstallReport, ModFileState, ModFileStatus, ModSummary};
use crate::models::outcome::{Confirmation, Discrepancy, MalformedArchive, Outcome};
use crate::models::paths::{disabled_path, GamePaths};
use crate::utils::file::FileUtils;
use crate::utils::id::mod_id;
use crate::utils::time::now;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Mods installed into one game root.
pub struct ModManager {
    game_root: Utf8PathBuf,
    layout: ModLayout,
    lock: Arc<dyn GameLock>,
    store: ManifestStore,
    manifest: ModManifest,
    load_warning: Option<SError>,
}

/// An archive that passed the pre-install checks.
struct Candidate {
    archive: Utf8PathBuf,
    id: String,
    name: String,
}

impl ModManager {
    pub fn open(game_root: impl Into<Utf8PathBuf>, layout: ModLayout, lock: Arc<dyn GameLock>) -> Self {
        let game_root = game_root.into();
        let store = ManifestStore::for_mods(&game_root);
        let Loaded { value, warning } = store.load::<ModManifest>();
        if let Some(w) = &warning {
            warn!("mod manifest of {game_root} unreadable, starting empty: {w}");
        }

        Self {
            game_root,
            layout,
            lock,
            store,
            manifest: value,
            load_warning: warning,
        }
    }

    pub fn game_root(&self) -> &Utf8Path {
        &self.game_root
    }

    pub fn load_warning(&self) -> Option<&SError> {
        self.load_warning.as_ref()
    }

    /// Applies `change` to a copy of the manifest and keeps the copy only once
    /// it is on disk. An unreadable manifest is set aside before the first save.
    fn commit(&mut self, change: impl FnOnce(&mut ModManifest)) -> Result<(), SError> {
        let mut next = self.manifest.clone();
        change(&mut next);
        next.version = MANIFEST_VERSION;

        if self.load_warning.is_some() {
            self.store.set_aside()?;
        }
        self.store.save(&next)?;

        self.manifest = next;
        self.load_warning = None;
        Ok(())
    }

    /// Where the game files a mod overwrote are kept.
    fn originals_dir(&self, id: &str) -> Utf8PathBuf {
        GamePaths::new(&self.game_root).originals.join(id)
    }

    fn record(&self, id: &str) -> Result<&ModRecord, SError> {
        self.manifest
            .mods
            .get(id)
            .ok_or_else(|| SError::NotFound(format!("mod '{id}'")))
    }

    /// Installed mods ordered by name.
    pub fn mods(&self) -> Vec<ModSummary> {
        let mut mods: Vec<ModSummary> = self.manifest.mods.values().map(ModSummary::from).collect();
        mods.sort_by_key(|m| m.name.to_lowercase());
        mods
    }

    pub fn get(&self, id: &str) -> Result<ModSummary, SError> {
        self.record(id).map(ModSummary::from)
    }

    pub fn files(&self, id: &str) -> Result<&[Utf8PathBuf], SError> {
        self.record(id).map(|m| m.files.as_slice())
    }

    // --- Install ---

    /// Installs each archive as a new enabled mod named after the archive.
    ///
    /// All archives are checked before anything is extracted. Archives whose
    /// entries do not fit the game layout are returned together as
    /// `PossiblyMalformed` unless `proceed` is set; entries that would escape
    /// the game root are never extracted either way.
    #[instrument(skip(self, zip_paths))]
    pub fn install<P: AsRef<Utf8Path>>(
        &mut self,
        zip_paths: &[P],
        proceed: bool,
    ) -> Result<Outcome<InstallReport>, SError> {
        ensure_unlocked(self.lock.as_ref())?;

        let mut candidates = Vec::with_capacity(zip_paths.len());
        let mut malformed = Vec::new();
        let mut claimed = self.owned_files();

        for path in zip_paths {
            let archive = path.as_ref();
            let name = archive
                .file_stem()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| SError::ParseError(format!("Unable to get mod name for {archive}")))?
                .to_string();
            let id = mod_id(&name);
            if self.manifest.mods.contains_key(&id) || candidates.iter().any(|c: &Candidate| c.id == id) {
                return Err(SError::DuplicateName(name));
            }

            let entries = archive::list_entries(archive)?;
            self.check_collisions(&name, &entries, &mut claimed)?;

            let flagged = archive::inspect(&entries, &self.game_root, &self.layout);
            if !flagged.is_empty() {
                debug!("{archive}: {} entries flagged", flagged.len());
                malformed.push(MalformedArchive {
                    archive: archive.to_owned(),
                    entries: flagged,
                });
            }

            candidates.push(Candidate {
                archive: archive.to_owned(),
                id,
                name,
            });
        }

        if !malformed.is_empty() && !proceed {
            return Ok(Outcome::NeedsConfirmation(Confirmation::PossiblyMalformed(malformed)));
        }

        for dir in &self.layout.drop_in_dirs {
            std::fs::create_dir_all(self.game_root.join(dir))?;
        }

        let mut report = InstallReport::default();
        for candidate in candidates {
            let skipped = self.install_one(&candidate)?;
            report.skipped_entries.extend(skipped);
            report.installed.push(candidate.id);
        }

        Ok(Outcome::Done(report))
    }

    /// Paths tracked by installed mods, under either name.
    fn owned_files(&self) -> BTreeMap<Utf8PathBuf, String> {
        self.manifest
            .mods
            .values()
            .flat_map(|m| m.files.iter().map(move |f| (f.clone(), m.name.clone())))
            .collect()
    }

    fn check_collisions(
        &self,
        name: &str,
        entries: &[ArchiveEntry],
        claimed: &mut BTreeMap<Utf8PathBuf, String>,
    ) -> Result<(), SError> {
        let mut collisions = BTreeSet::new();
        for path in entries.iter().filter(|e| !e.is_dir).filter_map(|e| e.path.as_ref()) {
            if let Some(owner) = claimed.get(path) {
                collisions.insert(format!("'{path}' is already provided by '{owner}'"));
            }
        }

        if !collisions.is_empty() {
            return Err(SError::FileCollision(collisions.into_iter().collect()));
        }

        for path in entries.iter().filter(|e| !e.is_dir).filter_map(|e| e.path.clone()) {
            claimed.insert(path, name.to_string());
        }
        Ok(())
    }

    fn install_one(&mut self, candidate: &Candidate) -> Result<Vec<String>, SError> {
        let originals = self.originals_dir(&candidate.id);
        let mut out = Extraction::default();
        if let Err(e) = archive::extract_tracked(&candidate.archive, &self.game_root, &originals, &mut out) {
            error!("install of {} failed, undoing {} file(s): {e}", candidate.archive, out.written.len());
            self.undo_extraction(&candidate.id, &out);
            return Err(e);
        }

        for entry in &out.skipped {
            warn!("{}: skipped unsafe entry '{entry}'", candidate.archive);
        }
        for rel in &out.replaced {
            warn!("{}: replaced game file '{rel}', original kept", candidate.archive);
        }

        let mut files = out.written.clone();
        files.sort();
        let record = ModRecord {
            id: candidate.id.clone(),
            name: candidate.name.clone(),
            enabled: true,
            inconsistent: false,
            files,
            replaced: out.replaced.clone(),
            created_dirs: out.created_dirs.clone(),
            installed_at: now(),
        };

        if let Err(e) = self.commit(|m| {
            m.mods.insert(record.id.clone(), record);
        }) {
            self.undo_extraction(&candidate.id, &out);
            return Err(e);
        }

        info!("installed mod '{}' from {}", candidate.name, candidate.archive);
        Ok(out.skipped)
    }

    /// Best-effort undo of an install: written files are removed, or put back
    /// from their kept original, then the directories the install created.
    fn undo_extraction(&self, id: &str, out: &Extraction) {
        let originals = self.originals_dir(id);
        for rel in &out.written {
            let full = self.game_root.join(rel);
            let undone = if out.replaced.contains(rel) {
                FileUtils::copy_atomic(&originals.join(rel), &full)
            } else {
                FileUtils::remove_file_if_exists(&full).map(drop).map_err(SError::from)
            };
            if let Err(e) = undone {
                warn!("could not roll back {full}: {e}");
            }
        }
        FileUtils::remove_created_dirs(&self.game_root, &out.created_dirs);
        if let Err(e) = FileUtils::remove_dir_if_exists(&originals) {
            warn!("could not remove {originals}: {e}");
        }
    }

    // --- Toggle ---

    /// Renames every file of the mod to its enabled or disabled name.
    ///
    /// Every file is attempted. Files that could not be renamed come back as
    /// `PartialFailure`; the mod is then flagged inconsistent and calling
    /// again retries only what is left.
    #[instrument(skip(self))]
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), SError> {
        ensure_unlocked(self.lock.as_ref())?;
        let files = self.record(id)?.files.clone();

        let mut failures = Vec::new();
        for rel in &files {
            let plain = self.game_root.join(rel);
            let disabled = disabled_path(&plain);
            let (from, to) = if enabled {
                (disabled, plain)
            } else {
                (plain, disabled)
            };

            match (from.exists(), to.exists()) {
                (false, true) => continue,
                (false, false) => failures.push(FileFailure::new(rel, "file is missing")),
                (true, true) => failures.push(FileFailure::new(rel, format!("both '{from}' and '{to}' exist"))),
                (true, false) => {
                    if let Err(e) = std::fs::rename(&from, &to) {
                        failures.push(FileFailure::new(rel, e.to_string()));
                    }
                }
            }
        }

        let inconsistent = !failures.is_empty();
        self.commit(|m| {
            if let Some(record) = m.mods.get_mut(id) {
                record.enabled = enabled;
                record.inconsistent = inconsistent;
            }
        })?;

        if !failures.is_empty() {
            warn!("toggling mod {id} left {} file(s) behind", failures.len());
            return Err(SError::PartialFailure(failures));
        }

        info!("mod {id} {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    // --- Delete ---

    /// Removes every file of the mod under either name, puts back game files
    /// the mod replaced, then forgets the mod. Files that are already gone are
    /// fine. If any removal fails the mod stays registered and the failures
    /// are returned.
    #[instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> Result<(), SError> {
        ensure_unlocked(self.lock.as_ref())?;
        let record = self.record(id)?.clone();
        let originals = self.originals_dir(id);

        let mut failures = Vec::new();
        for rel in &record.files {
            let plain = self.game_root.join(rel);
            for path in [disabled_path(&plain), plain.clone()] {
                if let Err(e) = FileUtils::remove_file_if_exists(&path) {
                    failures.push(FileFailure::new(rel, e.to_string()));
                }
            }
            if record.replaced.contains(rel) {
                if let Err(e) = FileUtils::copy_atomic(&originals.join(rel), &plain) {
                    failures.push(FileFailure::new(rel, format!("could not restore original: {e}")));
                }
            }
        }

        if !failures.is_empty() {
            return Err(SError::PartialFailure(failures));
        }

        FileUtils::remove_created_dirs(&self.game_root, &record.created_dirs);
        FileUtils::remove_dir_if_exists(&originals)?;

        self.commit(|m| {
            m.mods.remove(id);
        })?;
        info!("deleted mod {id}");
        Ok(())
    }

    // --- Consistency ---

    fn file_state(&self, rel: &Utf8Path) -> ModFileState {
        let plain = self.game_root.join(rel);
        match (plain.is_file(), disabled_path(&plain).is_file()) {
            (true, true) => ModFileState::Both,
            (true, false) => ModFileState::Enabled,
            (false, true) => ModFileState::Disabled,
            (false, false) => ModFileState::Missing,
        }
    }

    /// On-disk state of each file of the mod. A mod whose files are not all in
    /// the same state fails with `PartialFailure` naming the odd ones out.
    pub fn verify(&self, id: &str) -> Result<Vec<ModFileStatus>, SError> {
        let record = self.record(id)?;
        let statuses: Vec<ModFileStatus> = record
            .files
            .iter()
            .map(|f| ModFileStatus {
                path: f.clone(),
                state: self.file_state(f),
            })
            .collect();

        let expected = if record.enabled {
            ModFileState::Enabled
        } else {
            ModFileState::Disabled
        };
        let present: BTreeSet<_> = statuses
            .iter()
            .filter(|s| s.state != ModFileState::Missing)
            .map(|s| s.state)
            .collect();

        if present.len() > 1 || statuses.iter().any(|s| s.state == ModFileState::Both) {
            let failures = statuses
                .iter()
                .filter(|s| s.state != expected && s.state != ModFileState::Missing)
                .map(|s| FileFailure::new(&s.path, format!("{:?}", s.state)))
                .collect();
            return Err(SError::PartialFailure(failures));
        }

        Ok(statuses)
    }

    /// Compares the mod manifest with the files under the game root.
    pub fn reconcile(&self) -> Vec<Discrepancy> {
        let mut found = Vec::new();

        for record in self.manifest.mods.values() {
            let mut seen = BTreeSet::new();
            for rel in &record.files {
                match self.file_state(rel) {
                    ModFileState::Missing => found.push(Discrepancy::ModFileMissing {
                        id: record.id.clone(),
                        path: rel.clone(),
                    }),
                    state => {
                        seen.insert(state);
                    }
                }
            }
            if seen.len() > 1 || seen.contains(&ModFileState::Both) || record.inconsistent {
                found.push(Discrepancy::ModMixedState(record.id.clone()));
            }
        }

        if !found.is_empty() {
            warn!("mods under {} have {} discrepancies", self.game_root, found.len());
        }
        found
    }
}
