use crate::core::live_save::LiveSaveRules;
use crate::core::manifest_store::Loaded;
use crate::core::process_guard::{ensure_unlocked, GameLock};
use crate::core::profile::SaveProfile;
use crate::models::error::SError;
use crate::models::manifest::{BackupRecord, ProfileManifest, SlotRecord, MANIFEST_VERSION};
use crate::models::outcome::{Confirmation, Discrepancy, Outcome};
use crate::models::paths::{self, ACTIVE_SAVE_FILE, BACKUP_EXTENSION};
use crate::models::slot_dto::{BackupQuery, BackupSort, BackupSummary, LoadReport, SlotSummary};
use crate::utils::file::FileUtils;
use crate::utils::id::new_id;
use crate::utils::time::{auto_backup_name, now};
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Slots and backups of one save profile.
///
/// Mutating calls that touch the live save or stored blobs check the game lock
/// first and return `GameRunning` before writing anything. Metadata-only calls
/// (`create_slot`, `rename_slot`) are not gated.
pub struct SlotManager {
    profile: SaveProfile,
    rules: LiveSaveRules,
    lock: Arc<dyn GameLock>,
    manifest: ProfileManifest,
    load_warning: Option<SError>,
}

impl SlotManager {
    pub fn open(profile: SaveProfile, rules: LiveSaveRules, lock: Arc<dyn GameLock>) -> Self {
        let Loaded { value, warning } = profile.store.load::<ProfileManifest>();
        if let Some(w) = &warning {
            warn!("profile '{}' opened with an empty manifest: {w}", profile.id);
        }

        Self {
            profile,
            rules,
            lock,
            manifest: value,
            load_warning: warning,
        }
    }

    pub fn profile(&self) -> &SaveProfile {
        &self.profile
    }

    pub fn manifest(&self) -> &ProfileManifest {
        &self.manifest
    }

    /// Set when the manifest on disk was unreadable and the manager started
    /// from the empty state.
    pub fn load_warning(&self) -> Option<&SError> {
        self.load_warning.as_ref()
    }

    pub fn lock(&self) -> &Arc<dyn GameLock> {
        &self.lock
    }

    pub fn active_slot(&self) -> Option<&str> {
        self.manifest.active_slot.as_deref()
    }

    /// A slot is loaded when its save was the last one copied into the live
    /// directory of this profile.
    pub fn is_loaded(&self, slot_id: &str) -> bool {
        self.manifest.slots.contains_key(slot_id) && self.active_slot() == Some(slot_id)
    }

    pub fn has_live_save(&self) -> bool {
        self.rules.has_live_save(&self.profile.root)
    }

    pub fn slot_dir(&self, slot_id: &str) -> Utf8PathBuf {
        paths::slot_dir(&self.profile.paths, slot_id)
    }

    pub fn slot_record(&self, slot_id: &str) -> Result<&SlotRecord, SError> {
        self.manifest
            .slots
            .get(slot_id)
            .ok_or_else(|| SError::NotFound(format!("slot '{slot_id}'")))
    }

    fn backup_record(&self, slot_id: &str, backup_id: &str) -> Result<&BackupRecord, SError> {
        self.slot_record(slot_id)?
            .backups
            .get(backup_id)
            .ok_or_else(|| SError::NotFound(format!("backup '{backup_id}'")))
    }

    pub fn name_taken(&self, name: &str, except: Option<&str>) -> bool {
        self.manifest
            .slots
            .iter()
            .any(|(id, s)| s.name == name && Some(id.as_str()) != except)
    }

    pub fn find_slot(&self, name: &str) -> Option<&str> {
        self.manifest
            .slots
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id.as_str())
    }

    /// Applies `change` to a copy of the manifest and keeps the copy only once
    /// it is on disk. An unreadable manifest is set aside before the first save.
    fn commit<R>(
        &mut self,
        change: impl FnOnce(&mut ProfileManifest) -> Result<R, SError>,
    ) -> Result<R, SError> {
        let mut next = self.manifest.clone();
        let out = change(&mut next)?;
        next.version = MANIFEST_VERSION;

        if self.load_warning.is_some() {
            self.profile.store.set_aside()?;
        }
        self.profile.store.save(&next)?;

        self.manifest = next;
        self.load_warning = None;
        Ok(out)
    }

    // --- Queries ---

    /// Slots ordered by name.
    pub fn slots(&self) -> Vec<SlotSummary> {
        let mut slots: Vec<_> = self
            .manifest
            .slots
            .iter()
            .map(|(id, s)| SlotSummary::from_record(id, s, self.is_loaded(id)))
            .collect();
        slots.sort_by_key(|s| s.name.to_lowercase());
        slots
    }

    pub fn slot(&self, slot_id: &str) -> Result<SlotSummary, SError> {
        let record = self.slot_record(slot_id)?;
        Ok(SlotSummary::from_record(slot_id, record, self.is_loaded(slot_id)))
    }

    pub fn backups(&self, slot_id: &str, query: &BackupQuery) -> Result<Vec<BackupSummary>, SError> {
        let record = self.slot_record(slot_id)?;
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut backups: Vec<_> = record
            .backups
            .iter()
            .filter(|(_, b)| {
                needle
                    .as_deref()
                    .map_or(true, |n| b.name.to_lowercase().contains(n))
            })
            .map(|(id, b)| {
                let path = paths::backup_file(&self.profile.paths, slot_id, id);
                BackupSummary::from_record(id, b, path)
            })
            .collect();

        match query.sort {
            BackupSort::DateDesc => backups.sort_by(|a, b| {
                (b.created_at, b.sequence).cmp(&(a.created_at, a.sequence))
            }),
            BackupSort::DateAsc => {
                backups.sort_by(|a, b| (a.created_at, a.sequence).cmp(&(b.created_at, b.sequence)))
            }
            BackupSort::Name => backups.sort_by_key(|b| b.name.to_lowercase()),
        }
        Ok(backups)
    }

    // --- Slots ---

    #[instrument(skip(self), fields(profile = %self.profile.id))]
    pub fn create_slot(&mut self, name: &str) -> Result<String, SError> {
        let name = validate_name(name)?;
        if self.name_taken(&name, None) {
            return Err(SError::DuplicateName(name));
        }

        let slot_id = new_id();
        let dir = self.slot_dir(&slot_id);
        std::fs::create_dir_all(&dir)?;
        let record = SlotRecord::new(name, now());
        if let Err(e) = self.commit(|m| {
            m.slots.insert(slot_id.clone(), record);
            Ok(())
        }) {
            let _ = FileUtils::remove_dir_if_exists(&dir);
            return Err(e);
        }

        info!("created slot {slot_id}");
        Ok(slot_id)
    }

    #[instrument(skip(self), fields(profile = %self.profile.id))]
    pub fn rename_slot(&mut self, slot_id: &str, new_name: &str) -> Result<(), SError> {
        let new_name = validate_name(new_name)?;
        self.slot_record(slot_id)?;
        if self.name_taken(&new_name, Some(slot_id)) {
            return Err(SError::DuplicateName(new_name));
        }

        self.commit(|m| {
            slot_entry(m, slot_id)?.name = new_name;
            Ok(())
        })
    }

    /// Removes the slot's directory, then its manifest entry. If the directory
    /// cannot be removed the manifest is left untouched.
    ///
    /// Deleting the loaded slot leaves the live save in place; it becomes
    /// untracked.
    #[instrument(skip(self), fields(profile = %self.profile.id))]
    pub fn delete_slot(&mut self, slot_id: &str) -> Result<(), SError> {
        ensure_unlocked(self.lock.as_ref())?;
        self.slot_record(slot_id)?;

        FileUtils::remove_dir_if_exists(&self.slot_dir(slot_id))?;

        self.commit(|m| {
            m.slots.remove(slot_id);
            if m.active_slot.as_deref() == Some(slot_id) {
                m.active_slot = None;
            }
            Ok(())
        })?;

        info!("deleted slot {slot_id}");
        Ok(())
    }

    /// Makes `slot_id` the live save of this profile.
    ///
    /// Without `confirmed`, returns `NeedsConfirmation` instead of doing
    /// anything that would discard live data nobody has stored: clearing the
    /// live save for an empty slot, overwriting a live save no slot tracks, or
    /// reverting the loaded slot's own unsaved progress.
    ///
    /// When switching away from another loaded slot, that slot's live progress
    /// is captured into its active save first.
    #[instrument(skip(self), fields(profile = %self.profile.id))]
    pub fn load_slot(&mut self, slot_id: &str, confirmed: bool) -> Result<Outcome<LoadReport>, SError> {
        ensure_unlocked(self.lock.as_ref())?;

        let record = self.slot_record(slot_id)?;
        let has_stored = record.has_active_save();
        let stored = paths::active_save_file(&self.profile.paths, slot_id);
        if has_stored && !stored.is_file() {
            return Err(SError::NotFound(format!("active save of slot '{slot_id}'")));
        }

        let has_live = self.has_live_save();
        let previous = self
            .manifest
            .active_slot
            .clone()
            .filter(|p| self.manifest.slots.contains_key(p));

        if !confirmed && has_live {
            let prompt = if !has_stored {
                Some(Confirmation::ClearLiveSave {
                    slot: record.name.clone(),
                })
            } else if previous.is_none() {
                Some(Confirmation::OverwriteUntrackedSave)
            } else if previous.as_deref() == Some(slot_id) {
                Some(Confirmation::DiscardLiveProgress {
                    slot: record.name.clone(),
                })
            } else {
                None
            };
            if let Some(prompt) = prompt {
                debug!("load of {slot_id} needs confirmation: {prompt}");
                return Ok(Outcome::NeedsConfirmation(prompt));
            }
        }

        let mut report = LoadReport {
            slot_id: slot_id.to_owned(),
            ..Default::default()
        };

        let mut captured = None;
        if let Some(prev) = previous.filter(|p| p != slot_id) {
            if has_live {
                captured = Some((prev.clone(), self.store_live_into_active(&prev)?));
                report.captured_previous = Some(prev);
            }
        }

        if has_stored {
            self.rules
                .unpack(&stored, &self.profile.root, &self.profile.staging_dir())?;
            report.wrote_live = true;
        } else {
            self.rules.clear(&self.profile.root)?;
            report.cleared_live = true;
        }

        self.commit(|m| {
            if let Some((prev, at)) = captured {
                slot_entry(m, &prev)?.active_save_at = Some(at);
            }
            m.active_slot = Some(slot_id.to_owned());
            slot_entry(m, slot_id)?.loaded_at = Some(now());
            Ok(())
        })?;

        info!("loaded slot {slot_id}");
        Ok(Outcome::Done(report))
    }

    /// Creates the first slot from a live save that no slot tracks yet, and
    /// marks it loaded.
    #[instrument(skip(self), fields(profile = %self.profile.id))]
    pub fn adopt_live_save(&mut self, name: &str) -> Result<String, SError> {
        ensure_unlocked(self.lock.as_ref())?;
        let name = validate_name(name)?;
        if self.name_taken(&name, None) {
            return Err(SError::DuplicateName(name));
        }
        if !self.has_live_save() {
            return Err(SError::NotFound(format!("live save in {}", self.profile.root)));
        }

        let slot_id = new_id();
        let stored = paths::active_save_file(&self.profile.paths, &slot_id);
        if let Err(e) = self.rules.pack(&self.profile.root, &stored) {
            let _ = FileUtils::remove_dir_if_exists(&self.slot_dir(&slot_id));
            return Err(e);
        }

        let at = now();
        let mut record = SlotRecord::new(name, at);
        record.active_save_at = Some(at);
        record.loaded_at = Some(at);
        if let Err(e) = self.commit(|m| {
            m.slots.insert(slot_id.clone(), record);
            m.active_slot = Some(slot_id.clone());
            Ok(())
        }) {
            let _ = FileUtils::remove_dir_if_exists(&self.slot_dir(&slot_id));
            return Err(e);
        }

        info!("adopted live save as slot {slot_id}");
        Ok(slot_id)
    }

    /// Refreshes the loaded slot's active save from the live save.
    #[instrument(skip(self), fields(profile = %self.profile.id))]
    pub fn capture_active_save(&mut self, slot_id: &str) -> Result<(), SError> {
        ensure_unlocked(self.lock.as_ref())?;
        self.require_loaded(slot_id)?;
        let at = self.store_live_into_active(slot_id)?;
        self.commit(|m| {
            slot_entry(m, slot_id)?.active_save_at = Some(at);
            Ok(())
        })
    }

    fn require_loaded(&self, slot_id: &str) -> Result<&SlotRecord, SError> {
        let record = self.slot_record(slot_id)?;
        if !self.is_loaded(slot_id) {
            return Err(SError::NotLoaded(record.name.clone()));
        }
        Ok(record)
    }

    /// Writes the live save into `slot_id`'s active save blob and returns the
    /// time to stamp it with. The manifest is not touched.
    fn store_live_into_active(&self, slot_id: &str) -> Result<DateTime<Utc>, SError> {
        let stored = paths::active_save_file(&self.profile.paths, slot_id);
        self.rules.pack(&self.profile.root, &stored)?;
        debug!("captured live save into slot {slot_id}");
        Ok(now())
    }

    // --- Backups ---

    /// Snapshots the live save of the loaded slot into a new backup. Without a
    /// name the backup is called `Backup - NNNN` after its sequence number.
    #[instrument(skip(self), fields(profile = %self.profile.id))]
    pub fn create_backup(&mut self, slot_id: &str, name: Option<&str>) -> Result<String, SError> {
        ensure_unlocked(self.lock.as_ref())?;
        self.create_backup_unchecked(slot_id, name)
    }

    fn create_backup_unchecked(&mut self, slot_id: &str, name: Option<&str>) -> Result<String, SError> {
        let mut record = self.require_loaded(slot_id)?.clone();
        if !self.has_live_save() {
            return Err(SError::NotFound(format!("live save in {}", self.profile.root)));
        }

        let sequence = record.next_sequence();
        let name = match name {
            Some(n) => validate_name(n)?,
            None => format!("Backup - {sequence:04}"),
        };
        if record.backup_name_taken(&name, None) {
            return Err(SError::DuplicateName(name));
        }

        let backup_id = new_id();
        let backup_path = paths::backup_file(&self.profile.paths, slot_id, &backup_id);
        let stored = paths::active_save_file(&self.profile.paths, slot_id);

        self.rules.pack(&self.profile.root, &backup_path)?;
        if let Err(e) = FileUtils::copy_atomic(&backup_path, &stored) {
            let _ = FileUtils::remove_file_if_exists(&backup_path);
            return Err(e);
        }

        let at = now();
        record.active_save_at = Some(at);
        record.backups.insert(
            backup_id.clone(),
            BackupRecord {
                name,
                sequence,
                created_at: at,
            },
        );
        if let Err(e) = self.commit(|m| {
            m.slots.insert(slot_id.to_owned(), record);
            Ok(())
        }) {
            let _ = FileUtils::remove_file_if_exists(&backup_path);
            return Err(e);
        }

        info!("created backup {backup_id} (#{sequence}) for slot {slot_id}");
        Ok(backup_id)
    }

    /// Restores a backup into the slot's active save, and into the live save
    /// when the slot is loaded.
    ///
    /// `save_current_first`: `None` asks the caller first whenever loaded live
    /// progress would be replaced; `Some(true)` takes an implicit backup of
    /// the live save before restoring (skipped with a warning when the slot is
    /// not loaded); `Some(false)` restores straight away.
    #[instrument(skip(self), fields(profile = %self.profile.id))]
    pub fn load_backup(
        &mut self,
        slot_id: &str,
        backup_id: &str,
        save_current_first: Option<bool>,
    ) -> Result<Outcome<LoadReport>, SError> {
        ensure_unlocked(self.lock.as_ref())?;

        let slot_name = self.slot_record(slot_id)?.name.clone();
        self.backup_record(slot_id, backup_id)?;
        let backup_path = paths::backup_file(&self.profile.paths, slot_id, backup_id);
        if !backup_path.is_file() {
            return Err(SError::NotFound(backup_path.to_string()));
        }

        let loaded = self.is_loaded(slot_id);
        let has_live = self.has_live_save();

        let Some(save_first) = save_current_first.or((!(loaded && has_live)).then_some(false))
        else {
            return Ok(Outcome::NeedsConfirmation(Confirmation::BackupCurrentFirst {
                slot: slot_name,
            }));
        };

        let mut report = LoadReport {
            slot_id: slot_id.to_owned(),
            ..Default::default()
        };

        if save_first {
            if loaded && has_live {
                let base = auto_backup_name(now());
                let record = self.slot_record(slot_id)?;
                let auto = (1..)
                    .map(|n| if n == 1 { base.clone() } else { format!("{base} ({n})") })
                    .find(|candidate| !record.backup_name_taken(candidate, None))
                    .unwrap_or_else(|| base.clone());
                report.implicit_backup = Some(self.create_backup_unchecked(slot_id, Some(&auto))?);
            } else {
                let msg = format!("slot '{slot_name}' is not loaded; current progress was not backed up");
                warn!("{msg}");
                report.warnings.push(msg);
            }
        }

        let stored = paths::active_save_file(&self.profile.paths, slot_id);
        FileUtils::copy_atomic(&backup_path, &stored)?;
        let restored_at = now();

        if loaded {
            self.rules
                .unpack(&stored, &self.profile.root, &self.profile.staging_dir())?;
            report.wrote_live = true;
        }
        self.commit(|m| {
            let record = slot_entry(m, slot_id)?;
            record.active_save_at = Some(restored_at);
            if loaded {
                record.loaded_at = Some(now());
            }
            Ok(())
        })?;

        info!("restored backup {backup_id} into slot {slot_id}");
        Ok(Outcome::Done(report))
    }

    #[instrument(skip(self), fields(profile = %self.profile.id))]
    pub fn rename_backup(&mut self, slot_id: &str, backup_id: &str, new_name: &str) -> Result<(), SError> {
        ensure_unlocked(self.lock.as_ref())?;
        let new_name = validate_name(new_name)?;
        self.backup_record(slot_id, backup_id)?;
        if self.slot_record(slot_id)?.backup_name_taken(&new_name, Some(backup_id)) {
            return Err(SError::DuplicateName(new_name));
        }

        self.commit(|m| {
            if let Some(b) = slot_entry(m, slot_id)?.backups.get_mut(backup_id) {
                b.name = new_name;
            }
            Ok(())
        })
    }

    /// Deletes the backup file, then its manifest entry. The slot's sequence
    /// counter is left as is.
    #[instrument(skip(self), fields(profile = %self.profile.id))]
    pub fn delete_backup(&mut self, slot_id: &str, backup_id: &str) -> Result<(), SError> {
        ensure_unlocked(self.lock.as_ref())?;
        self.backup_record(slot_id, backup_id)?;

        FileUtils::remove_file_if_exists(&paths::backup_file(&self.profile.paths, slot_id, backup_id))?;
        self.commit(|m| {
            slot_entry(m, slot_id)?.backups.remove(backup_id);
            Ok(())
        })?;

        info!("deleted backup {backup_id} of slot {slot_id}");
        Ok(())
    }

    // --- Cross-profile support ---

    /// Registers a slot whose directory was copied in from another profile.
    /// The record arrives unloaded.
    pub(crate) fn attach_copied_slot(&mut self, slot_id: &str, mut record: SlotRecord) -> Result<(), SError> {
        if self.name_taken(&record.name, None) {
            return Err(SError::DuplicateName(record.name));
        }
        record.loaded_at = None;
        self.commit(|m| {
            m.slots.insert(slot_id.to_owned(), record);
            Ok(())
        })
    }

    // --- Reconciliation ---

    /// Compares the manifest with the slot directories on disk.
    pub fn reconcile(&self) -> Result<Vec<Discrepancy>, SError> {
        let mut found = Vec::new();

        for (id, slot) in &self.manifest.slots {
            let dir = self.slot_dir(id);
            if !dir.is_dir() {
                found.push(Discrepancy::SlotDirectoryMissing(slot.name.clone()));
                continue;
            }

            if slot.has_active_save() && !dir.join(ACTIVE_SAVE_FILE).is_file() {
                found.push(Discrepancy::ActiveSaveMissing(slot.name.clone()));
            }

            for (backup_id, backup) in &slot.backups {
                if !paths::backup_file(&self.profile.paths, id, backup_id).is_file() {
                    found.push(Discrepancy::BackupFileMissing {
                        slot: slot.name.clone(),
                        backup: backup.name.clone(),
                    });
                }
            }

            let expected: BTreeSet<String> = slot
                .backups
                .keys()
                .map(|b| format!("{b}.{BACKUP_EXTENSION}"))
                .chain(std::iter::once(ACTIVE_SAVE_FILE.to_string()))
                .collect();
            for entry in dir.read_dir_utf8()? {
                let entry = entry?;
                if !expected.contains(entry.file_name()) {
                    found.push(Discrepancy::UntrackedBackupFile {
                        slot: slot.name.clone(),
                        file: entry.file_name().to_string(),
                    });
                }
            }
        }

        if self.profile.paths.slots.is_dir() {
            for entry in self.profile.paths.slots.read_dir_utf8()? {
                let entry = entry?;
                if entry.file_type()?.is_dir() && !self.manifest.slots.contains_key(entry.file_name()) {
                    found.push(Discrepancy::UntrackedSlotDirectory(entry.file_name().to_string()));
                }
            }
        }

        if !found.is_empty() {
            warn!("profile '{}' has {} discrepancies", self.profile.id, found.len());
        }
        Ok(found)
    }
}

fn slot_entry<'a>(manifest: &'a mut ProfileManifest, slot_id: &str) -> Result<&'a mut SlotRecord, SError> {
    manifest
        .slots
        .get_mut(slot_id)
        .ok_or_else(|| SError::NotFound(format!("slot '{slot_id}'")))
}

fn validate_name(name: &str) -> Result<String, SError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SError::ParseError("name cannot be empty".into()));
    }
    Ok(trimmed.to_owned())
}
