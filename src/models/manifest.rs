use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MANIFEST_VERSION: u8 = 1;

/// Everything the engine persists about one save profile.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ProfileManifest {
    #[serde(default)]
    pub version: u8,
    /// The slot whose save was most recently copied into the live directory.
    #[serde(default)]
    pub active_slot: Option<String>,
    #[serde(default)]
    pub slots: BTreeMap<String, SlotRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SlotRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Highest backup sequence ever issued for this slot.
    #[serde(default)]
    pub backup_counter: u32,
    #[serde(default)]
    pub backups: BTreeMap<String, BackupRecord>,
    /// `None` for an empty slot.
    #[serde(default)]
    pub active_save_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl SlotRecord {
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        Self {
            name,
            created_at: now,
            backup_counter: 0,
            backups: BTreeMap::new(),
            active_save_at: None,
            loaded_at: None,
        }
    }

    pub fn has_active_save(&self) -> bool {
        self.active_save_at.is_some()
    }

    /// Claims the next sequence number. Never returns a number issued before,
    /// including ones whose backups were deleted since.
    pub fn next_sequence(&mut self) -> u32 {
        let highest_live = self.backups.values().map(|b| b.sequence).max().unwrap_or(0);
        self.backup_counter = self.backup_counter.max(highest_live) + 1;
        self.backup_counter
    }

    pub fn backup_name_taken(&self, name: &str, except: Option<&str>) -> bool {
        self.backups
            .iter()
            .any(|(id, b)| b.name == name && Some(id.as_str()) != except)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BackupRecord {
    pub name: String,
    pub sequence: u32,
    pub created_at: DateTime<Utc>,
}

/// Installed mods of one game root.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ModManifest {
    #[serde(default)]
    pub version: u8,
    #[serde(default)]
    pub mods: BTreeMap<String, ModRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModRecord {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    /// Set when a toggle left some files renamed and others not.
    #[serde(default)]
    pub inconsistent: bool,
    /// Paths relative to the game root, without the disabled suffix.
    pub files: Vec<Utf8PathBuf>,
    /// Files in `files` that already existed in the game. Their original
    /// contents are kept under the originals directory and put back on delete.
    #[serde(default)]
    pub replaced: Vec<Utf8PathBuf>,
    /// Directories the install created, relative to the game root.
    #[serde(default)]
    pub created_dirs: Vec<Utf8PathBuf>,
    pub installed_at: DateTime<Utc>,
}
