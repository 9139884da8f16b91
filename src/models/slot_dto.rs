use crate::models::manifest::{BackupRecord, SlotRecord};
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SlotSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub active_save_at: Option<DateTime<Utc>>,
    pub backup_count: usize,
    pub is_loaded: bool,
}

impl SlotSummary {
    pub fn from_record(id: &str, record: &SlotRecord, is_loaded: bool) -> Self {
        Self {
            id: id.to_owned(),
            name: record.name.to_owned(),
            created_at: record.created_at,
            active_save_at: record.active_save_at,
            backup_count: record.backups.len(),
            is_loaded,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BackupSummary {
    pub id: String,
    pub name: String,
    pub sequence: u32,
    pub created_at: DateTime<Utc>,
    pub path: Utf8PathBuf,
}

impl BackupSummary {
    pub fn from_record(id: &str, record: &BackupRecord, path: Utf8PathBuf) -> Self {
        Self {
            id: id.to_owned(),
            name: record.name.to_owned(),
            sequence: record.sequence,
            created_at: record.created_at,
            path,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub enum BackupSort {
    #[default]
    DateDesc,
    DateAsc,
    Name,
}

/// Filter and ordering applied when listing backups.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BackupQuery {
    pub search: Option<String>,
    pub sort: BackupSort,
}

/// What a successful slot or backup load did.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LoadReport {
    pub slot_id: String,
    /// The live save was removed because the slot was empty.
    pub cleared_live: bool,
    /// Slot whose live progress was captured before switching away from it.
    pub captured_previous: Option<String>,
    /// Backup taken on the caller's request before a backup load.
    pub implicit_backup: Option<String>,
    pub wrote_live: bool,
    pub warnings: Vec<String>,
}
