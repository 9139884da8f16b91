use crate::models::manifest::ModRecord;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModSummary {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub inconsistent: bool,
    pub file_count: usize,
}

impl From<&ModRecord> for ModSummary {
    fn from(record: &ModRecord) -> Self {
        Self {
            id: record.id.to_owned(),
            name: record.name.to_owned(),
            enabled: record.enabled,
            inconsistent: record.inconsistent,
            file_count: record.files.len(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModFileState {
    Enabled,
    Disabled,
    /// Both the plain and the suffixed name exist.
    Both,
    Missing,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModFileStatus {
    pub path: Utf8PathBuf,
    pub state: ModFileState,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct InstallReport {
    pub installed: Vec<String>,
    /// Entries left out because they would land outside the game root.
    pub skipped_entries: Vec<String>,
}
