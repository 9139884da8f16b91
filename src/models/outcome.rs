use camino::Utf8PathBuf;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Result of an operation that may need the caller's go-ahead before it
/// touches anything it cannot undo.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    NeedsConfirmation(Confirmation),
}

impl<T> Outcome<T> {
    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(v) => Some(v),
            Outcome::NeedsConfirmation(_) => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Display)]
pub enum Confirmation {
    #[display("loading empty slot '{slot}' deletes the live save")]
    ClearLiveSave { slot: String },
    #[display("the live save does not belong to any slot and will be overwritten")]
    OverwriteUntrackedSave,
    #[display("unsaved progress of loaded slot '{slot}' will be replaced")]
    DiscardLiveProgress { slot: String },
    #[display("back up the current progress of '{slot}' first?")]
    BackupCurrentFirst { slot: String },
    #[display("{} archive(s) look malformed", _0.len())]
    PossiblyMalformed(Vec<MalformedArchive>),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MalformedArchive {
    pub archive: Utf8PathBuf,
    pub entries: Vec<FlaggedEntry>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FlaggedEntry {
    pub path: String,
    pub reason: MalformedReason,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum MalformedReason {
    #[display("escapes the game root")]
    EscapesRoot,
    #[display("top-level directory is not part of the game")]
    UnknownTopLevel,
    #[display("destination directory does not exist in the game")]
    MissingDestination,
}

/// Drift between a manifest and what is on disk. Reported, never fixed
/// automatically.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Display)]
pub enum Discrepancy {
    #[display("slot '{_0}' has no directory on disk")]
    SlotDirectoryMissing(String),
    #[display("directory '{_0}' is not tracked by the manifest")]
    UntrackedSlotDirectory(String),
    #[display("slot '{_0}' has an active save timestamp but no active save file")]
    ActiveSaveMissing(String),
    #[display("backup '{backup}' of slot '{slot}' has no file")]
    BackupFileMissing { slot: String, backup: String },
    #[display("file '{file}' in slot '{slot}' is not tracked")]
    UntrackedBackupFile { slot: String, file: String },
    #[display("mod '{id}' is missing '{path}'")]
    ModFileMissing { id: String, path: Utf8PathBuf },
    #[display("mod '{_0}' has files in both enabled and disabled state")]
    ModMixedState(String),
}
