#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use save_keeper_lib::core::live_save::LiveSaveRules;
use save_keeper_lib::core::process_guard::FixedLock;
use save_keeper_lib::core::profile::SaveProfile;
use save_keeper_lib::core::slot_manager::SlotManager;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const LIVE_FILE: &str = "0gamedata.bin";

/// Temp dir converted to a camino path. Keep the `TempDir` alive for the test.
pub fn temp_root() -> (TempDir, Utf8PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
    (tmp, root)
}

/// A slot manager over a fresh profile directory with an unlocked game lock.
pub fn setup_profile(root: &Utf8Path, id: &str) -> (SlotManager, Arc<FixedLock>) {
    let profile_root = root.join(id);
    fs::create_dir_all(&profile_root).unwrap();

    let lock = Arc::new(FixedLock::new(false));
    let manager = SlotManager::open(
        SaveProfile::new(id, &profile_root),
        LiveSaveRules::default(),
        lock.clone(),
    );
    (manager, lock)
}

/// Reopens a profile from disk, as a restart would.
pub fn reopen(manager: &SlotManager, lock: Arc<FixedLock>) -> SlotManager {
    SlotManager::open(manager.profile().clone(), LiveSaveRules::default(), lock)
}

pub fn write_live(manager: &SlotManager, contents: &[u8]) {
    fs::write(manager.profile().root.join(LIVE_FILE), contents).unwrap();
}

pub fn read_live(manager: &SlotManager) -> Option<Vec<u8>> {
    fs::read(manager.profile().root.join(LIVE_FILE)).ok()
}

/// Every file under `root` with its bytes, for "nothing changed" checks.
pub fn snapshot(root: &Utf8Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root.as_std_path()).unwrap();
            (rel.to_string_lossy().replace('\\', "/"), fs::read(e.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}

/// Sets up a fake game installation.
pub fn setup_game(root: &Utf8Path) -> Utf8PathBuf {
    let game_root = root.join("game");
    fs::create_dir_all(game_root.join("Game/Binaries/Win64")).unwrap();
    fs::create_dir_all(game_root.join("Game/Content/Paks")).unwrap();
    fs::write(
        game_root.join("Game/Binaries/Win64/NFL1-Win64-Shipping.exe"),
        "exe",
    )
    .unwrap();
    game_root
}

/// Writes a zip archive containing `entries` (name, contents).
pub fn create_mod_zip(dir: &Utf8Path, file_name: &str, entries: &[(&str, &str)]) -> Utf8PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(file_name);
    let mut zip = ZipWriter::new(fs::File::create(&path).unwrap());
    let options = SimpleFileOptions::default();

    for (name, contents) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
    }

    zip.finish().unwrap();
    path
}
