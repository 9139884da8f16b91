mod common;

use common::{read_live, reopen, setup_profile, snapshot, temp_root, write_live};
use save_keeper_lib::models::error::SError;
use save_keeper_lib::models::outcome::{Confirmation, Discrepancy, Outcome};
use save_keeper_lib::models::slot_dto::{BackupQuery, BackupSort};
use std::fs;

#[test]
fn test_backup_sequence_survives_deleting_newest() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    // "Main" loaded with A1
    write_live(&slots, b"A1");
    let main = slots.adopt_live_save("Main").unwrap();

    let first = slots.create_backup(&main, None).unwrap();
    let listed = slots.backups(&main, &BackupQuery::default()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Backup - 0001");
    assert_eq!(listed[0].sequence, 1);

    slots.delete_backup(&main, &first).unwrap();
    slots.create_backup(&main, None).unwrap();

    let listed = slots.backups(&main, &BackupQuery::default()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Backup - 0002");
    assert_eq!(listed[0].sequence, 2);
}

#[test]
fn test_sequence_counter_is_persisted() {
    let (_tmp, root) = temp_root();
    let (mut slots, lock) = setup_profile(&root, "steam");
    write_live(&slots, b"A1");
    let main = slots.adopt_live_save("Main").unwrap();
    let b = slots.create_backup(&main, None).unwrap();
    slots.delete_backup(&main, &b).unwrap();

    let mut slots = reopen(&slots, lock);
    slots.create_backup(&main, None).unwrap();

    let listed = slots.backups(&main, &BackupQuery::default()).unwrap();
    assert_eq!(listed[0].sequence, 2);
}

#[test]
fn test_create_slot_rejects_duplicates_and_blank_names() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    slots.create_slot("Main").unwrap();
    assert_eq!(
        slots.create_slot("  Main "),
        Err(SError::DuplicateName("Main".into()))
    );
    assert!(matches!(slots.create_slot("   "), Err(SError::ParseError(_))));

    let other = slots.create_slot("Other").unwrap();
    assert!(matches!(
        slots.rename_slot(&other, "Main"),
        Err(SError::DuplicateName(_))
    ));
    slots.rename_slot(&other, "Renamed").unwrap();
    assert_eq!(slots.slot(&other).unwrap().name, "Renamed");
}

#[test]
fn test_slots_are_listed_by_name() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");
    for name in ["zeta", "Alpha", "beta"] {
        slots.create_slot(name).unwrap();
    }

    let names: Vec<_> = slots.slots().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["Alpha", "beta", "zeta"]);
}

#[test]
fn test_load_empty_slot_clears_then_restore_exact_bytes() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    let payload: Vec<u8> = (0..=255u8).rev().cycle().take(10_000).collect();
    write_live(&slots, &payload);
    let main = slots.adopt_live_save("Main").unwrap();
    let empty = slots.create_slot("Fresh").unwrap();

    // Clearing the live save has to be confirmed
    let outcome = slots.load_slot(&empty, false).unwrap();
    assert_eq!(
        outcome,
        Outcome::NeedsConfirmation(Confirmation::ClearLiveSave {
            slot: "Fresh".into()
        })
    );
    assert_eq!(read_live(&slots).as_deref(), Some(payload.as_slice()));

    let report = slots.load_slot(&empty, true).unwrap().done().unwrap();
    assert!(report.cleared_live);
    assert_eq!(report.captured_previous.as_deref(), Some(main.as_str()));
    assert!(!slots.has_live_save());
    assert!(slots.is_loaded(&empty));

    // No live save now, so switching back needs no confirmation
    let report = slots.load_slot(&main, false).unwrap().done().unwrap();
    assert!(report.wrote_live);
    assert_eq!(read_live(&slots), Some(payload));
    assert!(slots.is_loaded(&main));
    assert!(!slots.is_loaded(&empty));
}

#[test]
fn test_switching_slots_captures_outgoing_progress() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    write_live(&slots, b"main-v1");
    let main = slots.adopt_live_save("Main").unwrap();
    let alt = slots.create_slot("Alt").unwrap();
    slots.load_slot(&alt, true).unwrap();
    write_live(&slots, b"alt-v1");
    slots.capture_active_save(&alt).unwrap();

    slots.load_slot(&main, false).unwrap();
    write_live(&slots, b"main-v2");

    // Switching away from Main keeps its unsaved progress
    let report = slots.load_slot(&alt, false).unwrap().done().unwrap();
    assert_eq!(report.captured_previous.as_deref(), Some(main.as_str()));
    assert_eq!(read_live(&slots).as_deref(), Some(&b"alt-v1"[..]));

    slots.load_slot(&main, false).unwrap();
    assert_eq!(read_live(&slots).as_deref(), Some(&b"main-v2"[..]));
}

#[test]
fn test_loading_over_untracked_save_needs_confirmation() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    write_live(&slots, b"stored");
    let main = slots.adopt_live_save("Main").unwrap();
    slots.delete_slot(&main).unwrap();
    assert_eq!(slots.active_slot(), None);

    write_live(&slots, b"stored");
    let other = slots.adopt_live_save("Other").unwrap();
    let empty = slots.create_slot("Empty").unwrap();
    slots.load_slot(&empty, true).unwrap();
    write_live(&slots, b"untracked");
    slots.delete_slot(&empty).unwrap();

    let outcome = slots.load_slot(&other, false).unwrap();
    assert_eq!(
        outcome,
        Outcome::NeedsConfirmation(Confirmation::OverwriteUntrackedSave)
    );

    slots.load_slot(&other, true).unwrap();
    assert_eq!(read_live(&slots).as_deref(), Some(&b"stored"[..]));
}

#[test]
fn test_reloading_loaded_slot_needs_confirmation() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    write_live(&slots, b"v1");
    let main = slots.adopt_live_save("Main").unwrap();
    write_live(&slots, b"v2");

    let outcome = slots.load_slot(&main, false).unwrap();
    assert!(matches!(
        outcome,
        Outcome::NeedsConfirmation(Confirmation::DiscardLiveProgress { .. })
    ));
    assert_eq!(read_live(&slots).as_deref(), Some(&b"v2"[..]));

    slots.load_slot(&main, true).unwrap();
    assert_eq!(read_live(&slots).as_deref(), Some(&b"v1"[..]));
}

#[test]
fn test_delete_slot_removes_everything() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    write_live(&slots, b"A1");
    let main = slots.adopt_live_save("Main").unwrap();
    slots.create_backup(&main, None).unwrap();
    slots.create_backup(&main, Some("before boss")).unwrap();
    let dir = slots.slot_dir(&main);
    assert!(dir.is_dir());

    slots.delete_slot(&main).unwrap();

    assert!(!dir.exists());
    assert!(slots.slots().is_empty());
    assert!(matches!(slots.load_slot(&main, true), Err(SError::NotFound(_))));
    // The live save is left alone
    assert_eq!(read_live(&slots).as_deref(), Some(&b"A1"[..]));
}

#[test]
fn test_locked_mutations_write_nothing() {
    let (_tmp, root) = temp_root();
    let (mut slots, lock) = setup_profile(&root, "steam");

    write_live(&slots, b"A1");
    let main = slots.adopt_live_save("Main").unwrap();
    let backup = slots.create_backup(&main, None).unwrap();
    let empty = slots.create_slot("Empty").unwrap();

    lock.set(true);
    let before = snapshot(&slots.profile().root);

    assert_eq!(slots.delete_slot(&main), Err(SError::GameRunning));
    assert_eq!(slots.load_slot(&empty, true), Err(SError::GameRunning));
    assert_eq!(slots.create_backup(&main, None), Err(SError::GameRunning));
    assert_eq!(slots.load_backup(&main, &backup, Some(true)), Err(SError::GameRunning));
    assert_eq!(slots.rename_backup(&main, &backup, "x"), Err(SError::GameRunning));
    assert_eq!(slots.delete_backup(&main, &backup), Err(SError::GameRunning));
    assert_eq!(slots.capture_active_save(&main), Err(SError::GameRunning));
    assert_eq!(slots.adopt_live_save("New"), Err(SError::GameRunning));

    assert_eq!(snapshot(&slots.profile().root), before);

    lock.set(false);
    assert!(slots.delete_backup(&main, &backup).is_ok());
}

#[test]
fn test_create_backup_requires_loaded_slot() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    let idle = slots.create_slot("Idle").unwrap();
    write_live(&slots, b"A1");

    assert_eq!(
        slots.create_backup(&idle, None),
        Err(SError::NotLoaded("Idle".into()))
    );
    assert!(matches!(
        slots.create_backup("missing", None),
        Err(SError::NotFound(_))
    ));
}

#[test]
fn test_load_backup_asks_then_takes_auto_backup() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    write_live(&slots, b"A1");
    let main = slots.adopt_live_save("Main").unwrap();
    let backup = slots.create_backup(&main, None).unwrap();
    write_live(&slots, b"A2");

    let outcome = slots.load_backup(&main, &backup, None).unwrap();
    assert_eq!(
        outcome,
        Outcome::NeedsConfirmation(Confirmation::BackupCurrentFirst {
            slot: "Main".into()
        })
    );

    let report = slots
        .load_backup(&main, &backup, Some(true))
        .unwrap()
        .done()
        .unwrap();
    assert!(report.wrote_live);
    assert!(report.warnings.is_empty());
    assert_eq!(read_live(&slots).as_deref(), Some(&b"A1"[..]));

    let auto_id = report.implicit_backup.unwrap();
    let listed = slots.backups(&main, &BackupQuery::default()).unwrap();
    let auto = listed.iter().find(|b| b.id == auto_id).unwrap();
    assert!(auto.name.starts_with("Auto-Backup "));
    assert_eq!(auto.sequence, 2);
    assert_eq!(fs::read(&auto.path).map(|b| !b.is_empty()).ok(), Some(true));
}

#[test]
fn test_load_backup_into_unloaded_slot_skips_auto_backup() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    write_live(&slots, b"A1");
    let main = slots.adopt_live_save("Main").unwrap();
    let backup = slots.create_backup(&main, None).unwrap();

    let other = slots.create_slot("Other").unwrap();
    slots.load_slot(&other, true).unwrap();
    write_live(&slots, b"other progress");

    let report = slots
        .load_backup(&main, &backup, Some(true))
        .unwrap()
        .done()
        .unwrap();

    assert_eq!(report.implicit_backup, None);
    assert_eq!(report.warnings.len(), 1);
    assert!(!report.wrote_live);
    assert_eq!(read_live(&slots).as_deref(), Some(&b"other progress"[..]));
    assert_eq!(slots.slot(&main).unwrap().backup_count, 1);

    // The restored bytes arrive when Main is loaded
    slots.load_slot(&main, false).unwrap();
    assert_eq!(read_live(&slots).as_deref(), Some(&b"A1"[..]));
}

#[test]
fn test_backup_listing_search_and_sort() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    write_live(&slots, b"A1");
    let main = slots.adopt_live_save("Main").unwrap();
    for name in ["Before Boss", "after boss", "Camp"] {
        slots.create_backup(&main, Some(name)).unwrap();
    }
    assert!(matches!(
        slots.create_backup(&main, Some("Camp")),
        Err(SError::DuplicateName(_))
    ));

    let query = BackupQuery {
        search: Some("BOSS".into()),
        sort: BackupSort::Name,
    };
    let names: Vec<_> = slots
        .backups(&main, &query)
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(names, vec!["after boss", "Before Boss"]);

    let query = BackupQuery {
        search: None,
        sort: BackupSort::DateAsc,
    };
    let seqs: Vec<_> = slots
        .backups(&main, &query)
        .unwrap()
        .into_iter()
        .map(|b| b.sequence)
        .collect();
    assert_eq!(seqs, vec![1, 2, 3]);

    let newest = &slots.backups(&main, &BackupQuery::default()).unwrap()[0];
    assert_eq!(newest.name, "Camp");
}

#[test]
fn test_rename_backup_keeps_sequence() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    write_live(&slots, b"A1");
    let main = slots.adopt_live_save("Main").unwrap();
    let a = slots.create_backup(&main, None).unwrap();
    slots.create_backup(&main, Some("Taken")).unwrap();

    assert!(matches!(
        slots.rename_backup(&main, &a, "Taken"),
        Err(SError::DuplicateName(_))
    ));
    slots.rename_backup(&main, &a, "Renamed").unwrap();

    let listed = slots.backups(&main, &BackupQuery::default()).unwrap();
    let renamed = listed.iter().find(|b| b.id == a).unwrap();
    assert_eq!(renamed.name, "Renamed");
    assert_eq!(renamed.sequence, 1);
}

#[test]
fn test_corrupt_manifest_loads_empty_with_warning() {
    let (_tmp, root) = temp_root();
    let (mut slots, lock) = setup_profile(&root, "steam");
    slots.create_slot("Main").unwrap();

    fs::write(slots.profile().store.path(), "{ not json").unwrap();
    let slots = reopen(&slots, lock);

    assert!(slots.slots().is_empty());
    assert!(matches!(
        slots.load_warning(),
        Some(SError::CorruptManifest(_))
    ));
}

#[test]
fn test_corrupt_manifest_is_kept_aside_on_first_save() {
    let (_tmp, root) = temp_root();
    let (mut slots, lock) = setup_profile(&root, "steam");
    slots.create_slot("Main").unwrap();

    fs::write(slots.profile().store.path(), "{ not json").unwrap();
    let mut slots = reopen(&slots, lock.clone());
    slots.create_slot("Fresh").unwrap();

    assert!(slots.load_warning().is_none());
    let kept = slots.profile().store.corrupt_path();
    assert_eq!(fs::read_to_string(kept).unwrap(), "{ not json");

    let names: Vec<_> = reopen(&slots, lock).slots().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["Fresh"]);
}

#[test]
fn test_failed_manifest_write_changes_nothing() {
    let (_tmp, root) = temp_root();
    let (mut slots, lock) = setup_profile(&root, "steam");
    write_live(&slots, b"A1");
    let main = slots.adopt_live_save("Main").unwrap();
    let backup = slots.create_backup(&main, None).unwrap();

    // A directory where the manifest's temp file goes makes every save fail
    let blocker = slots.profile().store.path().with_extension("json.tmp");
    fs::create_dir_all(&blocker).unwrap();

    assert!(matches!(slots.create_slot("Other"), Err(SError::IOError(_))));
    assert!(matches!(slots.create_backup(&main, Some("extra")), Err(SError::IOError(_))));
    assert!(matches!(slots.rename_backup(&main, &backup, "renamed"), Err(SError::IOError(_))));

    let names: Vec<_> = slots.slots().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["Main"]);
    let backups = slots.backups(&main, &BackupQuery::default()).unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].id, backup);
    assert_eq!(backups[0].name, "Backup - 0001");

    fs::remove_dir(&blocker).unwrap();
    slots.rename_slot(&main, "Main 2").unwrap();
    let reopened = reopen(&slots, lock);
    assert_eq!(reopened.slots().len(), 1);
    // No stray slot directories or backup files were left behind
    assert!(reopened.reconcile().unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn test_delete_slot_keeps_entry_when_directory_stays() {
    use std::os::unix::fs::PermissionsExt;

    let (_tmp, root) = temp_root();
    let (mut slots, lock) = setup_profile(&root, "steam");
    write_live(&slots, b"A1");
    let main = slots.adopt_live_save("Main").unwrap();
    slots.create_backup(&main, None).unwrap();

    let parent = slots.profile().paths.slots.clone();
    fs::set_permissions(&parent, fs::Permissions::from_mode(0o555)).unwrap();
    // Permission bits do not bind a superuser; nothing to check then
    if fs::write(parent.join("writable"), "").is_ok() {
        fs::remove_file(parent.join("writable")).unwrap();
        fs::set_permissions(&parent, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = slots.delete_slot(&main);
    fs::set_permissions(&parent, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(result, Err(SError::IOError(_))));
    assert!(slots.slot_dir(&main).is_dir());
    assert_eq!(slots.slot(&main).unwrap().name, "Main");
    assert!(slots.is_loaded(&main));
    assert_eq!(reopen(&slots, lock).slot(&main).unwrap().name, "Main");
}

#[test]
fn test_missing_manifest_is_not_a_warning() {
    let (_tmp, root) = temp_root();
    let (slots, _lock) = setup_profile(&root, "steam");
    assert!(slots.load_warning().is_none());
    assert!(slots.slots().is_empty());
}

#[test]
fn test_reconcile_reports_drift_without_fixing_it() {
    let (_tmp, root) = temp_root();
    let (mut slots, _lock) = setup_profile(&root, "steam");

    write_live(&slots, b"A1");
    let main = slots.adopt_live_save("Main").unwrap();
    slots.create_backup(&main, Some("Gone")).unwrap();
    let empty = slots.create_slot("Empty").unwrap();

    let backups = slots.backups(&main, &BackupQuery::default()).unwrap();
    fs::remove_file(&backups[0].path).unwrap();
    fs::write(slots.slot_dir(&main).join("stray.zip"), "x").unwrap();
    fs::remove_dir_all(slots.slot_dir(&empty)).unwrap();
    fs::create_dir_all(slots.profile().paths.slots.join("orphan")).unwrap();

    let found = slots.reconcile().unwrap();

    assert!(found.contains(&Discrepancy::BackupFileMissing {
        slot: "Main".into(),
        backup: "Gone".into()
    }));
    assert!(found.contains(&Discrepancy::UntrackedBackupFile {
        slot: "Main".into(),
        file: "stray.zip".into()
    }));
    assert!(found.contains(&Discrepancy::SlotDirectoryMissing("Empty".into())));
    assert!(found.contains(&Discrepancy::UntrackedSlotDirectory("orphan".into())));
    assert_eq!(found.len(), 4);

    // Nothing was repaired
    assert_eq!(slots.slot(&main).unwrap().backup_count, 1);
    assert!(!slots.slot_dir(&empty).exists());
}
