use crate::core::process_guard::ensure_unlocked;
use crate::core::slot_manager::SlotManager;
use crate::models::error::SError;
use crate::utils::file::FileUtils;
use crate::utils::id::new_id;
use tracing::{error, info, instrument};

/// Copies a slot with all its backups from one profile to another and returns
/// the slot's id in the destination.
///
/// The slot keeps its id unless the destination already uses it. The copy
/// arrives unloaded; the destination's live save is not touched.
#[instrument(skip(source, dest), fields(from = %source.profile().id, to = %dest.profile().id))]
pub fn copy_slot(source: &SlotManager, slot_id: &str, dest: &mut SlotManager) -> Result<String, SError> {
    ensure_unlocked(source.lock().as_ref())?;

    let record = source.slot_record(slot_id)?.clone();
    if dest.name_taken(&record.name, None) {
        return Err(SError::DuplicateName(record.name));
    }

    let dest_id = if dest.manifest().slots.contains_key(slot_id) {
        new_id()
    } else {
        slot_id.to_owned()
    };

    let src_dir = source.slot_dir(slot_id);
    let dst_dir = dest.slot_dir(&dest_id);
    if !src_dir.is_dir() {
        return Err(SError::NotFound(src_dir.to_string()));
    }

    let copied = FileUtils::copy_recursive(&src_dir, &dst_dir).and_then(|n| {
        dest.attach_copied_slot(&dest_id, record)?;
        Ok(n)
    });

    match copied {
        Ok(n) => {
            info!("copied slot {slot_id} as {dest_id} ({n} file(s))");
            Ok(dest_id)
        }
        Err(e) => {
            error!("copy of slot {slot_id} failed, removing {dst_dir}: {e}");
            let _ = FileUtils::remove_dir_if_exists(&dst_dir);
            Err(e)
        }
    }
}
