use camino::{Utf8Path, Utf8PathBuf};

macro_rules! define_paths {
    ($name:ident { $($field:ident : $default:expr),* $(,)? }) => {
        #[derive(Clone, Debug)]
        pub struct $name {
            $(pub $field: Utf8PathBuf,)*
        }

        impl $name {
            pub fn to_absolute(mut self, base: &Utf8Path) -> Self {
                $(self.$field = base.join(self.$field);)*
                self
            }

            pub fn new(base: &Utf8Path) -> Self {
                Self::default().to_absolute(base)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $($field: $default.into(),)*
                }
            }
        }
    };
}

// Manager-owned layout inside a save profile root.
define_paths!(ProfilePaths {
    manager: "_manager_data",
    slots: "_manager_data/slots",
    manifest: "_manager_data/metadata.json",
});

// Layout of the game installation the engine cares about.
define_paths!(GamePaths {
    shipping_exe: "Game/Binaries/Win64/NFL1-Win64-Shipping.exe",
    paks_mods: "Game/Content/Paks/~mods",
    mods_manifest: "_manager_data/mods.json",
    originals: "_manager_data/originals",
});

pub const ACTIVE_SAVE_FILE: &str = "active_save.zip";
pub const BACKUP_EXTENSION: &str = "zip";
pub const DISABLED_SUFFIX: &str = ".disabled";

/// Path of a slot's directory under a profile.
pub fn slot_dir(paths: &ProfilePaths, slot_id: &str) -> Utf8PathBuf {
    paths.slots.join(slot_id)
}

pub fn backup_file(paths: &ProfilePaths, slot_id: &str, backup_id: &str) -> Utf8PathBuf {
    slot_dir(paths, slot_id).join(format!("{backup_id}.{BACKUP_EXTENSION}"))
}

pub fn active_save_file(paths: &ProfilePaths, slot_id: &str) -> Utf8PathBuf {
    slot_dir(paths, slot_id).join(ACTIVE_SAVE_FILE)
}

/// Appends the disabled suffix to a mod file path.
pub fn disabled_path(path: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{path}{DISABLED_SUFFIX}"))
}
