use crate::models::error::SError;
use crate::models::outcome::{FlaggedEntry, MalformedReason};
use crate::models::paths::GamePaths;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use zip::ZipArchive;

/// What a well-formed mod archive is expected to look like relative to the
/// game root. Used only to warn; nothing here blocks an install.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModLayout {
    /// Top-level directories a mod may write into.
    pub known_roots: Vec<String>,
    /// Directories that are created on demand and always accepted.
    pub drop_in_dirs: Vec<Utf8PathBuf>,
}

impl Default for ModLayout {
    fn default() -> Self {
        Self {
            known_roots: vec!["Game".into()],
            drop_in_dirs: vec![GamePaths::default().paks_mods],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub raw_name: String,
    /// `None` when the entry would land outside the destination.
    pub path: Option<Utf8PathBuf>,
    pub is_dir: bool,
}

/// Normalizes an archive entry name to a relative path, rejecting absolute
/// paths, drive prefixes and parent-directory hops.
pub fn safe_relative(raw: &str) -> Option<Utf8PathBuf> {
    let normalized = raw.replace('\\', "/");
    let path = Utf8Path::new(normalized.trim_end_matches('/'));

    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Normal(part) if !part.contains(':') => out.push(part),
            Utf8Component::CurDir => {}
            _ => return None,
        }
    }
    (!out.as_str().is_empty()).then_some(out)
}

pub fn list_entries(archive: &Utf8Path) -> Result<Vec<ArchiveEntry>, SError> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let mut entries = Vec::with_capacity(zip.len());

    for i in 0..zip.len() {
        let file = zip.by_index(i)?;
        let raw_name = file.name().to_string();
        let path = file
            .enclosed_name()
            .and_then(|_| safe_relative(&raw_name));
        entries.push(ArchiveEntry {
            raw_name,
            path,
            is_dir: file.is_dir(),
        });
    }

    Ok(entries)
}

/// Flags entries that do not fit the expected game layout.
pub fn inspect(entries: &[ArchiveEntry], game_root: &Utf8Path, layout: &ModLayout) -> Vec<FlaggedEntry> {
    entries
        .iter()
        .filter(|e| !e.is_dir)
        .filter_map(|e| {
            let reason = match &e.path {
                None => MalformedReason::EscapesRoot,
                Some(path) => layout_violation(path, game_root, layout)?,
            };
            Some(FlaggedEntry {
                path: e.raw_name.clone(),
                reason,
            })
        })
        .collect()
}

fn layout_violation(
    path: &Utf8Path,
    game_root: &Utf8Path,
    layout: &ModLayout,
) -> Option<MalformedReason> {
    let top = path.components().next()?.as_str();
    if !layout.known_roots.iter().any(|r| r.eq_ignore_ascii_case(top)) {
        return Some(MalformedReason::UnknownTopLevel);
    }

    let lowered = path.as_str().to_lowercase();
    let in_drop_in = layout
        .drop_in_dirs
        .iter()
        .any(|d| lowered.starts_with(&format!("{}/", d.as_str().to_lowercase())));
    if in_drop_in {
        return None;
    }

    let destination = path.parent().map(|p| game_root.join(p))?;
    (!destination.is_dir()).then_some(MalformedReason::MissingDestination)
}

/// What an extraction has put on disk so far, relative to the destination.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    pub written: Vec<Utf8PathBuf>,
    /// Written paths that held a file before; the old file sits at the same
    /// relative path under the originals directory.
    pub replaced: Vec<Utf8PathBuf>,
    /// Directories that did not exist before, parents first.
    pub created_dirs: Vec<Utf8PathBuf>,
    /// Entries skipped as unsafe.
    pub skipped: Vec<String>,
}

/// Extracts every safe file entry of `archive` under `destination`.
///
/// `out` is updated as soon as each path exists on disk, so a caller can undo
/// the work if a later entry fails. A file that already exists is copied under
/// `originals` before it is overwritten.
pub fn extract_tracked(
    archive: &Utf8Path,
    destination: &Utf8Path,
    originals: &Utf8Path,
    out: &mut Extraction,
) -> Result<(), SError> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;

    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        let Some(rel) = file.enclosed_name().and_then(|_| safe_relative(file.name())) else {
            out.skipped.push(file.name().to_string());
            continue;
        };

        let output_path = destination.join(&rel);
        if let Some(parent) = rel.parent() {
            create_dirs_tracked(destination, parent, &mut out.created_dirs)?;
        }

        if output_path.is_file() && !out.written.contains(&rel) {
            let kept = originals.join(&rel);
            if let Some(parent) = kept.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&output_path, &kept)?;
            out.replaced.push(rel.clone());
        }

        let mut outfile = File::create(&output_path)?;
        if !out.written.contains(&rel) {
            out.written.push(rel);
        }
        io::copy(&mut file, &mut outfile)?;

        // Preserve permissions on Unix; matters for executables shipped in mods.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                let _ = fs::set_permissions(&output_path, fs::Permissions::from_mode(mode));
            }
        }
    }

    Ok(())
}

/// Creates `rel` under `root`, recording each directory that was missing.
fn create_dirs_tracked(root: &Utf8Path, rel: &Utf8Path, created: &mut Vec<Utf8PathBuf>) -> Result<(), SError> {
    let mut current = Utf8PathBuf::new();
    for component in rel.components() {
        current.push(component);
        let full = root.join(&current);
        if !full.is_dir() {
            fs::create_dir(&full)?;
            created.push(current.clone());
        }
    }
    Ok(())
}
