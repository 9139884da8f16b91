use crate::models::error::SError;
use camino::{Utf8Path, Utf8PathBuf};
use std::io::ErrorKind;
use walkdir::WalkDir;

pub struct FileUtils;

impl FileUtils {
    /// Recursively copies a directory tree from source to destination.
    /// Creates all necessary directories and overwrites existing files.
    /// Returns the number of files copied.
    pub fn copy_recursive(src: &Utf8Path, dst: &Utf8Path) -> Result<usize, SError> {
        std::fs::create_dir_all(dst)?;

        let mut copied = 0;
        for entry in WalkDir::new(src) {
            let entry = entry?;
            let src_path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
                SError::ParseError(format!("Invalid UTF-8 path: {:?}", entry.path()))
            })?;

            let dst_path = dst.join(src_path.strip_prefix(src)?);

            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&dst_path)?;
                continue;
            }

            if let Some(parent) = dst_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(src_path, &dst_path)?;
            copied += 1;
        }

        Ok(copied)
    }

    /// Copies a single file by writing a sibling temp file and renaming it
    /// over `dst`.
    pub fn copy_atomic(src: &Utf8Path, dst: &Utf8Path) -> Result<(), SError> {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let temp = Utf8PathBuf::from(format!("{dst}.tmp"));
        let copied = std::fs::copy(src, &temp).and_then(|_| std::fs::rename(&temp, dst));
        if let Err(e) = copied {
            let _ = Self::remove_file_if_exists(&temp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Removes a file. A file that is already gone counts as removed.
    pub fn remove_file_if_exists(path: &Utf8Path) -> std::io::Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn remove_dir_if_exists(path: &Utf8Path) -> std::io::Result<bool> {
        match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn is_dir_empty(path: &Utf8Path) -> bool {
        std::fs::read_dir(path)
            .map(|mut i| i.next().is_none())
            .unwrap_or(false)
    }

    /// Removes the directories in `created` (relative to `root`) that are
    /// empty, deepest first. Anything that still has contents is kept.
    pub fn remove_created_dirs(root: &Utf8Path, created: &[Utf8PathBuf]) {
        let mut dirs: Vec<&Utf8PathBuf> = created.iter().collect();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            let full = root.join(dir);
            if Self::is_dir_empty(&full) {
                let _ = std::fs::remove_dir(&full);
            }
        }
    }
}
