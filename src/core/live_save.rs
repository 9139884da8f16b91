use crate::models::error::SError;
use crate::utils::file::FileUtils;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Which files in a profile root make up the game's live save.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveSaveRules {
    pub suffixes: Vec<String>,
}

impl Default for LiveSaveRules {
    fn default() -> Self {
        Self {
            suffixes: vec!["gamedata.bin".into(), ".binbak".into()],
        }
    }
}

impl LiveSaveRules {
    pub fn matches(&self, file_name: &str) -> bool {
        self.suffixes.iter().any(|s| file_name.ends_with(s.as_str()))
    }

    /// Live save files directly under `dir`, sorted by name.
    pub fn live_files(&self, dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, SError> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in dir.read_dir_utf8()? {
            let entry = entry?;
            if entry.file_type()?.is_file() && self.matches(entry.file_name()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn has_live_save(&self, dir: &Utf8Path) -> bool {
        self.live_files(dir).map(|f| !f.is_empty()).unwrap_or(false)
    }

    /// Deletes the live save so the game starts fresh on next launch.
    pub fn clear(&self, dir: &Utf8Path) -> Result<usize, SError> {
        let files = self.live_files(dir)?;
        for f in &files {
            FileUtils::remove_file_if_exists(f)?;
        }
        debug!("cleared {} live save file(s) in {dir}", files.len());
        Ok(files.len())
    }

    /// Zips the live save into `archive`. The archive is written next to its
    /// final location and renamed into place once complete.
    pub fn pack(&self, dir: &Utf8Path, archive: &Utf8Path) -> Result<usize, SError> {
        let files = self.live_files(dir)?;
        if files.is_empty() {
            return Err(SError::NotFound(format!("live save in {dir}")));
        }

        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp = archive.with_extension("zip.tmp");

        let written = Self::write_zip(&files, &temp).and_then(|_| {
            fs::rename(&temp, archive)?;
            Ok(files.len())
        });
        if written.is_err() {
            let _ = FileUtils::remove_file_if_exists(&temp);
        }
        written
    }

    fn write_zip(files: &[Utf8PathBuf], target: &Utf8Path) -> Result<(), SError> {
        let mut zip = ZipWriter::new(File::create(target)?);
        let options = SimpleFileOptions::default();

        for f in files {
            let name = f
                .file_name()
                .ok_or_else(|| SError::ParseError(format!("Unable to get file name for {f}")))?;
            zip.start_file(name, options)?;
            io::copy(&mut File::open(f)?, &mut zip)?;
        }

        zip.finish()?.sync_all()?;
        Ok(())
    }

    /// Replaces the live save in `dir` with the contents of `archive`.
    ///
    /// Entries are extracted into `staging` first; the existing live save is
    /// only removed once the archive has been read completely.
    pub fn unpack(
        &self,
        archive: &Utf8Path,
        dir: &Utf8Path,
        staging: &Utf8Path,
    ) -> Result<usize, SError> {
        if !archive.is_file() {
            return Err(SError::NotFound(archive.to_string()));
        }

        FileUtils::remove_dir_if_exists(staging)?;
        fs::create_dir_all(staging)?;

        let result = Self::extract_flat(archive, staging).and_then(|names| {
            self.clear(dir)?;
            fs::create_dir_all(dir)?;
            for name in &names {
                fs::rename(staging.join(name), dir.join(name))?;
            }
            Ok(names.len())
        });

        let _ = FileUtils::remove_dir_if_exists(staging);
        result
    }

    fn extract_flat(archive: &Utf8Path, staging: &Utf8Path) -> Result<Vec<String>, SError> {
        let mut zip = ZipArchive::new(File::open(archive)?)?;
        let mut names = Vec::with_capacity(zip.len());

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }

            // Save blobs are flat; anything with a directory component was not
            // written by `pack`.
            let name = entry.name().replace('\\', "/");
            if name.contains('/') || name == ".." || name.is_empty() {
                return Err(SError::ArchiveError(format!(
                    "unexpected entry '{name}' in {archive}"
                )));
            }

            let mut out = File::create(staging.join(&name))?;
            io::copy(&mut entry, &mut out)?;
            out.sync_all()?;
            names.push(name);
        }

        Ok(names)
    }
}
