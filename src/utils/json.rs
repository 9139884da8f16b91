use crate::models::error::SError;
use camino::Utf8Path;
use std::fs::{self, File};
use std::io::Write;

pub struct Json;

impl Json {
    /// Writes `data` through a sibling temp file and renames it over `path`,
    /// so readers see either the old document or the new one.
    pub fn write_atomic<T: serde::Serialize>(path: &Utf8Path, data: &T) -> Result<(), SError> {
        let body = serde_json::to_string_pretty(data)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("json.tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(body.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            SError::from(e)
        })
    }

    pub fn read<T: serde::de::DeserializeOwned>(path: &Utf8Path) -> Result<T, SError> {
        let s = fs::read_to_string(path)?;
        serde_json::from_str::<T>(&s).map_err(|e| SError::CorruptManifest(e.to_string()))
    }
}
