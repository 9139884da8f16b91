use crate::core::archive::ModLayout;
use crate::core::live_save::LiveSaveRules;
use crate::models::error::SError;
use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

const APP_NAME: &str = "save_keeper";
const CONFIG_NAME: &str = "settings";

/// Persistent engine settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub version: u8,
    /// Root of the game installation; mods are installed relative to it.
    pub game_root: Option<Utf8PathBuf>,
    /// Candidate save profile roots keyed by profile id.
    pub profiles: BTreeMap<String, Utf8PathBuf>,
    /// Name of the shipping executable watched by the process guard.
    pub process_name: String,
    pub poll_interval_secs: u64,
    pub live_save: LiveSaveRules,
    /// Top-level directories a well-formed mod archive may write into.
    pub known_mod_roots: Vec<String>,
    pub log_dir: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let log_dir = ProjectDirs::from("com", "martes", APP_NAME)
            .map(|dirs| dirs.data_local_dir().join("logs"))
            .or_else(|| {
                std::env::current_exe()
                    .ok()
                    .and_then(|exe_path| exe_path.parent().map(|p| p.join("logs")))
            })
            .unwrap_or_else(|| PathBuf::from("logs"));

        Self {
            version: 0,
            game_root: None,
            profiles: BTreeMap::new(),
            process_name: "NFL1-Win64-Shipping.exe".into(),
            poll_interval_secs: 3,
            live_save: LiveSaveRules::default(),
            known_mod_roots: ModLayout::default().known_roots,
            log_dir,
        }
    }
}

impl EngineSettings {
    pub fn load() -> Result<EngineSettings, SError> {
        confy::load(APP_NAME, CONFIG_NAME).map_err(config_error)
    }

    pub fn save(&self) -> Result<(), SError> {
        confy::store(APP_NAME, CONFIG_NAME, self).map_err(config_error)
    }

    /// Loads settings from an explicit file instead of the per-user location.
    pub fn load_path(path: impl Into<PathBuf>) -> Result<EngineSettings, SError> {
        confy::load_path(path.into()).map_err(config_error)
    }

    pub fn save_path(&self, path: impl Into<PathBuf>) -> Result<(), SError> {
        confy::store_path(path.into(), self).map_err(config_error)
    }

    pub fn mod_layout(&self) -> ModLayout {
        ModLayout {
            known_roots: self.known_mod_roots.clone(),
            ..ModLayout::default()
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

fn config_error(e: confy::ConfyError) -> SError {
    SError::ParseError(format!("settings: {e}"))
}
