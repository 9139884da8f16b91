pub mod config;
pub mod core;
pub mod logging;
pub mod models;
pub mod utils;

pub use crate::config::EngineSettings;
pub use crate::core::engine::{validate_game_root, Engine, GameRootReport};
pub use crate::models::error::SError;
