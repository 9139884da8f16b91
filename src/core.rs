pub mod archive;
pub mod cross_copy;
pub mod engine;
pub mod live_save;
pub mod manifest_store;
pub mod mod_manager;
pub mod process_guard;
pub mod profile;
pub mod slot_manager;
