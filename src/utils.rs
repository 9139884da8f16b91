pub mod file;
pub mod id;
pub mod json;
pub mod process;
pub mod time;
