pub mod error;
pub mod manifest;
pub mod mod_dto;
pub mod outcome;
pub mod paths;
pub mod slot_dto;
