//! CLI command implementations.

pub mod config;
pub mod doctor;
pub mod policy;
pub mod secrets;
pub mod vault;
