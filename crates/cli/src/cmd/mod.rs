//! CLI command implementations

pub mod autostart;
pub mod config;
pub mod run;
