//! CLI Commands

pub mod config;
pub mod list;
pub mod run;
pub mod status;
pub mod validate;
