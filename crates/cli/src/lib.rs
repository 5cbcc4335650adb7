//! appdrive CLI
//!
//! Command-line interface for running flows against an Appium endpoint,
//! validating flow files and checking the server.

pub mod commands;
pub mod config;
pub mod output;
