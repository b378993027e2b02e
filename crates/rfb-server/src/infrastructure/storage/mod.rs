//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration file from
//! `$RFB_SERVER_CONFIG` or the platform config directory, and supplies
//! defaults when the file does not exist yet.

pub mod config;
