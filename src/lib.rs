//! Command-line tooling around `apdu-lib`: shared logging setup, config
//! loading and transcript analysis for the `apdu-rs` and `apdu-trace` binaries.

pub mod config;
pub mod logging;
pub mod transcript;
