//! Process-level concerns shared by the CLI and the HTTP server.

pub mod config;
pub mod logging;
