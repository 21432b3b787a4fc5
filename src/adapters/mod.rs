//! Infrastructure adapters for external systems.

pub mod forge;
pub mod http;
pub mod sqlite;
pub mod webhook;
