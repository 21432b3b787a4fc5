//! CLI command implementations.

pub mod item;
pub mod persona;
pub mod serve;
pub mod stage;

use anyhow::{Context, Result};
use uuid::Uuid;

/// Parse an item ID given on the command line.
pub(crate) fn parse_item_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).with_context(|| format!("Invalid item ID: {id}"))
}
