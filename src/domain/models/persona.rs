//! Persona records discovered from the prompt document store.

use serde::{Deserialize, Serialize};

/// Document type that marks a prompt as a persona.
pub const PERSONA_TYPE: &str = "persona";

/// An agent persona and the capabilities it advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl Persona {
    /// Case-insensitive capability match.
    pub fn has_capability(&self, scope: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(scope))
    }
}

/// Parse a comma-separated capability list into trimmed, lowercased entries.
pub fn parse_capabilities(content: &str) -> Vec<String> {
    content
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_lowercase)
        .collect()
}
