//! Prompt store API response models.
//!
//! These map to the prompt store's JSON payloads and are not part of the
//! public domain model.

use serde::Deserialize;

/// An entry from the prompt listing. Missing fields decode as empty.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptListItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// A single stored version of a prompt document.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptVersion {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub content: PromptContent,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptContent {
    #[serde(default)]
    pub sections: Vec<PromptSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptSection {
    pub id: String,
    #[serde(default)]
    pub content: String,
}

impl PromptVersion {
    /// Raw text of the section with the given id.
    pub fn section(&self, id: &str) -> Option<&str> {
        self.content
            .sections
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.content.as_str())
    }
}
