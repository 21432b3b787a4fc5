//! Persona directory port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Persona;

/// Read-only lookup of agent personas and their capabilities.
#[async_trait]
pub trait PersonaDirectory: Send + Sync {
    /// List every known persona.
    async fn list_personas(&self) -> DomainResult<Vec<Persona>>;

    /// Personas advertising a capability (case-insensitive).
    async fn agents_by_capability(&self, scope: &str) -> DomainResult<Vec<Persona>> {
        let all = self.list_personas().await?;
        Ok(all.into_iter().filter(|p| p.has_capability(scope)).collect())
    }
}
