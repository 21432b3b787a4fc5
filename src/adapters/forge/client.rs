//! HTTP client for the prompt document store with a TTL cache.

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use super::models::{PromptListItem, PromptVersion};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{parse_capabilities, ForgeConfig, Persona, PERSONA_TYPE};
use crate::domain::ports::PersonaDirectory;

/// Section holding a persona's comma-separated capability list.
const CAPABILITIES_SECTION: &str = "capabilities";

/// The whole persona list is cached under a single key.
const PERSONAS_KEY: &str = "personas";

/// Persona directory backed by the prompt store HTTP API.
///
/// A fetched persona list is served from cache until its TTL expires.
/// Concurrent misses share a single fetch.
#[derive(Clone)]
pub struct ForgeClient {
    http: Client,
    base_url: String,
    max_scan_version: u32,
    cache: Cache<&'static str, Arc<Vec<Persona>>>,
}

impl ForgeClient {
    /// Build a client from configuration. Fails when no base URL is set.
    pub fn from_config(config: &ForgeConfig) -> DomainResult<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| DomainError::Configuration("forge.base_url is not set".to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(
            http,
            base_url,
            Duration::from_secs(config.cache_ttl_secs),
            config.max_scan_version,
        ))
    }

    pub fn with_client(http: Client, base_url: &str, ttl: Duration, max_scan_version: u32) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_scan_version,
            cache,
        }
    }

    /// Drop the cached persona list.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }

    async fn fetch_personas(&self) -> DomainResult<Vec<Persona>> {
        let url = format!("{}/api/v1/prompts", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DomainError::Upstream(format!("prompt listing request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DomainError::Upstream(format!("prompt listing read failed: {e}")))?;
        if status.is_client_error() || status.is_server_error() {
            return Err(DomainError::Upstream(format!("prompt store returned {status}: {body}")));
        }

        let items: Vec<PromptListItem> = serde_json::from_str(&body)
            .map_err(|e| DomainError::Upstream(format!("prompt listing parse failed: {e}")))?;

        let mut personas = Vec::new();
        for item in items.into_iter().filter(|i| i.kind == PERSONA_TYPE) {
            let capabilities = self.fetch_capabilities(&item.slug).await;
            personas.push(Persona {
                id: item.id,
                slug: item.slug,
                name: item.name,
                kind: item.kind,
                capabilities,
            });
        }

        tracing::debug!(count = personas.len(), "fetched personas");
        Ok(personas)
    }

    /// Scan versions newest-first for a capabilities section.
    ///
    /// Any failure on a version moves on to the next one; no match yields
    /// an empty list.
    async fn fetch_capabilities(&self, slug: &str) -> Vec<String> {
        for version in (1..=self.max_scan_version).rev() {
            let url = format!("{}/api/v1/prompts/{}/versions/{}", self.base_url, slug, version);
            let resp = match self.http.get(&url).send().await {
                Ok(resp) if resp.status() == StatusCode::OK => resp,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(slug, version, error = %e, "version fetch failed");
                    continue;
                }
            };

            let Ok(doc) = resp.json::<PromptVersion>().await else {
                continue;
            };
            if let Some(section) = doc.section(CAPABILITIES_SECTION) {
                return parse_capabilities(section);
            }
        }
        Vec::new()
    }
}

#[async_trait]
impl PersonaDirectory for ForgeClient {
    async fn list_personas(&self) -> DomainResult<Vec<Persona>> {
        let personas = self
            .cache
            .try_get_with(PERSONAS_KEY, async { self.fetch_personas().await.map(Arc::new) })
            .await
            .map_err(|e: Arc<DomainError>| match e.as_ref() {
                DomainError::Upstream(msg) => DomainError::Upstream(msg.clone()),
                other => DomainError::Upstream(other.to_string()),
            })?;

        Ok(personas.as_ref().clone())
    }
}
