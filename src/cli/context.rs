//! Wiring shared by every CLI command.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::adapters::forge::ForgeClient;
use crate::adapters::sqlite::{initialize_database, SqliteBacklogRepository};
use crate::adapters::webhook::WebhookNotifier;
use crate::domain::models::{Config, NotifierConfig};
use crate::domain::ports::{PersonaDirectory, TransitionNotifier};
use crate::services::{EventBus, StageEventQueue, StageGateService, StageResolver};

/// How long shutdown waits for queued events to be delivered.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for a single webhook delivery.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

pub type CliStageService = StageGateService<SqliteBacklogRepository>;

/// Services assembled from configuration.
pub struct AppContext {
    pub service: CliStageService,
    /// Present only when a prompt store base URL is configured
    pub personas: Option<Arc<dyn PersonaDirectory>>,
    dispatcher: JoinHandle<()>,
}

impl AppContext {
    pub async fn build(config: &Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .context("Failed to initialize database")?;

        let notifier = build_notifier(&config.notifier)?;
        let (queue, dispatcher) = StageEventQueue::start(notifier, config.notifier.queue_capacity);

        let repository = Arc::new(SqliteBacklogRepository::new(pool));
        let service = StageGateService::new(repository, StageResolver::new(config.stages.clone()), queue);

        let personas = Self::persona_directory(config)?;

        Ok(Self {
            service,
            personas,
            dispatcher,
        })
    }

    /// The persona directory, or an error naming the missing setting.
    pub fn require_personas(&self) -> Result<Arc<dyn PersonaDirectory>> {
        self.personas
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Persona discovery is not configured. Set forge.base_url"))
    }

    /// Split into the service and its event dispatcher, for long-running owners.
    pub fn into_parts(self) -> (CliStageService, Option<Arc<dyn PersonaDirectory>>, JoinHandle<()>) {
        (self.service, self.personas, self.dispatcher)
    }

    /// Drop the service and wait for pending events to drain.
    pub async fn shutdown(self) {
        drop(self.service);
        wait_for_delivery(self.dispatcher).await;
    }

    fn persona_directory(config: &Config) -> Result<Option<Arc<dyn PersonaDirectory>>> {
        if config.forge.base_url.is_none() {
            return Ok(None);
        }
        let client = ForgeClient::from_config(&config.forge).context("Failed to build prompt store client")?;
        Ok(Some(Arc::new(client)))
    }
}

/// The webhook notifier when configured, otherwise an unobserved in-process bus.
fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn TransitionNotifier>> {
    match config.webhook_url.as_deref() {
        Some(url) => {
            tracing::debug!(url, "delivering stage events to webhook");
            let notifier = WebhookNotifier::new(url, WEBHOOK_TIMEOUT).context("Failed to build webhook notifier")?;
            Ok(Arc::new(notifier))
        }
        None => {
            tracing::warn!("no notifier configured, stage events are not delivered");
            Ok(Arc::new(EventBus::default()))
        }
    }
}

/// Await the dispatcher once every queue sender has been dropped.
pub async fn wait_for_delivery(dispatcher: JoinHandle<()>) {
    if tokio::time::timeout(DRAIN_TIMEOUT, dispatcher).await.is_err() {
        tracing::warn!("timed out waiting for stage events to be delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logs_while(config: &NotifierConfig) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || build_notifier(config).unwrap());
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_missing_webhook_warns_that_events_are_not_delivered() {
        let logs = logs_while(&NotifierConfig::default());
        assert!(logs.contains("WARN"));
        assert!(logs.contains("no notifier configured, stage events are not delivered"));
    }

    #[test]
    fn test_configured_webhook_does_not_warn() {
        let config = NotifierConfig {
            webhook_url: Some("http://127.0.0.1:9/hooks/stages".to_string()),
            ..NotifierConfig::default()
        };
        let logs = logs_while(&config);
        assert!(!logs.contains("WARN"));
        assert!(logs.contains("delivering stage events to webhook"));
    }
}
