//! Transition notifier that POSTs events to an HTTP endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::domain::models::StageEvent;
use crate::domain::ports::{NotifyError, TransitionNotifier};

/// JSON body delivered to the webhook.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    event: &'a StageEvent,
}

/// Posts `{subject, event}` to a fixed URL. Any non-2xx response is a failure.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::PublishFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, url))
    }

    pub fn with_client(http: Client, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }
}

#[async_trait]
impl TransitionNotifier for WebhookNotifier {
    async fn publish(&self, subject: &str, event: &StageEvent) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(&WebhookPayload { subject, event })
            .map_err(|e| NotifyError::SerializationError(e.to_string()))?;

        let resp = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError::PublishFailed(format!("webhook request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(NotifyError::PublishFailed(format!("webhook returned {status}: {text}")));
        }

        Ok(())
    }
}
