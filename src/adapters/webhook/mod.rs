//! Webhook delivery of stage transition events.

pub mod notifier;

pub use notifier::WebhookNotifier;
