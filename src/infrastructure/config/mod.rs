//! Layered configuration.
//!
//! Defaults, `.stagegate/config.yaml`, `.stagegate/local.yaml` and
//! `STAGEGATE_*` environment variables are merged with figment and then
//! validated before anything is wired up.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR, ENV_PREFIX};
