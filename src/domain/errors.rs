//! Domain errors for the stage-gate system.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the stage-gate system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Backlog item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Stages not initialized for item {0}")]
    NotInitialized(Uuid),

    #[error("Stages already initialized for item {0}")]
    AlreadyInitialized(Uuid),

    #[error("Unmet gate criteria for stage '{stage}': {}", .unmet.join(", "))]
    GateUnmet { stage: String, unmet: Vec<String> },

    #[error("Velocity check failed: stage advanced within {window_secs}s with no attested gate satisfactions")]
    VelocityCheck { window_secs: u64 },

    #[error("Already at final stage '{stage}'")]
    TerminalStage { stage: String },

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),
}

impl DomainError {
    /// Stable machine-readable code for transport error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ItemNotFound(_) => "NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::NotInitialized(_) => "STAGES_NOT_INITIALIZED",
            Self::AlreadyInitialized(_) => "STAGES_ALREADY_INITIALIZED",
            Self::GateUnmet { .. } => "GATE_UNMET",
            Self::VelocityCheck { .. } => "VELOCITY_CHECK_FAILED",
            Self::TerminalStage { .. } => "FINAL_STAGE",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::Upstream(_) => "UPSTREAM_ERROR",
        }
    }

    /// True for outcomes that callers hit during normal operation
    /// (conflicts and rejected requests rather than faults).
    pub fn is_expected(&self) -> bool {
        !matches!(
            self,
            Self::Configuration(_) | Self::DatabaseError(_) | Self::SerializationError(_) | Self::Upstream(_)
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
