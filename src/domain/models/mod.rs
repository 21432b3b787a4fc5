pub mod backlog_item;
pub mod config;
pub mod event;
pub mod gate;
pub mod persona;
pub mod stage_policy;

pub use backlog_item::{normalize_tier, BacklogItem, DEFAULT_TIER, ECONOMY_TIER};
pub use config::{
    Config, DatabaseConfig, ForgeConfig, LogFormat, LoggingConfig, NotifierConfig,
    RotationPolicy, ServerConfig,
};
pub use event::StageEvent;
pub use gate::{GateCriterion, GateStatus, ALL_CRITERIA};
pub use persona::{parse_capabilities, Persona, PERSONA_TYPE};
pub use stage_policy::{PlannedStage, StagePlan, StagePolicy};
