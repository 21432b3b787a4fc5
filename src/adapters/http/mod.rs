//! HTTP transport for the stage-gate service.

pub mod stages_http;

pub use stages_http::{error_response, ErrorResponse, StagesHttpServer, AGENT_ID_HEADER};
