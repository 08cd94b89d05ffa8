//! HTTP API module for the shortage engine.
//!
//! This module exposes the pipeline to the orchestration layer through a
//! single `POST /analyze` endpoint.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{AnalyzeRequest, DEFAULT_SCENARIO, ScenarioRequest};
pub use response::{AnalyzeResponse, ApiError, ApiErrorResponse, ScenarioResponse};
pub use state::AppState;
