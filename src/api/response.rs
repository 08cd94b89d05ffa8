//! Response types for the shortage engine API.
//!
//! This module defines the success payload of `/analyze`, the error response
//! structures, and the mapping from [`EngineError`] to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{ConsistencyReport, GuardWarning, SlotMatrix};
use crate::pipeline::{DimensionBreakdown, PipelineOutput};

/// Response body for a successful `/analyze` call.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    /// Correlation id logged with every line for this request.
    pub correlation_id: Uuid,
    /// One entry per scenario, in request order.
    pub scenarios: Vec<ScenarioResponse>,
}

/// The matrices and diagnostics of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResponse {
    /// Scenario name.
    pub name: String,
    /// Slot width in minutes.
    pub slot_minutes: u32,
    /// Output date columns after alignment and truncation.
    pub columns: Vec<NaiveDate>,
    /// Aligned actual staffing.
    pub actual: SlotMatrix,
    /// Aligned need baseline.
    pub need: SlotMatrix,
    /// Aligned upper ceiling.
    pub upper: SlotMatrix,
    /// Shortage after guards.
    pub shortage: SlotMatrix,
    /// Excess above the upper ceiling.
    pub excess: SlotMatrix,
    /// Total shortage in hour-equivalents.
    pub shortage_hours: f64,
    /// Total excess in hour-equivalents.
    pub excess_hours: f64,
    /// Role breakdown.
    pub by_role: DimensionBreakdown,
    /// Employment-category breakdown.
    pub by_employment: DimensionBreakdown,
    /// Reconciliation reports.
    pub consistency: Vec<ConsistencyReport>,
    /// Guard diagnostics from every stage.
    pub warnings: Vec<GuardWarning>,
}

impl From<PipelineOutput> for ScenarioResponse {
    fn from(output: PipelineOutput) -> Self {
        let result = output.shortage;
        ScenarioResponse {
            name: output.scenario,
            slot_minutes: output.config.slots.slot_minutes,
            columns: result.shortage.columns().to_vec(),
            actual: result.actual,
            need: result.need,
            upper: result.upper,
            shortage: result.shortage,
            excess: result.excess,
            shortage_hours: result.shortage_hours,
            excess_hours: result.excess_hours,
            by_role: output.by_role,
            by_employment: output.by_employment,
            consistency: output.consistency,
            warnings: output.report.warnings,
        }
    }
}

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// The scenario that failed, for errors raised while running scenarios.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            scenario: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
            scenario: None,
        }
    }

    /// Tags the error with the scenario that raised it.
    pub fn for_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates an invalid configuration error response.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new("INVALID_CONFIG", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }
}

/// API error with HTTP status code.
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let message = error.to_string();
        match error {
            EngineError::InvalidConfig { field, .. } => ApiErrorResponse {
                status: StatusCode::BAD_REQUEST,
                error: ApiError::with_details(
                    "INVALID_CONFIG",
                    message,
                    format!("Check the value of '{}'", field),
                ),
            },
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
                ApiErrorResponse {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: ApiError::with_details("CONFIG_ERROR", "Configuration error", message),
                }
            }
            EngineError::RecordsNotFound { .. } | EngineError::RecordsParseError { .. } => {
                ApiErrorResponse {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: ApiError::with_details("RECORDS_ERROR", "Presence records unavailable", message),
                }
            }
            EngineError::ConsistencyCheckFailed { dimension, .. } => ApiErrorResponse {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                error: ApiError::with_details(
                    "CONSISTENCY_CHECK_FAILED",
                    message,
                    format!(
                        "Allocation of '{}' did not reconcile and strict mode is enabled",
                        dimension
                    ),
                ),
            },
            EngineError::ScenarioCancelled { .. } => ApiErrorResponse {
                status: StatusCode::CONFLICT,
                error: ApiError::new("SCENARIO_CANCELLED", message),
            },
            EngineError::ArtifactWrite { .. } => ApiErrorResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::with_details("ARTIFACT_ERROR", "Failed to write artifacts", message),
            },
            EngineError::MatrixShapeMismatch { .. } | EngineError::CalculationError { .. } => {
                ApiErrorResponse {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: ApiError::with_details("CALCULATION_ERROR", "Calculation failed", message),
                }
            }
        }
    }
}
