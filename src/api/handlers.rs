//! HTTP request handlers for the shortage engine API.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::ScenarioRunner;

use super::request::AnalyzeRequest;
use super::response::{AnalyzeResponse, ApiError, ApiErrorResponse, ScenarioResponse};
use super::state::AppState;

/// Creates the API router with all endpoints.
///
/// `POST /analyze` answers with every scenario's output, or with the error of
/// the first failing scenario tagged with its name.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/analyze", post(analyze_handler))
        .with_state(state)
}

/// Handler for POST /analyze.
///
/// Runs every requested scenario concurrently and returns their matrices.
///
/// The response is all-or-nothing. Scenarios run in isolation, so one
/// failure never stops or alters another, but if any scenario fails the
/// response is the error of the first failing scenario in request order,
/// tagged with that scenario's name, and no matrices are returned. Clients
/// that need partial results send one scenario per request.
async fn analyze_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Processing analyze request");

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let error = rejection_error(rejection, correlation_id);
            return json_response(StatusCode::BAD_REQUEST, error);
        }
    };

    let scenarios = request.resolve_scenarios(state.base_config());
    let mut runner = ScenarioRunner::new(request.records);
    for scenario in scenarios {
        if let Err(err) = runner.add(scenario) {
            warn!(correlation_id = %correlation_id, error = %err, "Rejected scenario");
            return error_response(err.into());
        }
    }

    let start_time = Instant::now();
    let scenario_count = runner.len();
    let mut responses = Vec::with_capacity(scenario_count);
    for outcome in runner.run_all().await {
        match outcome.result {
            Ok(output) => responses.push(ScenarioResponse::from(output)),
            Err(err) => {
                warn!(
                    correlation_id = %correlation_id,
                    scenario = %outcome.scenario,
                    completed = responses.len(),
                    error = %err,
                    "Analysis failed"
                );
                let mut error = ApiErrorResponse::from(err);
                error.error = error.error.for_scenario(outcome.scenario);
                return error_response(error);
            }
        }
    }

    info!(
        correlation_id = %correlation_id,
        scenarios = scenario_count,
        shortage_hours = responses.iter().map(|r| r.shortage_hours).sum::<f64>(),
        duration_us = start_time.elapsed().as_micros(),
        "Analysis completed successfully"
    );

    json_response(
        StatusCode::OK,
        AnalyzeResponse {
            correlation_id,
            scenarios: responses,
        },
    )
}

/// Maps a JSON extraction failure to an API error.
fn rejection_error(rejection: JsonRejection, correlation_id: Uuid) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(correlation_id = %correlation_id, error = %body_text, "JSON data error");
            if body_text.contains("Invalid configuration") || body_text.contains("unknown field") {
                ApiError::invalid_config(body_text)
            } else if body_text.contains("missing field") {
                ApiError::validation_error(body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(correlation_id = %correlation_id, error = %err, "JSON syntax error");
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    }
}

fn error_response(error: ApiErrorResponse) -> Response {
    json_response(error.status, error.error)
}

fn json_response<T: serde::Serialize>(status: StatusCode, body: T) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Json(body),
    )
        .into_response()
}
