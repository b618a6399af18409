// HTTP route handlers for the run-code API

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use runcode_common::types::{RunCodeRequest, TestResult};
use runcode_engine::evaluator;
use runcode_engine::resolver::is_identifier;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::metrics;
use crate::AppState;

const MISSING_FIELDS: &str = "Code and test cases are required";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageInfo {
    pub name: String,
    pub display_name: String,
    pub aliases: Vec<String>,
    pub backend: &'static str,
    pub default: bool,
}

fn rows(status: StatusCode, results: Vec<TestResult>) -> Response {
    (status, Json(results)).into_response()
}

fn invalid_request(message: impl Into<String>) -> Response {
    rows(StatusCode::BAD_REQUEST, vec![evaluator::invalid_request(message)])
}

/// POST /api/run-code - Grade a submission synchronously
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RunCodeRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!("Request body exceeds the configured limit");
            return rejection.into_response();
        }
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Malformed run-code request");
            return invalid_request(MISSING_FIELDS);
        }
    };

    if let Some(names) = &request.candidate_names {
        if let Some(bad) = names.iter().find(|name| !is_identifier(name)) {
            warn!(candidate = %bad, "Rejected candidate name");
            return invalid_request(format!("Invalid candidate name: {}", bad));
        }
    }

    let Some(submission) = request.into_submission() else {
        warn!("Run-code request without code or test cases");
        return invalid_request(MISSING_FIELDS);
    };

    let dispatch = state.runner.dispatcher().dispatch(&submission.language);
    let language = dispatch.language.name.clone();
    let backend = dispatch.backend().kind();

    info!(
        submission_id = %submission.id,
        language = %language,
        test_cases = submission.test_cases.len(),
        "Submission received"
    );

    let timer = metrics::GRADING_DURATION
        .with_label_values(&[backend])
        .start_timer();
    let graded = state.runner.try_grade_dispatched(&submission, dispatch).await;
    timer.observe_duration();

    match graded {
        Ok(results) => {
            metrics::record_results(&language, backend, &results);
            rows(StatusCode::OK, results)
        }
        Err(fault) => {
            error!(submission_id = %submission.id, error = %fault, "Grading failed");
            rows(
                StatusCode::INTERNAL_SERVER_ERROR,
                vec![evaluator::system_error(fault.to_string())],
            )
        }
    }
}

/// GET /api/languages - Configured languages
pub async fn list_languages(State(state): State<Arc<AppState>>) -> Json<Vec<LanguageInfo>> {
    let config = state.runner.dispatcher().config();
    let default = config.default_config().name.as_str();

    Json(
        config
            .languages()
            .iter()
            .map(|language| LanguageInfo {
                name: language.name.clone(),
                display_name: language.display_name(),
                aliases: language.aliases.clone(),
                backend: language.backend.kind(),
                default: language.name == default,
            })
            .collect(),
    )
}

/// GET /status - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus exposition
pub async fn export_metrics() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
