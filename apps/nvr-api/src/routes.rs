use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use nvr_research::{Error, ResearchReport, ResearchRequest};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/periods", get(periods))
		.route("/v1/research", post(research))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Serialize)]
struct PeriodsResponse {
	periods: Vec<String>,
}

async fn periods(State(state): State<AppState>) -> Json<PeriodsResponse> {
	Json(PeriodsResponse { periods: state.periods.as_ref().clone() })
}

async fn research(
	State(state): State<AppState>,
	Json(payload): Json<ResearchRequest>,
) -> Result<Json<ResearchReport>, ApiError> {
	payload.validate(&state.periods)?;

	let report = state.graph.run_report(payload).await;

	Ok(Json(report))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message, fields } =>
				ApiError::new(StatusCode::BAD_REQUEST, "invalid_request", message, Some(fields)),
			Error::Qdrant(err) => {
				tracing::error!(error = %err, "Vector store error.");

				ApiError::new(
					StatusCode::INTERNAL_SERVER_ERROR,
					"internal_error",
					"Internal error.",
					None,
				)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}
