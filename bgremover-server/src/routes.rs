use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use bgremover::RemovalError;
use serde_json::json;

use crate::service::{self, AppState, CleanupResponse, DownloadQuery, HealthResponse, UploadForm, UploadResponse};

pub fn router(state: AppState, body_limit: usize) -> Router {
	Router::new()
		.route("/", get(root))
		.route("/api/health", get(health))
		.route("/api/remove-background", post(remove_background))
		.route("/api/download/{filename}", get(download))
		.route("/api/cleanup/{filename}", delete(cleanup))
		.layer(DefaultBodyLimit::max(body_limit))
		.with_state(state)
}

async fn root() -> Json<serde_json::Value> {
	Json(json!({ "message": "Background Remover API is running" }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(service::health(&state))
}

async fn remove_background(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<UploadResponse>, ApiError> {
	let form = read_form(&mut multipart).await?;
	Ok(Json(service::upload(&state, form).await?))
}

async fn read_form(multipart: &mut Multipart) -> Result<UploadForm, ApiError> {
	let mut form = UploadForm::default();
	while let Some(field) = multipart.next_field().await? {
		let name = field.name().unwrap_or_default().to_string();
		match name.as_str() {
			"file" => {
				form.filename = field.file_name().map(str::to_string);
				form.bytes = field.bytes().await?.to_vec();
			}
			"resolution" => form.resolution = Some(field.text().await?),
			"preview" => form.preview = !field.text().await?.trim().eq_ignore_ascii_case("false"),
			_ => {}
		}
	}
	Ok(form)
}

async fn download(
	State(state): State<AppState>,
	Path(filename): Path<String>,
	Query(query): Query<DownloadQuery>
) -> Result<Response, ApiError> {
	let d = service::download(&state, &filename, &query).await?;
	let disposition = format!("attachment; filename=\"{}\"", d.filename);
	Ok((
		[(header::CONTENT_TYPE, d.content_type.to_string()), (header::CONTENT_DISPOSITION, disposition)],
		d.bytes
	)
		.into_response())
}

async fn cleanup(State(state): State<AppState>, Path(filename): Path<String>) -> Result<Json<CleanupResponse>, ApiError> {
	Ok(Json(service::cleanup(&state, &filename).await?))
}

/// Failure response: `{"success": false, "error": "..."}` with a status code.
#[derive(Debug)]
pub enum ApiError {
	Removal(RemovalError),
	Multipart(MultipartError)
}

impl From<RemovalError> for ApiError {
	fn from(e: RemovalError) -> Self {
		Self::Removal(e)
	}
}

impl From<MultipartError> for ApiError {
	fn from(e: MultipartError) -> Self {
		Self::Multipart(e)
	}
}

pub fn status_for(e: &RemovalError) -> StatusCode {
	match e {
		RemovalError::FileNotFound(_) => StatusCode::NOT_FOUND,
		RemovalError::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
		e if e.is_client_error() => StatusCode::BAD_REQUEST,
		_ => StatusCode::INTERNAL_SERVER_ERROR
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, message) = match &self {
			Self::Removal(e) => (status_for(e), e.to_string()),
			Self::Multipart(e) => (e.status(), format!("invalid upload: {}", e.body_text()))
		};
		if status.is_server_error() {
			tracing::error!(%status, error = %message, "request failed");
		} else {
			tracing::warn!(%status, error = %message, "request rejected");
		}
		(status, Json(json!({ "success": false, "error": message }))).into_response()
	}
}
