//! Request semantics for upload, download, cleanup and health, independent of
//! the HTTP framework. Handlers in `routes` only translate to and from these.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bgremover::export::{self, DEFAULT_QUALITY};
use bgremover::{BackgroundRemover, ExportFormat, ExportRequest, RemovalError, Resolution, Result, load};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::store::Store;

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
	pub remover: BackgroundRemover,
	pub store: Arc<Store>,
	inflight: Arc<Semaphore>
}

impl AppState {
	pub fn new(remover: BackgroundRemover, store: Store, max_inflight: usize) -> Self {
		Self {
			remover,
			store: Arc::new(store),
			inflight: Arc::new(Semaphore::new(max_inflight.max(1)))
		}
	}

	/// A pipeline slot. Move it into the blocking job so the slot stays taken
	/// until the work itself ends, even if the request is dropped.
	async fn slot(&self) -> Result<OwnedSemaphorePermit> {
		Arc::clone(&self.inflight)
			.acquire_owned()
			.await
			.map_err(|_| RemovalError::inference("pipeline pool closed"))
	}
}

#[derive(Debug, Clone)]
pub struct UploadForm {
	pub filename: Option<String>,
	pub bytes: Vec<u8>,
	pub resolution: Option<String>,
	/// Include a base64 PNG preview in the response.
	pub preview: bool
}

impl Default for UploadForm {
	fn default() -> Self {
		Self {
			filename: None,
			bytes: Vec::new(),
			resolution: None,
			preview: true
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
	pub success: bool,
	pub filename: String,
	pub width: u32,
	pub height: u32,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub image: Option<String>
}

pub async fn upload(state: &AppState, form: UploadForm) -> Result<UploadResponse> {
	let ext = load::validate_extension(form.filename.as_deref())?;
	if form.bytes.is_empty() {
		return Err(RemovalError::NoFileProvided);
	}
	let resolution: Resolution = form.resolution.as_deref().unwrap_or("original").parse()?;

	let id = Store::new_id();
	let input = state.store.write_upload(&id, &ext, &form.bytes).await?;
	drop(form.bytes);

	let permit = state.slot().await?;
	let remover = state.remover.clone();
	let (result, png) = tokio::task::spawn_blocking(move || -> Result<_> {
		let _permit = permit;
		let bytes = std::fs::read(input.path())?;
		let result = remover.remove_background_at(&bytes, resolution)?;
		let png = result.to_png()?;
		Ok((result, png))
	})
	.await
	.map_err(|e| RemovalError::inference(format!("worker task failed: {e}")))??;

	let filename = Store::output_name(&id);
	state.store.write_output(&filename, &png).await?;
	tracing::info!(
		%filename,
		width = result.width(),
		height = result.height(),
		?resolution,
		"background removed"
	);

	Ok(UploadResponse {
		success: true,
		filename,
		width: result.width(),
		height: result.height(),
		message: "Background removed successfully".to_string(),
		image: form.preview.then(|| format!("data:image/png;base64,{}", STANDARD.encode(&png)))
	})
}

/// Raw download query. Everything arrives as text so bad values become
/// domain errors instead of framework rejections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
	pub width: Option<String>,
	pub height: Option<String>,
	pub format: Option<String>,
	pub quality: Option<String>,
	pub maintain_aspect_ratio: Option<String>
}

impl DownloadQuery {
	pub fn to_request(&self) -> Result<ExportRequest> {
		let format = match non_empty(&self.format) {
			Some(f) => f.parse()?,
			None => ExportFormat::Png
		};
		let quality = match non_empty(&self.quality) {
			None => DEFAULT_QUALITY,
			Some(q) => q
				.parse::<u8>()
				.ok()
				.filter(|q| (1..=100).contains(q))
				.ok_or_else(|| RemovalError::InvalidParameter(format!("quality {q:?} outside 1-100")))?
		};
		let req = ExportRequest {
			format,
			width: parse_dimension("width", non_empty(&self.width))?,
			height: parse_dimension("height", non_empty(&self.height))?,
			maintain_aspect_ratio: non_empty(&self.maintain_aspect_ratio).is_none_or(|v| v.eq_ignore_ascii_case("true")),
			quality
		};
		req.validate()?;
		Ok(req)
	}

	fn is_passthrough(req: &ExportRequest) -> bool {
		req.format == ExportFormat::Png && req.width.is_none() && req.height.is_none()
	}
}

fn non_empty(v: &Option<String>) -> Option<&str> {
	v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_dimension(label: &str, v: Option<&str>) -> Result<Option<u32>> {
	let Some(s) = v else {
		return Ok(None);
	};
	let n: i64 = s
		.parse()
		.map_err(|_| RemovalError::InvalidDimensions(format!("{label} {s:?} is not an integer")))?;
	if n <= 0 {
		return Err(RemovalError::InvalidDimensions(format!("{label} must be positive, got {n}")));
	}
	u32::try_from(n)
		.map(Some)
		.map_err(|_| RemovalError::InvalidDimensions(format!("{label} {n} is too large")))
}

#[derive(Debug, Clone)]
pub struct Download {
	pub bytes: Vec<u8>,
	pub content_type: &'static str,
	pub filename: String
}

pub async fn download(state: &AppState, filename: &str, query: &DownloadQuery) -> Result<Download> {
	let stored = state.store.read_output(filename).await?;
	let req = query.to_request()?;

	// The stored artifact already is the PNG at its own size.
	if DownloadQuery::is_passthrough(&req) {
		return Ok(Download {
			bytes: stored,
			content_type: ExportFormat::Png.content_type(),
			filename: filename.to_string()
		});
	}

	let permit = state.slot().await?;
	let exported = tokio::task::spawn_blocking(move || -> Result<_> {
		let _permit = permit;
		let img = image::load_from_memory_with_format(&stored, ImageFormat::Png)
			.map_err(RemovalError::Decode)?
			.to_rgba8();
		export::export(&img, &req)
	})
	.await
	.map_err(|e| RemovalError::encode("export", format!("worker task failed: {e}")))??;

	tracing::info!(
		%filename,
		format = %exported.format,
		width = exported.width,
		height = exported.height,
		"export served"
	);
	Ok(Download {
		bytes: exported.bytes,
		content_type: exported.format.content_type(),
		filename: export::file_name_for(filename, exported.format)
	})
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponse {
	pub success: bool,
	pub message: String
}

/// Idempotent: a second call reports not-found instead of failing.
pub async fn cleanup(state: &AppState, filename: &str) -> Result<CleanupResponse> {
	let removed = state.store.remove_output(filename).await?;
	tracing::debug!(%filename, removed, "cleanup");
	Ok(CleanupResponse {
		success: removed,
		message: if removed { "File deleted successfully" } else { "File not found" }.to_string()
	})
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: String,
	pub model: String
}

pub fn health(state: &AppState) -> HealthResponse {
	HealthResponse {
		status: "healthy".to_string(),
		model: state.remover.model_name().to_string()
	}
}
