use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemovalError>;

/// Every way a removal or export request can fail.
///
/// Transports map these to their own status codes; nothing here is retried.
#[derive(Debug, Error)]
pub enum RemovalError {
	#[error("no file provided")]
	NoFileProvided,

	#[error("invalid file type {0:?} (allowed: png, jpg, jpeg, gif, bmp, webp)")]
	InvalidFileType(String),

	#[error("decode image: {0}")]
	Decode(#[source] image::ImageError),

	/// The network cannot be used. Carries the path so the operator knows what to fix.
	#[error("model unavailable at {}: {reason}", path.display())]
	ModelUnavailable { path: PathBuf, reason: String },

	#[error("file not found: {0}")]
	FileNotFound(String),

	#[error("unsupported resolution {0:?} (supported: original, hd, fullhd, 4k)")]
	UnsupportedResolution(String),

	#[error("unsupported format {0:?} (supported: png, jpg, webp)")]
	UnsupportedFormat(String),

	#[error("invalid dimensions: {0}")]
	InvalidDimensions(String),

	#[error("invalid parameter: {0}")]
	InvalidParameter(String),

	#[error("inference failed: {0}")]
	Inference(String),

	#[error("encode {format}: {reason}")]
	Encode { format: &'static str, reason: String },

	#[error(transparent)]
	Io(#[from] std::io::Error)
}

impl RemovalError {
	pub fn model_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
		Self::ModelUnavailable {
			path: path.into(),
			reason: reason.into()
		}
	}

	pub fn inference(msg: impl Into<String>) -> Self {
		Self::Inference(msg.into())
	}

	pub fn encode(format: &'static str, reason: impl ToString) -> Self {
		Self::Encode {
			format,
			reason: reason.to_string()
		}
	}

	/// True for failures caused by the request itself rather than the server.
	pub fn is_client_error(&self) -> bool {
		matches!(
			self,
			Self::NoFileProvided
				| Self::InvalidFileType(_)
				| Self::Decode(_)
				| Self::FileNotFound(_)
				| Self::UnsupportedResolution(_)
				| Self::UnsupportedFormat(_)
				| Self::InvalidDimensions(_)
				| Self::InvalidParameter(_)
		)
	}
}
