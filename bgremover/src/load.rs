use std::path::Path;

use image::{ColorType, DynamicImage, RgbImage};

use crate::compose;
use crate::error::{RemovalError, Result};

/// Extensions accepted at upload time.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

const WHITE: [u8; 3] = [255, 255, 255];

/// Decoded input, always 3-channel RGB by the time it reaches the network.
#[derive(Debug, Clone)]
pub struct SourceImage {
	pub rgb: RgbImage,
	/// Color type as decoded, before normalization.
	pub color: ColorType
}

impl SourceImage {
	pub fn width(&self) -> u32 {
		self.rgb.width()
	}

	pub fn height(&self) -> u32 {
		self.rgb.height()
	}

	pub fn dimensions(&self) -> (u32, u32) {
		self.rgb.dimensions()
	}
}

pub fn load_source(bytes: &[u8]) -> Result<SourceImage> {
	let img = image::load_from_memory(bytes).map_err(RemovalError::Decode)?;
	Ok(normalize(img))
}

pub fn load_source_path(path: &Path) -> Result<SourceImage> {
	let bytes = std::fs::read(path)?;
	load_source(&bytes)
}

/// Canonicalize to RGB. Transparent sources are flattened onto white so the
/// network never sees what sat under a transparent pixel.
pub fn normalize(img: DynamicImage) -> SourceImage {
	let color = img.color();
	let rgb = if color.has_alpha() {
		compose::flatten_onto(&img.to_rgba8(), WHITE)
	} else {
		img.to_rgb8()
	};
	SourceImage { rgb, color }
}

/// Check an uploaded file name against the accepted extensions.
pub fn validate_extension(filename: Option<&str>) -> Result<String> {
	let name = filename.map(str::trim).filter(|s| !s.is_empty()).ok_or(RemovalError::NoFileProvided)?;
	let ext = Path::new(name)
		.extension()
		.and_then(|s| s.to_str())
		.map(str::to_ascii_lowercase)
		.ok_or_else(|| RemovalError::InvalidFileType(name.to_string()))?;
	if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
		return Err(RemovalError::InvalidFileType(name.to_string()));
	}
	Ok(ext)
}
