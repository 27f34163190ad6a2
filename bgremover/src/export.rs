use std::{fmt, io::Cursor, path::Path, str::FromStr};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::compose;
use crate::error::{RemovalError, Result};

pub const DEFAULT_QUALITY: u8 = 90;

/// Upper bound for either side of an exported image.
pub const MAX_DIMENSION: u32 = 16_384;

const WHITE: [u8; 3] = [255, 255, 255];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
	#[default]
	Png,
	#[serde(alias = "jpg")]
	Jpeg,
	Webp
}

impl ExportFormat {
	pub fn content_type(self) -> &'static str {
		match self {
			Self::Png => "image/png",
			Self::Jpeg => "image/jpeg",
			Self::Webp => "image/webp"
		}
	}

	pub fn extension(self) -> &'static str {
		match self {
			Self::Png => "png",
			Self::Jpeg => "jpg",
			Self::Webp => "webp"
		}
	}
}

impl FromStr for ExportFormat {
	type Err = RemovalError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"png" => Ok(Self::Png),
			"jpg" | "jpeg" => Ok(Self::Jpeg),
			"webp" => Ok(Self::Webp),
			_ => Err(RemovalError::UnsupportedFormat(s.to_string()))
		}
	}
}

impl fmt::Display for ExportFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.extension())
	}
}

/// Named output sizes. Each is a box the image is fitted into, aspect preserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
	#[default]
	#[serde(rename = "original")]
	Original,
	#[serde(rename = "hd")]
	Hd,
	#[serde(rename = "fullhd")]
	FullHd,
	#[serde(rename = "4k")]
	Uhd4k
}

impl Resolution {
	pub fn bounds(self) -> Option<(u32, u32)> {
		match self {
			Self::Original => None,
			Self::Hd => Some((1280, 720)),
			Self::FullHd => Some((1920, 1080)),
			Self::Uhd4k => Some((3840, 2160))
		}
	}

	/// Largest aspect-preserving size inside the preset box. May upscale.
	pub fn fit(self, width: u32, height: u32) -> (u32, u32) {
		match self.bounds() {
			None => (width, height),
			Some((bw, bh)) => fit_within(width, height, bw, bh)
		}
	}
}

impl FromStr for Resolution {
	type Err = RemovalError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"" | "original" => Ok(Self::Original),
			"hd" => Ok(Self::Hd),
			"fullhd" => Ok(Self::FullHd),
			"4k" => Ok(Self::Uhd4k),
			_ => Err(RemovalError::UnsupportedResolution(s.to_string()))
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
	pub format: ExportFormat,
	pub width: Option<u32>,
	pub height: Option<u32>,
	pub maintain_aspect_ratio: bool,
	/// Lossy quality, 1..=100. Ignored for PNG.
	pub quality: u8
}

impl Default for ExportRequest {
	fn default() -> Self {
		Self {
			format: ExportFormat::Png,
			width: None,
			height: None,
			maintain_aspect_ratio: true,
			quality: DEFAULT_QUALITY
		}
	}
}

impl ExportRequest {
	pub fn validate(&self) -> Result<()> {
		for (label, v) in [("width", self.width), ("height", self.height)] {
			match v {
				Some(0) => return Err(RemovalError::InvalidDimensions(format!("{label} must be positive"))),
				Some(v) if v > MAX_DIMENSION => {
					return Err(RemovalError::InvalidDimensions(format!("{label} {v} exceeds {MAX_DIMENSION}")));
				}
				_ => {}
			}
		}
		if !(1..=100).contains(&self.quality) {
			return Err(RemovalError::InvalidParameter(format!("quality {} outside 1-100", self.quality)));
		}
		Ok(())
	}

	/// Output size for a `orig_w x orig_h` source.
	///
	/// With aspect preservation and both sides given, the tighter ratio wins.
	/// With one side given, the other follows proportionally. Without
	/// preservation, missing sides keep the original value.
	pub fn target_dimensions(&self, orig_w: u32, orig_h: u32) -> Result<(u32, u32)> {
		self.validate()?;
		if orig_w == 0 || orig_h == 0 {
			return Err(RemovalError::InvalidDimensions(format!("source is {orig_w}x{orig_h}")));
		}

		let dims = match (self.width, self.height, self.maintain_aspect_ratio) {
			(None, None, _) => (orig_w, orig_h),
			(Some(w), Some(h), true) => fit_within(orig_w, orig_h, w, h),
			(Some(w), None, true) => (w, proportional(orig_h, w, orig_w)),
			(None, Some(h), true) => (proportional(orig_w, h, orig_h), h),
			(w, h, false) => (w.unwrap_or(orig_w), h.unwrap_or(orig_h))
		};

		if dims.0 > MAX_DIMENSION || dims.1 > MAX_DIMENSION {
			return Err(RemovalError::InvalidDimensions(format!(
				"{}x{} exceeds {MAX_DIMENSION}",
				dims.0, dims.1
			)));
		}
		Ok(dims)
	}
}

/// Encoded export plus what a transport needs to label it.
#[derive(Debug, Clone)]
pub struct Exported {
	pub bytes: Vec<u8>,
	pub format: ExportFormat,
	pub width: u32,
	pub height: u32
}

pub fn export(img: &RgbaImage, req: &ExportRequest) -> Result<Exported> {
	let (width, height) = req.target_dimensions(img.width(), img.height())?;
	let resized = resize(img, width, height);
	let bytes = encode(&resized, req.format, req.quality)?;
	tracing::debug!(format = %req.format, width, height, bytes = bytes.len(), "exported");
	Ok(Exported {
		bytes,
		format: req.format,
		width,
		height
	})
}

pub fn resize(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
	if img.dimensions() == (width, height) {
		return img.clone();
	}
	imageops::resize(img, width, height, FilterType::Lanczos3)
}

pub fn encode(img: &RgbaImage, format: ExportFormat, quality: u8) -> Result<Vec<u8>> {
	let mut buf = Vec::new();
	match format {
		ExportFormat::Png => {
			img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
				.map_err(|e| RemovalError::encode("png", e))?;
		}
		ExportFormat::Jpeg => {
			let rgb = compose::flatten_onto(img, WHITE);
			JpegEncoder::new_with_quality(&mut buf, quality)
				.encode_image(&rgb)
				.map_err(|e| RemovalError::encode("jpeg", e))?;
		}
		ExportFormat::Webp => {
			// image's own WebP encoder is lossless only; libwebp honors quality.
			let mem = webp::Encoder::from_rgba(img.as_raw(), img.width(), img.height())
				.encode_simple(false, quality as f32)
				.map_err(|e| RemovalError::encode("webp", format!("{e:?}")))?;
			buf.extend_from_slice(&mem);
		}
	}
	Ok(buf)
}

/// Download name for a stored artifact re-encoded as `format`.
pub fn file_name_for(stored: &str, format: ExportFormat) -> String {
	let stem = Path::new(stored)
		.file_stem()
		.and_then(|s| s.to_str())
		.unwrap_or("image");
	format!("{stem}.{}", format.extension())
}

/// `round(v * num / den)`, half away from zero, never below 1.
///
/// Integer arithmetic keeps exact halves exact.
fn proportional(v: u32, num: u32, den: u32) -> u32 {
	let (v, num, den) = (v as u64, num as u64, den as u64);
	let rounded = (2 * v * num + den) / (2 * den);
	u32::try_from(rounded).unwrap_or(u32::MAX).max(1)
}

/// Scale `w x h` by the smaller of `bw / w` and `bh / h`.
fn fit_within(w: u32, h: u32, bw: u32, bh: u32) -> (u32, u32) {
	if bw as u64 * h as u64 <= bh as u64 * w as u64 {
		(bw, proportional(h, bw, w))
	} else {
		(proportional(w, bh, h), bh)
	}
}
