use std::{io::Cursor, sync::Arc, time::Instant};

use image::{ImageFormat, RgbaImage};

use crate::compose;
use crate::config::ModelConfig;
use crate::error::{RemovalError, Result};
use crate::export::{self, Resolution};
use crate::load;
use crate::u2net::{Segmenter, U2Net};

/// RGBA cutout at the source image's resolution (or a preset it was fitted to).
#[derive(Debug, Clone)]
pub struct CompositeResult {
	pub image: RgbaImage,
	/// Size of the decoded input, before any preset fit.
	pub source_width: u32,
	pub source_height: u32
}

impl CompositeResult {
	pub fn width(&self) -> u32 {
		self.image.width()
	}

	pub fn height(&self) -> u32 {
		self.image.height()
	}

	pub fn to_png(&self) -> Result<Vec<u8>> {
		let mut buf = Vec::new();
		self.image
			.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
			.map_err(|e| RemovalError::encode("png", e))?;
		Ok(buf)
	}
}

/// Application-scoped handle on the loaded network.
///
/// Build one at startup and clone it into whatever serves requests; clones
/// share the same model.
#[derive(Clone)]
pub struct BackgroundRemover {
	segmenter: Arc<dyn Segmenter>
}

impl BackgroundRemover {
	pub fn load(cfg: &ModelConfig) -> Result<Self> {
		Ok(Self::with_segmenter(Arc::new(U2Net::load(cfg)?)))
	}

	pub fn with_segmenter(segmenter: Arc<dyn Segmenter>) -> Self {
		Self { segmenter }
	}

	pub fn model_name(&self) -> &str {
		self.segmenter.name()
	}

	/// Decode, predict, composite. Blocking; run it off the async executor.
	pub fn remove_background(&self, bytes: &[u8]) -> Result<CompositeResult> {
		let span = tracing::debug_span!("remove_background", model = self.segmenter.name(), input_bytes = bytes.len());
		let _enter = span.enter();

		let t0 = Instant::now();
		let src = load::load_source(bytes)?;
		let (w, h) = src.dimensions();
		tracing::debug!(width = w, height = h, color = ?src.color, elapsed_ms = t0.elapsed().as_millis() as u64, "decoded");

		let t1 = Instant::now();
		let pred = self.segmenter.predict(&src.rgb)?;
		tracing::debug!(shape = ?pred.dim(), elapsed_ms = t1.elapsed().as_millis() as u64, "predicted");

		let t2 = Instant::now();
		let image = compose::composite(&src.rgb, &pred);
		tracing::debug!(elapsed_ms = t2.elapsed().as_millis() as u64, "composited");

		Ok(CompositeResult {
			image,
			source_width: w,
			source_height: h
		})
	}

	/// Same as [`remove_background`](Self::remove_background), then fit to a preset box.
	pub fn remove_background_at(&self, bytes: &[u8], resolution: Resolution) -> Result<CompositeResult> {
		let mut result = self.remove_background(bytes)?;
		let (w, h) = resolution.fit(result.source_width, result.source_height);
		if (w, h) != result.image.dimensions() {
			tracing::debug!(?resolution, width = w, height = h, "fitting to preset");
			result.image = export::resize(&result.image, w, h);
		}
		Ok(result)
	}
}
