#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bgremover::compose::Prediction;
use bgremover::{BackgroundRemover, Result, Segmenter};
use bgremover_server::{AppState, Store};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::Array2;
use tempfile::TempDir;

/// Stands in for U2NET: a 320x320 prediction that is foreground on the left half.
pub struct LeftHalf;

impl Segmenter for LeftHalf {
	fn predict(&self, _img: &RgbImage) -> Result<Prediction> {
		Ok(Array2::from_shape_fn((320, 320), |(_, x)| if x < 160 { 0.98 } else { 0.02 }))
	}

	fn name(&self) -> &str {
		"left-half"
	}
}

/// Left-half segmenter that sleeps while predicting and records how many
/// predictions overlapped.
pub struct Slow {
	pub delay: Duration,
	pub running: AtomicUsize,
	pub peak: AtomicUsize,
	pub finished: AtomicUsize
}

impl Slow {
	pub fn new(delay: Duration) -> Arc<Self> {
		Arc::new(Self {
			delay,
			running: AtomicUsize::new(0),
			peak: AtomicUsize::new(0),
			finished: AtomicUsize::new(0)
		})
	}
}

impl Segmenter for Slow {
	fn predict(&self, img: &RgbImage) -> Result<Prediction> {
		let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
		self.peak.fetch_max(now, Ordering::SeqCst);
		std::thread::sleep(self.delay);
		self.running.fetch_sub(1, Ordering::SeqCst);
		self.finished.fetch_add(1, Ordering::SeqCst);
		LeftHalf.predict(img)
	}

	fn name(&self) -> &str {
		"slow"
	}
}

pub struct Harness {
	pub dir: TempDir,
	pub state: AppState
}

impl Harness {
	pub fn new() -> Self {
		Self::with(Arc::new(LeftHalf), 2)
	}

	pub fn with(segmenter: Arc<dyn Segmenter>, max_inflight: usize) -> Self {
		let dir = tempfile::tempdir().unwrap();
		let store = Store::open(dir.path().join("uploads"), dir.path().join("outputs")).unwrap();
		let remover = BackgroundRemover::with_segmenter(segmenter);
		Self {
			state: AppState::new(remover, store, max_inflight),
			dir
		}
	}

	pub fn count(&self, sub: &str) -> usize {
		std::fs::read_dir(self.dir.path().join(sub)).unwrap().count()
	}
}

pub fn encoded(w: u32, h: u32, format: ImageFormat) -> Vec<u8> {
	let img = DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90])));
	let mut buf = Vec::new();
	img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
	buf
}
