use std::{
	fs::File,
	io,
	path::Path,
	sync::Mutex,
	time::Instant
};

use image::RgbImage;
use image::imageops::FilterType;
use ndarray::{Array2, Array4, ArrayViewD};
use ort::ep;
use ort::session::Session;
use ort::value::TensorRef;
use sha2::Digest as _;

use crate::compose::Prediction;
use crate::config::{Device, ModelConfig};
use crate::error::{RemovalError, Result};
use crate::runtime;

/// ImageNet statistics U2NET was trained with.
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Anything that turns an RGB image into a saliency prediction.
pub trait Segmenter: Send + Sync {
	fn predict(&self, img: &RgbImage) -> Result<Prediction>;

	fn name(&self) -> &str;
}

/// U2NET running under ONNX Runtime. Load once, share everywhere.
pub struct U2Net {
	// `Session::run` takes `&mut self`, so concurrent callers queue here.
	session: Mutex<Session>,
	input_size: u32,
	name: String
}

impl U2Net {
	pub fn load(cfg: &ModelConfig) -> Result<Self> {
		let path = &cfg.model_path;
		if !path.is_file() {
			return Err(RemovalError::model_unavailable(
				path,
				"model file not found; download the U2NET ONNX export and place it there"
			));
		}
		if let Some(expected) = cfg.sha256.as_deref() {
			verify_sha256(path, expected)?;
		}

		let lib = runtime::resolve_runtime_lib(cfg)?;
		runtime::init(lib.as_deref())?;

		let start = Instant::now();
		let session = build_session(path, cfg.device).map_err(|reason| RemovalError::model_unavailable(path, reason))?;
		tracing::info!(
			model = %path.display(),
			device = ?cfg.device,
			elapsed_ms = start.elapsed().as_millis() as u64,
			"model loaded"
		);

		Ok(Self {
			session: Mutex::new(session),
			input_size: cfg.input_size,
			name: cfg.model_name()
		})
	}
}

impl Segmenter for U2Net {
	fn predict(&self, img: &RgbImage) -> Result<Prediction> {
		let input = preprocess(img, self.input_size);

		let mut session = self.session.lock().map_err(|_| RemovalError::inference("session lock poisoned"))?;
		let tensor = TensorRef::from_array_view(&input).map_err(|e| RemovalError::inference(format!("build input tensor: {e}")))?;
		let outputs = session
			.run(ort::inputs![tensor])
			.map_err(|e| RemovalError::inference(format!("run inference: {e}")))?;

		if outputs.len() == 0 {
			return Err(RemovalError::inference("model produced no outputs"));
		}

		// d1 is the fused, finest map; d2..d7 are deep-supervision side outputs.
		let out = outputs[0]
			.try_extract_array::<f32>()
			.map_err(|e| RemovalError::inference(format!("extract output tensor: {e}")))?;
		primary_map(out)
	}

	fn name(&self) -> &str {
		&self.name
	}
}

fn build_session(model_path: &Path, device: Device) -> std::result::Result<Session, String> {
	let preferred = match device {
		Device::Cpu => None,
		Device::Cuda => Some(("CUDA", ep::CUDA::default().build())),
		Device::Directml => Some(("DirectML", ep::DirectML::default().build()))
	};

	if let Some((label, provider)) = preferred {
		let attempt = Session::builder()
			.map_err(|e| format!("create ORT session builder: {e}"))?
			.with_execution_providers([provider])
			.map_err(|e| format!("configure {label} EP: {e}"))?
			.commit_from_file(model_path);
		match attempt {
			Ok(s) => return Ok(s),
			Err(e) => {
				tracing::warn!(provider = label, error = %e, "execution provider init failed, falling back to CPU");
			}
		}
	}

	Session::builder()
		.map_err(|e| format!("create ORT session builder: {e}"))?
		.commit_from_file(model_path)
		.map_err(|e| format!("load onnx model: {e}"))
}

/// Resize to the square network input and normalize into a `[1, 3, S, S]` tensor.
pub fn preprocess(img: &RgbImage, input_size: u32) -> Array4<f32> {
	let resized = image::imageops::resize(img, input_size, input_size, FilterType::Lanczos3);
	let s = input_size as usize;
	let mut t = Array4::<f32>::zeros((1, 3, s, s));

	for (x, y, p) in resized.enumerate_pixels() {
		let (x, y) = (x as usize, y as usize);
		for c in 0..3 {
			t[[0, c, y, x]] = (p[c] as f32 / 255.0 - MEAN[c]) / STD[c];
		}
	}

	t
}

/// Pull the single-channel map out of a `[1, 1, H, W]` (or `[1, H, W]`) output.
fn primary_map(out: ArrayViewD<'_, f32>) -> Result<Prediction> {
	let (h, w) = match out.shape() {
		[1, 1, h, w] | [1, h, w] => (*h, *w),
		other => {
			return Err(RemovalError::inference(format!(
				"unexpected output shape {other:?} (expected [1, 1, H, W])"
			)));
		}
	};
	let flat: Vec<f32> = out.iter().copied().collect();
	Array2::from_shape_vec((h, w), flat).map_err(|e| RemovalError::inference(format!("reshape output: {e}")))
}

fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
	let mut file = File::open(path)?;
	let mut hasher = sha2::Sha256::new();
	io::copy(&mut file, &mut hasher)?;
	let got = hex::encode(hasher.finalize());
	if !eq_hex(expected, &got) {
		return Err(RemovalError::model_unavailable(
			path,
			format!("sha256 mismatch: expected {expected}, got {got}")
		));
	}
	Ok(())
}

fn eq_hex(a: &str, b: &str) -> bool {
	a.trim().trim_start_matches("0x").eq_ignore_ascii_case(b.trim().trim_start_matches("0x"))
}
