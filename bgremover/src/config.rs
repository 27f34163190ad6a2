use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Side length of the square input U2NET was trained on.
pub const U2NET_INPUT_SIZE: u32 = 320;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Device {
	/// Always use CPU inference.
	#[default]
	Cpu,
	/// NVIDIA CUDA execution provider. Falls back to CPU if unavailable.
	Cuda,
	/// Windows only, uses DirectML (DirectX 12). Falls back to CPU if unavailable.
	Directml
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
	/// ONNX export of the segmentation network.
	pub model_path: PathBuf,
	pub input_size: u32,
	pub device: Device,
	/// Explicit ONNX Runtime shared library. Falls back to the cache dir, then `ORT_DYLIB_PATH`.
	pub runtime_lib: Option<PathBuf>,
	/// Expected SHA-256 of the model file, hex encoded.
	pub sha256: Option<String>
}

impl Default for ModelConfig {
	fn default() -> Self {
		Self {
			model_path: PathBuf::from("models/u2net.onnx"),
			input_size: U2NET_INPUT_SIZE,
			device: Device::Cpu,
			runtime_lib: None,
			sha256: None
		}
	}
}

impl ModelConfig {
	pub fn new(model_path: impl Into<PathBuf>) -> Self {
		Self {
			model_path: model_path.into(),
			..Self::default()
		}
	}

	pub fn with_device(mut self, device: Device) -> Self {
		self.device = device;
		self
	}

	pub fn with_runtime_lib(mut self, lib: Option<PathBuf>) -> Self {
		self.runtime_lib = lib;
		self
	}

	pub fn with_sha256(mut self, sha256: Option<String>) -> Self {
		self.sha256 = sha256;
		self
	}

	/// Short name used in logs and the health probe.
	pub fn model_name(&self) -> String {
		self.model_path
			.file_stem()
			.and_then(|s| s.to_str())
			.unwrap_or("u2net")
			.to_string()
	}
}
