use std::path::PathBuf;

use bgremover::telemetry::LogFormat;
use bgremover::{Device, ModelConfig};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "bgremover-server", version, about = "HTTP background removal service")]
pub struct ServerConfig {
	#[arg(long, env = "BGREMOVER_HOST", default_value = "0.0.0.0")]
	pub host: String,

	#[arg(long, env = "BGREMOVER_PORT", default_value_t = 8000)]
	pub port: u16,

	/// Where uploads are staged while a request is processed.
	#[arg(long, env = "BGREMOVER_UPLOAD_DIR", default_value = "uploads")]
	pub upload_dir: PathBuf,

	/// Where cutouts are kept until cleaned up.
	#[arg(long, env = "BGREMOVER_OUTPUT_DIR", default_value = "outputs")]
	pub output_dir: PathBuf,

	/// ONNX export of U2NET.
	#[arg(short = 'm', long, env = "BGREMOVER_MODEL", default_value = "models/u2net.onnx")]
	pub model: PathBuf,

	#[arg(long, env = "BGREMOVER_MODEL_SHA256")]
	pub model_sha256: Option<String>,

	#[arg(long, env = "BGREMOVER_DEVICE", value_enum, default_value_t = Device::Cpu)]
	pub device: Device,

	/// ONNX Runtime shared library to load.
	#[arg(long, env = "BGREMOVER_RUNTIME_LIB")]
	pub runtime_lib: Option<PathBuf>,

	/// Concurrent pipelines allowed. Defaults to the number of CPUs.
	#[arg(long, env = "BGREMOVER_MAX_INFLIGHT")]
	pub max_inflight: Option<usize>,

	/// Request body limit in MiB.
	#[arg(long, env = "BGREMOVER_BODY_LIMIT_MB", default_value_t = 32)]
	pub body_limit_mb: usize,

	/// More logging (-v debug, -vv trace).
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[arg(long, env = "BGREMOVER_LOG_FORMAT", default_value = "compact")]
	pub log_format: LogFormat
}

impl ServerConfig {
	pub fn model_config(&self) -> ModelConfig {
		ModelConfig::new(&self.model)
			.with_device(self.device)
			.with_runtime_lib(self.runtime_lib.clone())
			.with_sha256(self.model_sha256.clone())
	}

	pub fn bind_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	pub fn max_inflight(&self) -> usize {
		self.max_inflight
			.filter(|&n| n > 0)
			.unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
	}

	pub fn body_limit_bytes(&self) -> usize {
		self.body_limit_mb.max(1) * 1024 * 1024
	}
}
