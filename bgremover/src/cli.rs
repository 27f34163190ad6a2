use std::path::PathBuf;

use clap::Parser;

use crate::config::{Device, ModelConfig};
use crate::export::{DEFAULT_QUALITY, ExportFormat, ExportRequest, Resolution};
use crate::telemetry::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "bgremover", version, about = "Remove the background of a single image with U2NET")]
pub struct Args {
	/// Input image path.
	pub input: PathBuf,

	/// Output image path (defaults to `<input>_nobg.<format>`).
	#[arg(short, long)]
	pub output: Option<PathBuf>,

	/// ONNX export of U2NET.
	#[arg(short = 'm', long, default_value = "models/u2net.onnx")]
	pub model: PathBuf,

	/// Expected SHA-256 of the model file.
	#[arg(long)]
	pub model_sha256: Option<String>,

	/// Device selection.
	#[arg(long, value_enum, default_value_t = Device::Cpu)]
	pub device: Device,

	/// ONNX Runtime shared library to load.
	#[arg(long)]
	pub runtime_lib: Option<PathBuf>,

	/// Fit the cutout into a preset box: original, hd, fullhd, 4k.
	#[arg(long, default_value = "original")]
	pub resolution: Resolution,

	/// Output format: png, jpg, webp.
	#[arg(short, long, default_value = "png")]
	pub format: ExportFormat,

	#[arg(long)]
	pub width: Option<u32>,

	#[arg(long)]
	pub height: Option<u32>,

	/// Lossy quality for jpg/webp (1-100).
	#[arg(short, long, default_value_t = DEFAULT_QUALITY)]
	pub quality: u8,

	/// Use --width/--height verbatim instead of fitting inside them.
	#[arg(long)]
	pub no_aspect: bool,

	/// More logging (-v debug, -vv trace).
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	#[arg(long, default_value = "compact")]
	pub log_format: LogFormat
}

impl Args {
	pub fn model_config(&self) -> ModelConfig {
		ModelConfig::new(&self.model)
			.with_device(self.device)
			.with_runtime_lib(self.runtime_lib.clone())
			.with_sha256(self.model_sha256.clone())
	}

	pub fn export_request(&self) -> ExportRequest {
		ExportRequest {
			format: self.format,
			width: self.width,
			height: self.height,
			maintain_aspect_ratio: !self.no_aspect,
			quality: self.quality
		}
	}

	pub fn output_path(&self) -> PathBuf {
		match &self.output {
			Some(p) => p.clone(),
			None => {
				let stem = self.input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
				self.input.with_file_name(format!("{stem}_nobg.{}", self.format.extension()))
			}
		}
	}
}
