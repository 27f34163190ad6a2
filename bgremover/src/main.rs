use std::fs;

use anyhow::{Context, Result};
use clap::Parser;

use bgremover::telemetry::TracingConfig;
use bgremover::{BackgroundRemover, cli, export};

fn main() {
	// Keep stdout clean for piping; errors go to stderr via `anyhow`.
	if let Err(e) = run() {
		eprintln!("{e:#}");
		std::process::exit(1);
	}
}

fn run() -> Result<()> {
	let args = cli::Args::parse();
	TracingConfig::new(args.verbose, args.log_format).init()?;

	let remover = BackgroundRemover::load(&args.model_config()).context("load model")?;

	let input_path = &args.input;
	let bytes = fs::read(input_path).with_context(|| format!("read image: {}", input_path.display()))?;
	let result = remover
		.remove_background_at(&bytes, args.resolution)
		.with_context(|| format!("remove background: {}", input_path.display()))?;

	let exported = export::export(&result.image, &args.export_request()).context("export image")?;

	let out_path = args.output_path();
	fs::write(&out_path, &exported.bytes).with_context(|| format!("write image: {}", out_path.display()))?;
	tracing::info!(
		output = %out_path.display(),
		width = exported.width,
		height = exported.height,
		format = %exported.format,
		"done"
	);
	Ok(())
}
