use anyhow::Result;
use bgremover::telemetry::TracingConfig;
use bgremover_server::ServerConfig;
use clap::Parser;

#[tokio::main]
async fn main() {
	if let Err(e) = run().await {
		eprintln!("{e:#}");
		std::process::exit(1);
	}
}

async fn run() -> Result<()> {
	let cfg = ServerConfig::parse();
	TracingConfig::new(cfg.verbose, cfg.log_format).init()?;
	bgremover_server::serve(cfg).await
}
