pub mod config;
pub mod routes;
pub mod service;
pub mod store;

use anyhow::{Context, Result};
use bgremover::BackgroundRemover;
use tokio::net::TcpListener;

pub use config::ServerConfig;
pub use service::AppState;
pub use store::Store;

/// Load the model once, then serve until ctrl-c.
pub async fn serve(cfg: ServerConfig) -> Result<()> {
	let model_cfg = cfg.model_config();
	let remover = tokio::task::spawn_blocking(move || BackgroundRemover::load(&model_cfg))
		.await
		.context("model loader task")?
		.context("load model")?;

	let store = Store::open(&cfg.upload_dir, &cfg.output_dir)
		.with_context(|| format!("create {} / {}", cfg.upload_dir.display(), cfg.output_dir.display()))?;
	tracing::info!(
		uploads = %store.uploads_dir().display(),
		outputs = %store.outputs_dir().display(),
		"storage ready"
	);
	let max_inflight = cfg.max_inflight();
	let state = AppState::new(remover, store, max_inflight);
	let app = routes::router(state, cfg.body_limit_bytes());

	let addr = cfg.bind_addr();
	let listener = TcpListener::bind(&addr).await.with_context(|| format!("bind {addr}"))?;
	tracing::info!(addr = %listener.local_addr()?, max_inflight, "listening");

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("serve")?;
	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::warn!(error = %e, "failed to listen for ctrl-c");
		std::future::pending::<()>().await;
	}
	tracing::info!("shutting down");
}
