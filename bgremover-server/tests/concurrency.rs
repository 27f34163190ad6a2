mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use bgremover_server::service::{self, DownloadQuery, UploadForm};
use common::{Harness, Slow, encoded};
use image::ImageFormat;

fn form(name: &str) -> UploadForm {
	UploadForm {
		filename: Some(name.to_string()),
		bytes: encoded(40, 30, ImageFormat::Png),
		preview: false,
		..UploadForm::default()
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn abandoned_uploads_keep_their_slot_until_inference_ends() {
	let slow = Slow::new(Duration::from_millis(400));
	let h = Harness::with(slow.clone(), 1);

	let mut tasks = Vec::new();
	for i in 0..4 {
		let state = h.state.clone();
		let task = tokio::spawn(async move { service::upload(&state, form(&format!("{i}.png"))).await });
		tokio::time::sleep(Duration::from_millis(50)).await;
		task.abort();
		tasks.push(task);
	}
	for t in tasks {
		let _ = t.await;
	}

	let resp = service::upload(&h.state, form("last.png")).await.unwrap();
	assert!(resp.success);
	assert_eq!(slow.peak.load(Ordering::SeqCst), 1, "more inferences overlapped than max_inflight allows");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn downloads_wait_for_a_pipeline_slot() {
	let slow = Slow::new(Duration::from_millis(300));
	let h = Harness::with(slow.clone(), 1);
	let stored = service::upload(&h.state, form("a.png")).await.unwrap();

	let state = h.state.clone();
	let busy = tokio::spawn(async move { service::upload(&state, form("b.png")).await });
	while slow.running.load(Ordering::SeqCst) == 0 {
		tokio::time::sleep(Duration::from_millis(5)).await;
	}

	let q = DownloadQuery {
		width: Some("20".to_string()),
		format: Some("webp".to_string()),
		..DownloadQuery::default()
	};
	let dl = service::download(&h.state, &stored.filename, &q).await.unwrap();
	assert_eq!(
		slow.finished.load(Ordering::SeqCst),
		2,
		"export ran while the only slot was held by an inference"
	);
	assert_eq!(dl.content_type, "image/webp");

	busy.await.unwrap().unwrap();
}
