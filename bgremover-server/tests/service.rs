mod common;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bgremover::RemovalError;
use bgremover_server::service::{self, DownloadQuery, UploadForm};
use common::{Harness, encoded};
use image::{ColorType, ImageFormat};

fn form(name: &str, bytes: Vec<u8>) -> UploadForm {
	UploadForm {
		filename: Some(name.to_string()),
		bytes,
		..UploadForm::default()
	}
}

fn width_query(width: &str) -> DownloadQuery {
	DownloadQuery {
		width: Some(width.to_string()),
		maintain_aspect_ratio: Some("true".to_string()),
		..DownloadQuery::default()
	}
}

#[tokio::test]
async fn upload_then_download_resized() {
	let h = Harness::new();
	let resp = service::upload(&h.state, form("photo.jpg", encoded(640, 480, ImageFormat::Jpeg)))
		.await
		.unwrap();

	assert!(resp.success);
	assert_eq!((resp.width, resp.height), (640, 480));
	assert!(resp.filename.ends_with("_output.png"));
	assert_eq!(h.count("uploads"), 0, "upload staging file must be removed");
	assert_eq!(h.count("outputs"), 1);

	let stored = std::fs::read(h.dir.path().join("outputs").join(&resp.filename)).unwrap();
	let artifact = image::load_from_memory(&stored).unwrap();
	assert_eq!(artifact.color(), ColorType::Rgba8);
	assert_eq!((artifact.width(), artifact.height()), (640, 480));
	let rgba = artifact.to_rgba8();
	assert_eq!(rgba.get_pixel(5, 240)[3], 255);
	assert_eq!(rgba.get_pixel(635, 240)[3], 0);

	let dl = service::download(&h.state, &resp.filename, &width_query("320")).await.unwrap();
	assert_eq!(dl.content_type, "image/png");
	assert_eq!(dl.filename, resp.filename);
	let out = image::load_from_memory(&dl.bytes).unwrap();
	assert_eq!((out.width(), out.height()), (320, 240));
}

#[tokio::test]
async fn preview_is_the_stored_png() {
	let h = Harness::new();
	let resp = service::upload(&h.state, form("a.png", encoded(50, 40, ImageFormat::Png))).await.unwrap();

	let data_url = resp.image.expect("preview requested by default");
	let b64 = data_url.strip_prefix("data:image/png;base64,").unwrap();
	let preview = STANDARD.decode(b64).unwrap();
	let stored = std::fs::read(h.dir.path().join("outputs").join(&resp.filename)).unwrap();
	assert_eq!(preview, stored);

	let no_preview = service::upload(
		&h.state,
		UploadForm {
			preview: false,
			..form("b.png", encoded(10, 10, ImageFormat::Png))
		}
	)
	.await
	.unwrap();
	assert!(no_preview.image.is_none());
}

#[tokio::test]
async fn preset_resolution_resizes_the_artifact() {
	let h = Harness::new();
	let resp = service::upload(
		&h.state,
		UploadForm {
			resolution: Some("fullhd".to_string()),
			..form("wide.bmp", encoded(400, 100, ImageFormat::Bmp))
		}
	)
	.await
	.unwrap();
	assert_eq!((resp.width, resp.height), (1920, 480));
}

#[tokio::test]
async fn jpeg_download_is_white_where_transparent() {
	let h = Harness::new();
	let resp = service::upload(&h.state, form("p.png", encoded(64, 32, ImageFormat::Png))).await.unwrap();

	let q = DownloadQuery {
		format: Some("jpg".to_string()),
		quality: Some("95".to_string()),
		..DownloadQuery::default()
	};
	let dl = service::download(&h.state, &resp.filename, &q).await.unwrap();
	assert_eq!(dl.content_type, "image/jpeg");
	assert!(dl.filename.ends_with(".jpg"));

	let rgb = image::load_from_memory(&dl.bytes).unwrap().to_rgb8();
	let p = rgb.get_pixel(62, 16).0;
	assert!(p.iter().all(|&c| c >= 245), "expected white, got {p:?}");
}

#[tokio::test]
async fn repeated_downloads_are_identical() {
	let h = Harness::new();
	let resp = service::upload(&h.state, form("p.png", encoded(90, 60, ImageFormat::Png))).await.unwrap();

	for format in ["png", "jpg", "webp"] {
		let q = DownloadQuery {
			format: Some(format.to_string()),
			width: Some("45".to_string()),
			..DownloadQuery::default()
		};
		let a = service::download(&h.state, &resp.filename, &q).await.unwrap();
		let b = service::download(&h.state, &resp.filename, &q).await.unwrap();
		assert_eq!(a.bytes, b.bytes, "{format} differs between identical requests");
	}
}

#[tokio::test]
async fn unknown_files_are_not_found() {
	let h = Harness::new();
	let err = service::download(&h.state, "missing_output.png", &DownloadQuery::default())
		.await
		.unwrap_err();
	assert!(matches!(err, RemovalError::FileNotFound(_)));

	let err = service::download(&h.state, "../uploads/x.png", &DownloadQuery::default())
		.await
		.unwrap_err();
	assert!(matches!(err, RemovalError::FileNotFound(_)));

	let bad_width = DownloadQuery {
		width: Some("-5".to_string()),
		..DownloadQuery::default()
	};
	let err = service::download(&h.state, "missing_output.png", &bad_width).await.unwrap_err();
	assert!(matches!(err, RemovalError::FileNotFound(_)), "lookup must precede query validation, got {err:?}");
}

#[tokio::test]
async fn cleanup_is_idempotent() {
	let h = Harness::new();
	let resp = service::upload(&h.state, form("p.gif", encoded(8, 8, ImageFormat::Png))).await.unwrap();

	let first = service::cleanup(&h.state, &resp.filename).await.unwrap();
	assert!(first.success);
	let second = service::cleanup(&h.state, &resp.filename).await.unwrap();
	assert!(!second.success);
	assert_eq!(second.message, "File not found");
	assert_eq!(h.count("outputs"), 0);
}

#[tokio::test]
async fn rejected_uploads_leave_nothing_behind() {
	let h = Harness::new();

	let err = service::upload(&h.state, form("notes.txt", b"hello".to_vec())).await.unwrap_err();
	assert!(matches!(err, RemovalError::InvalidFileType(_)));

	let err = service::upload(&h.state, UploadForm::default()).await.unwrap_err();
	assert!(matches!(err, RemovalError::NoFileProvided));

	let err = service::upload(&h.state, form("empty.png", Vec::new())).await.unwrap_err();
	assert!(matches!(err, RemovalError::NoFileProvided));

	let err = service::upload(&h.state, form("broken.png", b"not a png".to_vec())).await.unwrap_err();
	assert!(matches!(err, RemovalError::Decode(_)));

	let err = service::upload(
		&h.state,
		UploadForm {
			resolution: Some("8k".to_string()),
			..form("a.png", encoded(4, 4, ImageFormat::Png))
		}
	)
	.await
	.unwrap_err();
	assert!(matches!(err, RemovalError::UnsupportedResolution(_)));

	assert_eq!(h.count("uploads"), 0);
	assert_eq!(h.count("outputs"), 0);
}

#[tokio::test]
async fn concurrent_uploads_get_distinct_names() {
	let h = Harness::new();
	let mut tasks = Vec::new();
	for i in 0..6 {
		let state = h.state.clone();
		tasks.push(tokio::spawn(async move {
			service::upload(&state, form(&format!("{i}.png"), encoded(20 + i, 10, ImageFormat::Png)))
				.await
				.unwrap()
				.filename
		}));
	}
	let mut names = Vec::new();
	for t in tasks {
		names.push(t.await.unwrap());
	}
	names.sort();
	names.dedup();
	assert_eq!(names.len(), 6);
	assert_eq!(h.count("outputs"), 6);
}

#[test]
fn health_reports_the_model() {
	let h = Harness::new();
	let health = service::health(&h.state);
	assert_eq!(health.status, "healthy");
	assert_eq!(health.model, "left-half");
}
