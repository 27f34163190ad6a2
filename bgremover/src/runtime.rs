use std::{
	env,
	path::{Path, PathBuf},
	sync::OnceLock
};

use crate::config::{Device, ModelConfig};
use crate::error::{RemovalError, Result};

static ORT_MAIN_LIB: OnceLock<PathBuf> = OnceLock::new();

/// Pick the ONNX Runtime shared library to load.
///
/// Order: explicit path from config, then the newest install in the user cache
/// dir (`<cache>/onnxruntime/<package>/<version>/lib`). `None` leaves the
/// lookup to ort itself, which honors `ORT_DYLIB_PATH`.
pub fn resolve_runtime_lib(cfg: &ModelConfig) -> Result<Option<PathBuf>> {
	if let Some(p) = &cfg.runtime_lib {
		if !p.is_file() {
			return Err(RemovalError::model_unavailable(p, "ONNX Runtime library not found"));
		}
		return Ok(Some(p.clone()));
	}

	let Some(base) = cache_base_dir() else {
		return Ok(None);
	};
	let pkg_dir = base.join("onnxruntime").join(runtime_package(cfg.device));
	Ok(find_any_installed_lib(env::consts::OS, &pkg_dir)?)
}

/// Load the runtime library once per process. Must run before any session is created.
pub fn init(lib: Option<&Path>) -> Result<()> {
	let Some(lib) = lib else {
		return Ok(());
	};

	if let Some(p) = ORT_MAIN_LIB.get() {
		if p != lib {
			return Err(RemovalError::model_unavailable(
				lib,
				format!("ONNX Runtime is already initialized with {}. Restart required to switch.", p.display())
			));
		}
		return Ok(());
	}

	let builder = ort::init_from(lib).map_err(|e| RemovalError::model_unavailable(lib, format!("load onnxruntime: {e}")))?;
	builder.commit();
	let _ = ORT_MAIN_LIB.set(lib.to_path_buf());
	tracing::info!(lib = %lib.display(), "onnxruntime initialized");
	Ok(())
}

fn runtime_package(device: Device) -> &'static str {
	match device {
		Device::Cpu => "onnxruntime",
		Device::Cuda => "onnxruntime-gpu",
		Device::Directml => "onnxruntime-directml"
	}
}

fn cache_base_dir() -> Option<PathBuf> {
	directories::ProjectDirs::from("rs", "bgremover", "bgremover").map(|d| d.cache_dir().to_path_buf())
}

fn find_main_lib(os: &str, lib_dir: &Path) -> Option<PathBuf> {
	let prefer = match os {
		"windows" => "onnxruntime.dll",
		"macos" => "libonnxruntime.dylib",
		_ => "libonnxruntime.so"
	};
	let p = lib_dir.join(prefer);
	if p.exists() {
		return Some(p);
	}

	// Versioned names like libonnxruntime.so.1.20.0; the largest file is the real library.
	let mut best: Option<(u64, PathBuf)> = None;
	let rd = std::fs::read_dir(lib_dir).ok()?;
	for ent in rd.flatten() {
		let path = ent.path();
		let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();

		let ok = match os {
			"windows" => name == "onnxruntime.dll",
			"macos" => name.starts_with("libonnxruntime") && name.ends_with(".dylib"),
			_ => name.starts_with("libonnxruntime.so")
		};
		if !ok {
			continue;
		}

		let len = ent.metadata().ok().map(|m| m.len()).unwrap_or(0);
		match &best {
			None => best = Some((len, path)),
			Some((best_len, _)) if len > *best_len => best = Some((len, path)),
			_ => {}
		}
	}
	best.map(|(_, p)| p)
}

fn find_any_installed_lib(os: &str, pkg_dir: &Path) -> std::io::Result<Option<PathBuf>> {
	if !pkg_dir.exists() {
		return Ok(None);
	}

	let mut versions: Vec<PathBuf> = Vec::new();
	for ent in std::fs::read_dir(pkg_dir)?.flatten() {
		let p = ent.path();
		if p.is_dir() {
			versions.push(p);
		}
	}

	versions.sort_by(|a, b| cmp_version_dir_names(b, a));

	Ok(versions.into_iter().find_map(|vdir| find_main_lib(os, &vdir.join("lib"))))
}

fn cmp_version_dir_names(a: &Path, b: &Path) -> std::cmp::Ordering {
	let a = a.file_name().and_then(|s| s.to_str()).unwrap_or("");
	let b = b.file_name().and_then(|s| s.to_str()).unwrap_or("");
	cmp_versions(a, b)
}

fn cmp_versions(a: &str, b: &str) -> std::cmp::Ordering {
	use std::cmp::Ordering;

	let pa = parse_version_prefix(a);
	let pb = parse_version_prefix(b);

	for i in 0..pa.len().max(pb.len()) {
		let av = pa.get(i).copied().unwrap_or(0);
		let bv = pb.get(i).copied().unwrap_or(0);
		match av.cmp(&bv) {
			Ordering::Equal => continue,
			ord => return ord
		}
	}

	a.cmp(b)
}

/// `1.24.1` from `1.24.1` or `1.24.1.post1`.
fn parse_version_prefix(s: &str) -> Vec<u64> {
	let mut out = Vec::new();
	for part in s.split('.') {
		let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
		match digits.parse::<u64>() {
			Ok(v) => out.push(v),
			Err(_) => break
		}
	}
	out
}
