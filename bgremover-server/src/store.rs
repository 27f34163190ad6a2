use std::{
	io,
	path::{Path, PathBuf}
};

use bgremover::{RemovalError, Result};
use uuid::Uuid;

/// Two flat directories: transient uploads and produced cutouts.
#[derive(Debug, Clone)]
pub struct Store {
	uploads: PathBuf,
	outputs: PathBuf
}

impl Store {
	pub fn open(uploads: impl Into<PathBuf>, outputs: impl Into<PathBuf>) -> io::Result<Self> {
		let store = Self {
			uploads: uploads.into(),
			outputs: outputs.into()
		};
		std::fs::create_dir_all(&store.uploads)?;
		std::fs::create_dir_all(&store.outputs)?;
		Ok(store)
	}

	pub fn uploads_dir(&self) -> &Path {
		&self.uploads
	}

	pub fn outputs_dir(&self) -> &Path {
		&self.outputs
	}

	pub fn new_id() -> String {
		Uuid::new_v4().to_string()
	}

	pub fn output_name(id: &str) -> String {
		format!("{id}_output.png")
	}

	/// Persist an upload. The file is deleted when the returned guard drops.
	pub async fn write_upload(&self, id: &str, ext: &str, bytes: &[u8]) -> Result<ScopedFile> {
		let guard = ScopedFile::new(self.uploads.join(format!("{id}_input.{ext}")));
		tokio::fs::write(guard.path(), bytes).await?;
		Ok(guard)
	}

	/// Write a produced artifact. Nothing is left behind if the write fails midway.
	pub async fn write_output(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
		let guard = ScopedFile::new(self.output_path(name)?);
		tokio::fs::write(guard.path(), bytes).await?;
		Ok(guard.keep())
	}

	pub async fn read_output(&self, name: &str) -> Result<Vec<u8>> {
		let path = self.output_path(name)?;
		match tokio::fs::read(&path).await {
			Ok(bytes) => Ok(bytes),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RemovalError::FileNotFound(name.to_string())),
			Err(e) => Err(e.into())
		}
	}

	/// Returns false when there was nothing to delete.
	pub async fn remove_output(&self, name: &str) -> Result<bool> {
		let Ok(path) = self.output_path(name) else {
			return Ok(false);
		};
		match tokio::fs::remove_file(&path).await {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into())
		}
	}

	fn output_path(&self, name: &str) -> Result<PathBuf> {
		if !is_plain_file_name(name) {
			return Err(RemovalError::FileNotFound(name.to_string()));
		}
		Ok(self.outputs.join(name))
	}
}

/// Rejects anything that could leave the outputs directory.
fn is_plain_file_name(name: &str) -> bool {
	!name.is_empty()
		&& name != "."
		&& name != ".."
		&& !name.contains(['/', '\\', '\0', '"'])
		&& Path::new(name).file_name().and_then(|s| s.to_str()) == Some(name)
}

/// Removes its file on drop unless [`keep`](ScopedFile::keep) was called.
///
/// The removal is a synchronous unlink. Upload guards are moved into the
/// blocking pipeline job and drop there; output guards only fire on a failed
/// write.
#[derive(Debug)]
pub struct ScopedFile {
	path: PathBuf,
	armed: bool
}

impl ScopedFile {
	pub fn new(path: PathBuf) -> Self {
		Self { path, armed: true }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn keep(mut self) -> PathBuf {
		self.armed = false;
		std::mem::take(&mut self.path)
	}
}

impl Drop for ScopedFile {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		match std::fs::remove_file(&self.path) {
			Ok(()) => tracing::trace!(path = %self.path.display(), "removed scoped file"),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {}
			Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to remove scoped file")
		}
	}
}
