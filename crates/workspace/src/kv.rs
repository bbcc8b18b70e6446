//! JSON object file backing the host state store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use devpilot_host::{KvStore, PersistenceError};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

/// Key-value store persisted as one JSON object.
///
/// Writes go to a sibling temp file that is renamed over the store, so a crash
/// never leaves a half-written object behind. Concurrent updates are serialized.
#[derive(Debug)]
pub struct JsonFileStore {
	path: PathBuf,
	private: bool,
	write_lock: Mutex<()>,
}

impl JsonFileStore {
	/// Opens (lazily) the store at `path`. A missing file reads as empty.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			private: false,
			write_lock: Mutex::new(()),
		}
	}

	/// Restricts the file to its owner on every write.
	pub fn private(mut self) -> Self {
		self.private = true;
		self
	}

	/// Backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn load(&self) -> Result<Map<String, Value>, PersistenceError> {
		let bytes = match tokio::fs::read(&self.path).await {
			Ok(bytes) => bytes,
			Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Map::new()),
			Err(error) => return Err(self.io(error)),
		};
		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(Map::new());
		}
		serde_json::from_slice(&bytes).map_err(|error| PersistenceError::Corrupt {
			path: self.path.clone(),
			error,
		})
	}

	async fn store(&self, key: &str, map: &Map<String, Value>) -> Result<(), PersistenceError> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await.map_err(|error| self.io(error))?;
		}
		let encoded = serde_json::to_vec_pretty(map).map_err(|error| PersistenceError::Encode {
			key: key.to_string(),
			error,
		})?;

		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, encoded).await.map_err(|error| self.io(error))?;
		if self.private {
			restrict(&tmp).await.map_err(|error| self.io(error))?;
		}
		tokio::fs::rename(&tmp, &self.path).await.map_err(|error| self.io(error))
	}

	fn io(&self, error: std::io::Error) -> PersistenceError {
		PersistenceError::Io {
			path: self.path.clone(),
			error,
		}
	}
}

#[cfg(unix)]
async fn restrict(path: &Path) -> std::io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict(_path: &Path) -> std::io::Result<()> {
	Ok(())
}

#[async_trait]
impl KvStore for JsonFileStore {
	async fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
		Ok(self.load().await?.remove(key))
	}

	async fn update(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
		let _guard = self.write_lock.lock().await;
		let mut map = self.load().await?;
		map.insert(key.to_string(), value);
		self.store(key, &map).await?;
		tracing::trace!(path = %self.path.display(), key, "kv updated");
		Ok(())
	}
}
