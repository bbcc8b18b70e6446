//! File-backed secret storage.

use std::path::PathBuf;

use async_trait::async_trait;
use devpilot_host::{CredentialStore, KvStore, PersistenceError};
use serde_json::Value;

use crate::kv::JsonFileStore;

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Stores secrets in an owner-only JSON file.
///
/// One key may be shadowed by an environment variable, which wins over the
/// stored value when set and non-empty.
#[derive(Debug)]
pub struct FileCredentialStore {
	file: JsonFileStore,
	env_override: Option<(String, String)>,
}

impl FileCredentialStore {
	/// Opens the secret file at `path`.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			file: JsonFileStore::new(path).private(),
			env_override: None,
		}
	}

	/// Lets `var` shadow the secret stored under `key`.
	pub fn with_env_override(mut self, key: impl Into<String>, var: impl Into<String>) -> Self {
		self.env_override = Some((key.into(), var.into()));
		self
	}

	fn from_env(&self, key: &str) -> Option<String> {
		let (shadowed, var) = self.env_override.as_ref()?;
		if shadowed != key {
			return None;
		}
		std::env::var(var).ok().filter(|value| !value.trim().is_empty())
	}
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
	async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
		if let Some(secret) = self.from_env(key) {
			return Ok(Some(secret));
		}
		match self.file.get(key).await? {
			Some(Value::String(secret)) if !secret.is_empty() => Ok(Some(secret)),
			Some(Value::String(_)) | None => Ok(None),
			Some(other) => serde_json::from_value::<String>(other)
				.map(Some)
				.map_err(|error| PersistenceError::Decode {
					key: key.to_string(),
					error,
				}),
		}
	}

	async fn set(&self, key: &str, secret: &str) -> Result<(), PersistenceError> {
		self.file.update(key, Value::String(secret.to_string())).await
	}
}
