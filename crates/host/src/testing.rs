//! In-memory collaborators for host tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use devpilot_proto::{EditorSnapshot, Marker, Selection, SurfaceKind, TextEdit, ThemeKind};
use serde_json::Value;

use crate::collab::{
	Collaborators, CredentialStore, EditorEventSink, EditorSource, GenerationKind, GenerationService, KvStore, SourceScanner, Workbench,
};
use crate::error::{GenerationError, PersistenceError, SourceError};
use crate::subscription::Subscription;

#[derive(Debug, Default)]
pub(crate) struct MemoryKv {
	values: Mutex<HashMap<String, Value>>,
	writes: AtomicUsize,
	fail: AtomicBool,
}

impl MemoryKv {
	pub fn insert(&self, key: &str, value: Value) {
		self.values.lock().unwrap().insert(key.to_string(), value);
	}

	pub fn value(&self, key: &str) -> Option<Value> {
		self.values.lock().unwrap().get(key).cloned()
	}

	pub fn writes(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}

	pub fn fail_writes(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}
}

#[async_trait]
impl KvStore for MemoryKv {
	async fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
		Ok(self.value(key))
	}

	async fn update(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(PersistenceError::Unavailable("disk full".to_string()));
		}
		self.writes.fetch_add(1, Ordering::SeqCst);
		self.insert(key, value);
		Ok(())
	}
}

#[derive(Debug, Default)]
pub(crate) struct MemoryCredentials {
	values: Mutex<HashMap<String, String>>,
}

impl MemoryCredentials {
	pub fn secret(&self, key: &str) -> Option<String> {
		self.values.lock().unwrap().get(key).cloned()
	}
}

#[async_trait]
impl CredentialStore for MemoryCredentials {
	async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
		Ok(self.secret(key))
	}

	async fn set(&self, key: &str, secret: &str) -> Result<(), PersistenceError> {
		self.values.lock().unwrap().insert(key.to_string(), secret.to_string());
		Ok(())
	}
}

#[derive(Debug, Default)]
pub(crate) struct FakeEditor {
	pub active: Mutex<Option<EditorSnapshot>>,
	pub selections: Mutex<Vec<Selection>>,
	pub diffs: Mutex<HashMap<String, String>>,
	pub workspace_diff: Mutex<String>,
	pub diff_calls: Mutex<Vec<String>>,
	pub diff_delays: Mutex<HashMap<String, Duration>>,
	pub applied: Mutex<Vec<(String, Vec<TextEdit>)>>,
	pub reject_edits: AtomicBool,
	pub cancelled: Arc<AtomicBool>,
	pub sink: Mutex<Option<EditorEventSink>>,
}

#[async_trait]
impl EditorSource for FakeEditor {
	async fn active_editor(&self) -> Option<EditorSnapshot> {
		self.active.lock().unwrap().clone()
	}

	async fn selections(&self, _uri: &str) -> Vec<Selection> {
		self.selections.lock().unwrap().clone()
	}

	async fn diff_for_resource(&self, uri: &str) -> Result<String, SourceError> {
		self.diff_calls.lock().unwrap().push(uri.to_string());
		let delay = self.diff_delays.lock().unwrap().get(uri).copied();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		self.diffs
			.lock()
			.unwrap()
			.get(uri)
			.cloned()
			.ok_or_else(|| SourceError::Foreign(uri.to_string()))
	}

	async fn workspace_diff(&self) -> Result<String, SourceError> {
		Ok(self.workspace_diff.lock().unwrap().clone())
	}

	async fn apply_edits(&self, uri: &str, edits: &[TextEdit]) -> Result<(), SourceError> {
		if self.reject_edits.load(Ordering::SeqCst) {
			return Err(SourceError::OutOfBounds {
				uri: uri.to_string(),
				index: 0,
			});
		}
		self.applied.lock().unwrap().push((uri.to_string(), edits.to_vec()));
		Ok(())
	}

	fn subscribe(&self, sink: EditorEventSink) -> Result<Subscription, SourceError> {
		*self.sink.lock().unwrap() = Some(sink);
		let cancelled = self.cancelled.clone();
		Ok(Subscription::new(move || cancelled.store(true, Ordering::SeqCst)))
	}
}

#[derive(Debug, Default)]
pub(crate) struct FakeScanner {
	pub markers: Mutex<Vec<Marker>>,
	pub scans: AtomicUsize,
}

impl SourceScanner for FakeScanner {
	fn scan_for_markers(&self, _glob: &str) -> Result<Vec<Marker>, SourceError> {
		self.scans.fetch_add(1, Ordering::SeqCst);
		Ok(self.markers.lock().unwrap().clone())
	}
}

/// Answers `commit: <input>` / `echo: <input>`, optionally after a per-input delay.
#[derive(Debug, Default)]
pub(crate) struct FakeGenerator {
	pub fail: AtomicBool,
	pub delays: Mutex<HashMap<String, Duration>>,
	pub calls: Mutex<Vec<(GenerationKind, String)>>,
}

#[async_trait]
impl GenerationService for FakeGenerator {
	async fn generate(&self, kind: GenerationKind, input: &str) -> Result<String, GenerationError> {
		self.calls.lock().unwrap().push((kind, input.to_string()));
		let delay = self.delays.lock().unwrap().get(input).copied();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		if self.fail.load(Ordering::SeqCst) {
			return Err(GenerationError::MissingCredential("devpilot.openaiKey".to_string()));
		}
		Ok(match kind {
			GenerationKind::Commit => format!("commit: {input}"),
			GenerationKind::Chat => format!("echo: {input}"),
		})
	}
}

#[derive(Debug, Default)]
pub(crate) struct FakeWorkbench {
	pub theme: ThemeKind,
	pub reveals: Mutex<Vec<SurfaceKind>>,
}

impl Workbench for FakeWorkbench {
	fn reveal(&self, kind: SurfaceKind) {
		self.reveals.lock().unwrap().push(kind);
	}

	fn current_theme(&self) -> ThemeKind {
		self.theme
	}
}

/// Every fake, kept around for assertions after the host took its copies.
#[derive(Debug, Default, Clone)]
pub(crate) struct Fakes {
	pub editor: Arc<FakeEditor>,
	pub scanner: Arc<FakeScanner>,
	pub generator: Arc<FakeGenerator>,
	pub credentials: Arc<MemoryCredentials>,
	pub kv: Arc<MemoryKv>,
	pub workbench: Arc<FakeWorkbench>,
}

impl Fakes {
	pub fn with_theme(theme: ThemeKind) -> Self {
		Self {
			workbench: Arc::new(FakeWorkbench {
				theme,
				..FakeWorkbench::default()
			}),
			..Self::default()
		}
	}

	pub fn collaborators(&self) -> Collaborators {
		Collaborators {
			editor: self.editor.clone(),
			scanner: self.scanner.clone(),
			generator: self.generator.clone(),
			credentials: self.credentials.clone(),
			kv: self.kv.clone(),
			workbench: self.workbench.clone(),
		}
	}
}
