//! Interfaces of the external collaborators the host core consumes.
//!
//! The core never hands a collaborator mutable access to its own state; every
//! call receives owned copies of what it needs.

use std::sync::Arc;

use async_trait::async_trait;
use devpilot_proto::{EditorSnapshot, Marker, Selection, SurfaceKind, TextEdit, ThemeKind};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{GenerationError, PersistenceError, SourceError};
use crate::subscription::Subscription;

/// Change notification from the live editing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
	/// A document's text changed. High frequency; debounced by the host.
	DocumentChanged {
		/// Changed document.
		uri: String,
	},
	/// Another editor became active.
	ActiveEditorChanged,
	/// A document was opened.
	DocumentOpened {
		/// Opened document.
		uri: String,
	},
	/// A document was closed.
	DocumentClosed {
		/// Closed document.
		uri: String,
	},
	/// A document was saved.
	DocumentSaved {
		/// Saved document.
		uri: String,
	},
	/// The selections of an editor changed.
	SelectionChanged {
		/// Document whose editor changed selection.
		uri: String,
	},
	/// The host colour theme changed.
	ThemeChanged(ThemeKind),
}

/// Where an [`EditorSource`] delivers its notifications.
#[derive(Debug, Clone)]
pub struct EditorEventSink {
	tx: mpsc::UnboundedSender<EditorEvent>,
}

impl EditorEventSink {
	/// Wraps a channel sender.
	pub fn from_sender(tx: mpsc::UnboundedSender<EditorEvent>) -> Self {
		Self { tx }
	}

	/// Forwards an event. Returns false once the host has stopped listening.
	pub fn emit(&self, event: EditorEvent) -> bool {
		self.tx.send(event).is_ok()
	}
}

/// The live editing session observed by the host.
#[async_trait]
pub trait EditorSource: Send + Sync {
	/// Snapshot of the active editor's document, if any.
	async fn active_editor(&self) -> Option<EditorSnapshot>;

	/// Current selections in the editor showing `uri`.
	async fn selections(&self, uri: &str) -> Vec<Selection>;

	/// Uncommitted changes of one resource as a unified diff.
	async fn diff_for_resource(&self, uri: &str) -> Result<String, SourceError>;

	/// Uncommitted changes of the whole workspace as a unified diff.
	async fn workspace_diff(&self) -> Result<String, SourceError>;

	/// Applies validated edits to the document at `uri`.
	async fn apply_edits(&self, uri: &str, edits: &[TextEdit]) -> Result<(), SourceError>;

	/// Starts delivering change notifications to `sink`.
	fn subscribe(&self, sink: EditorEventSink) -> Result<Subscription, SourceError>;
}

/// Read-only scan of the workspace for marker comments.
///
/// Scans are blocking and run on the blocking thread pool.
pub trait SourceScanner: Send + Sync {
	/// Returns every marker in files matching `glob`.
	fn scan_for_markers(&self, glob: &str) -> Result<Vec<Marker>, SourceError>;
}

/// What a generation request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationKind {
	/// Commit message from a diff.
	Commit,
	/// Chat answer from user text.
	Chat,
}

/// External text generation endpoint.
#[async_trait]
pub trait GenerationService: Send + Sync {
	/// Generates text for `input`.
	async fn generate(&self, kind: GenerationKind, input: &str) -> Result<String, GenerationError>;
}

/// Secret storage keyed by name.
#[async_trait]
pub trait CredentialStore: Send + Sync {
	/// Returns the secret stored under `key`.
	async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

	/// Stores `secret` under `key`.
	async fn set(&self, key: &str, secret: &str) -> Result<(), PersistenceError>;
}

/// Durable JSON key-value storage backing the state store.
#[async_trait]
pub trait KvStore: Send + Sync {
	/// Returns the value stored under `key`.
	async fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError>;

	/// Replaces the value stored under `key`. Durable once this returns.
	async fn update(&self, key: &str, value: Value) -> Result<(), PersistenceError>;
}

/// The container environment that creates display surfaces.
pub trait Workbench: Send + Sync {
	/// Opens or reveals a surface of `kind`.
	fn reveal(&self, kind: SurfaceKind);

	/// Theme currently used by the host environment.
	fn current_theme(&self) -> ThemeKind;
}

/// The full set of collaborators a host runs against.
#[derive(Clone)]
pub struct Collaborators {
	/// Live editing session.
	pub editor: Arc<dyn EditorSource>,
	/// Marker scanner.
	pub scanner: Arc<dyn SourceScanner>,
	/// Text generation.
	pub generator: Arc<dyn GenerationService>,
	/// Secret storage.
	pub credentials: Arc<dyn CredentialStore>,
	/// Durable state storage.
	pub kv: Arc<dyn KvStore>,
	/// Surface container.
	pub workbench: Arc<dyn Workbench>,
}
