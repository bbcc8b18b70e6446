//! Canonical, persisted application state.

use std::collections::BTreeMap;
use std::sync::Arc;

use bitflags::bitflags;
use devpilot_proto::{FeatureId, QuizId, QuizScore, ThemeKind};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;

use crate::collab::KvStore;
use crate::error::PersistenceError;

/// Storage key of the active feature.
pub const ACTIVE_FEATURE_KEY: &str = "devpilot.activeFeature";
/// Storage key of the quiz progress map.
pub const QUIZ_PROGRESS_KEY: &str = "devpilot.quizProgress";

/// The single application state owned by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
	/// Feature every surface displays.
	pub active_feature: Option<FeatureId>,
	/// Host colour theme.
	pub theme_kind: ThemeKind,
	/// Last attempt per quiz. Entries are overwritten, never removed.
	pub quiz_progress: BTreeMap<QuizId, QuizScore>,
}

bitflags! {
	/// Fields changed by a state write.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct StateFields: u8 {
		/// `active_feature` changed.
		const ACTIVE_FEATURE = 1 << 0;
		/// `theme_kind` changed.
		const THEME = 1 << 1;
		/// `quiz_progress` changed.
		const QUIZ_PROGRESS = 1 << 2;
	}
}

impl StateFields {
	/// Fields backed by durable storage. The theme always comes from the host.
	pub const PERSISTED: Self = Self::ACTIVE_FEATURE.union(Self::QUIZ_PROGRESS);

	fn between(old: &AppState, new: &AppState) -> Self {
		let mut fields = Self::empty();
		fields.set(Self::ACTIVE_FEATURE, old.active_feature != new.active_feature);
		fields.set(Self::THEME, old.theme_kind != new.theme_kind);
		fields.set(Self::QUIZ_PROGRESS, old.quiz_progress != new.quiz_progress);
		fields
	}
}

/// Result of a state write: the new value and what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
	/// State after the write.
	pub state: AppState,
	/// Changed fields; empty when the mutation was a no-op.
	pub fields: StateFields,
}

/// A write whose result could not be persisted.
///
/// The in-memory state is left untouched; pass `change` to
/// [`StateStore::proceed_unpersisted`] to apply it anyway.
#[derive(Debug, Error)]
#[error("state write not persisted: {source}")]
pub struct StateWriteError {
	/// The write that failed to persist.
	pub change: StateChange,
	/// Storage failure.
	#[source]
	pub source: PersistenceError,
}

/// Owns [`AppState`]; persists every write before notifying observers.
pub struct StateStore {
	state: AppState,
	kv: Arc<dyn KvStore>,
	changed: watch::Sender<StateChange>,
}

impl StateStore {
	/// Loads the last persisted state, defaulting missing or unreadable fields.
	///
	/// `theme` is the host-reported current theme.
	pub async fn restore(kv: Arc<dyn KvStore>, theme: ThemeKind) -> Self {
		let active_feature = load::<Option<FeatureId>>(kv.as_ref(), ACTIVE_FEATURE_KEY).await.flatten();
		let quiz_progress = load(kv.as_ref(), QUIZ_PROGRESS_KEY).await.unwrap_or_default();
		let state = AppState {
			active_feature,
			theme_kind: theme,
			quiz_progress,
		};
		tracing::info!(
			feature = ?state.active_feature,
			quizzes = state.quiz_progress.len(),
			"state restored"
		);
		let (changed, _) = watch::channel(StateChange {
			state: state.clone(),
			fields: StateFields::empty(),
		});
		Self { state, kv, changed }
	}

	/// Returns the current state.
	pub fn read(&self) -> &AppState {
		&self.state
	}

	/// Subscribes to applied writes: the new value and the fields it changed.
	///
	/// A persisted write is observed only after it reached storage.
	pub fn subscribe(&self) -> watch::Receiver<StateChange> {
		self.changed.subscribe()
	}

	/// Applies `mutate`, persists the changed fields, then notifies observers.
	///
	/// Quiz entries removed by `mutate` are put back.
	pub async fn write(&mut self, mutate: impl FnOnce(&mut AppState)) -> Result<StateChange, StateWriteError> {
		let mut next = self.state.clone();
		mutate(&mut next);
		for (id, score) in &self.state.quiz_progress {
			next.quiz_progress.entry(id.clone()).or_insert(*score);
		}

		let change = StateChange {
			fields: StateFields::between(&self.state, &next),
			state: next,
		};
		if let Err(source) = self.persist(&change).await {
			return Err(StateWriteError { change, source });
		}
		Ok(self.apply(change))
	}

	/// Applies a write whose persistence failed, keeping it in memory only.
	pub fn proceed_unpersisted(&mut self, change: StateChange) -> StateChange {
		tracing::warn!(fields = ?change.fields, "proceeding with unpersisted state");
		self.apply(change)
	}

	async fn persist(&self, change: &StateChange) -> Result<(), PersistenceError> {
		if !change.fields.intersects(StateFields::PERSISTED) {
			return Ok(());
		}
		if change.fields.contains(StateFields::ACTIVE_FEATURE) {
			store(self.kv.as_ref(), ACTIVE_FEATURE_KEY, &change.state.active_feature).await?;
		}
		if change.fields.contains(StateFields::QUIZ_PROGRESS) {
			store(self.kv.as_ref(), QUIZ_PROGRESS_KEY, &change.state.quiz_progress).await?;
		}
		Ok(())
	}

	fn apply(&mut self, change: StateChange) -> StateChange {
		self.state = change.state.clone();
		if !change.fields.is_empty() {
			self.changed.send_replace(change.clone());
			tracing::debug!(fields = ?change.fields, "state changed");
		}
		change
	}
}

async fn load<T: DeserializeOwned>(kv: &dyn KvStore, key: &str) -> Option<T> {
	let value = match kv.get(key).await {
		Ok(Some(value)) => value,
		Ok(None) => return None,
		Err(err) => {
			tracing::warn!(error = %err, key, "failed to read persisted state; using default");
			return None;
		}
	};
	match serde_json::from_value(value) {
		Ok(parsed) => Some(parsed),
		Err(error) => {
			let err = PersistenceError::Decode {
				key: key.to_string(),
				error,
			};
			tracing::warn!(error = %err, "ignoring malformed persisted state");
			None
		}
	}
}

async fn store<T: serde::Serialize>(kv: &dyn KvStore, key: &str, value: &T) -> Result<(), PersistenceError> {
	let value: Value = serde_json::to_value(value).map_err(|error| PersistenceError::Encode {
		key: key.to_string(),
		error,
	})?;
	kv.update(key, value).await
}
