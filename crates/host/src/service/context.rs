//! The single owned context every handler runs against.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;

use devpilot_proto::{FeatureId, HostMessage, SurfaceId};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use super::commands::HostCmd;
use crate::broadcast::Broadcaster;
use crate::collab::Collaborators;
use crate::debounce::Debouncer;
use crate::state::{AppState, StateChange, StateFields, StateStore};

/// Debounced editor-derived updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum DebounceKey {
	/// Active editor snapshot and marker scan.
	EditorSync,
	/// Diff of the last changed resource.
	FileDiff,
}

/// Deferred computation of the messages a debounced event publishes.
pub(crate) type Producer = Pin<Box<dyn Future<Output = Vec<HostMessage>> + Send>>;

/// Runs collaborator calls off the event loop and posts their results back.
///
/// Holds a weak sender so in-flight work never keeps a stopped service alive.
/// Broadcast work is stamped with a ticket in the order it is started; the
/// actor uses it to drop results that finish after a newer one.
#[derive(Debug)]
pub(crate) struct Tasks {
	tx: mpsc::WeakSender<HostCmd>,
	issued: u64,
}

impl Tasks {
	pub(crate) fn new(tx: mpsc::WeakSender<HostCmd>) -> Self {
		Self { tx, issued: 0 }
	}

	/// Computes a result for `surface` alone.
	pub(crate) fn reply(&self, surface: SurfaceId, work: impl Future<Output = HostMessage> + Send + 'static) {
		let tx = self.tx.clone();
		tokio::spawn(async move {
			let message = work.await;
			post(&tx, HostCmd::Deliver { surface, message }).await;
		});
	}

	/// Computes messages for every surface.
	pub(crate) fn publish(&mut self, work: impl Future<Output = Vec<HostMessage>> + Send + 'static) {
		self.issued += 1;
		let ticket = self.issued;
		let tx = self.tx.clone();
		tokio::spawn(async move {
			let messages = work.await;
			if !messages.is_empty() {
				post(&tx, HostCmd::Publish { ticket, messages }).await;
			}
		});
	}
}

async fn post(tx: &mpsc::WeakSender<HostCmd>, cmd: HostCmd) {
	match tx.upgrade() {
		Some(tx) => {
			if tx.send(cmd).await.is_err() {
				tracing::debug!("host stopped before background result arrived");
			}
		}
		None => tracing::debug!("host stopped before background result arrived"),
	}
}

/// Everything the host owns: canonical state, the surface table and the
/// collaborators. Passed by `&mut` into every handler; nothing else mutates it.
pub(crate) struct HostContext {
	pub(crate) state: StateStore,
	/// Applied writes not yet broadcast.
	pub(crate) state_changes: watch::Receiver<StateChange>,
	pub(crate) bus: Broadcaster,
	pub(crate) debouncer: Debouncer<DebounceKey, Producer>,
	pub(crate) collab: Collaborators,
	pub(crate) features: BTreeSet<FeatureId>,
	pub(crate) marker_glob: String,
	pub(crate) credential_key: String,
	pub(crate) tasks: Tasks,
	/// Ticket of the last broadcast delivered per message tag.
	pub(crate) delivered: HashMap<&'static str, u64>,
}

impl HostContext {
	/// Writes state, then broadcasts the fields it changed.
	///
	/// On a persistence failure logs it and keeps the value in memory.
	pub(crate) async fn write_state(&mut self, mutate: impl FnOnce(&mut AppState)) {
		if let Err(err) = self.state.write(mutate).await {
			tracing::warn!(error = %err.source, "failed to persist state");
			self.state.proceed_unpersisted(err.change);
		}
		self.publish_state_change();
	}

	fn publish_state_change(&mut self) {
		if !matches!(self.state_changes.has_changed(), Ok(true)) {
			return;
		}
		let StateChange { state, fields } = self.state_changes.borrow_and_update().clone();
		if fields.contains(StateFields::THEME) {
			self.publish(HostMessage::Theme { kind: state.theme_kind });
		}
		if fields.contains(StateFields::ACTIVE_FEATURE) {
			self.publish(HostMessage::SwitchFeature {
				feature: state.active_feature,
			});
		}
		if fields.contains(StateFields::QUIZ_PROGRESS) {
			self.publish(HostMessage::QuizProgress(state.quiz_progress));
		}
	}

	/// Broadcasts one message to every registered surface.
	pub(crate) fn publish(&mut self, message: HostMessage) {
		let tag = message.tag();
		let report = self.bus.publish(message);
		if report.failed.is_empty() {
			tracing::trace!(
				tag,
				delivered = report.delivered,
				queued = report.queued,
				dropped = report.dropped,
				"published"
			);
		} else {
			tracing::debug!(tag, failed = ?report.failed, "publish detached closed surfaces");
		}
	}

	/// Hands every producer whose window elapsed to a background task.
	pub(crate) fn fire_due(&mut self) {
		for (key, producer) in self.debouncer.take_due(Instant::now()) {
			tracing::trace!(?key, "debounce window elapsed");
			self.tasks.publish(producer);
		}
	}

	/// Broadcasts background results unless a later-started task already
	/// delivered the same message type.
	pub(crate) fn publish_latest(&mut self, ticket: u64, messages: Vec<HostMessage>) {
		for message in messages {
			let tag = message.tag();
			let last = self.delivered.entry(tag).or_default();
			if *last > ticket {
				tracing::debug!(tag, ticket, latest = *last, "dropping superseded result");
				continue;
			}
			*last = ticket;
			self.publish(message);
		}
	}

	/// Messages that bring a freshly ready surface up to date.
	pub(crate) fn snapshot_messages(&self) -> Vec<HostMessage> {
		let state = self.state.read();
		let mut messages = vec![
			HostMessage::Theme { kind: state.theme_kind },
			HostMessage::SwitchFeature {
				feature: state.active_feature.clone(),
			},
		];
		if !state.quiz_progress.is_empty() {
			messages.push(HostMessage::QuizProgress(state.quiz_progress.clone()));
		}
		messages
	}
}
