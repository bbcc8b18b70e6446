use std::collections::HashMap;

use devpilot_proto::FeatureId;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

use super::commands::HostCmd;
use super::context::{HostContext, Tasks};
use super::handle::HostHandle;
use crate::broadcast::Broadcaster;
use crate::collab::{Collaborators, EditorEvent, EditorEventSink};
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::router;
use crate::state::StateStore;
use crate::subscription::SubscriptionSet;

/// Capacity of the command channel.
const COMMAND_CAPACITY: usize = 256;

/// The host actor. Owns the [`HostContext`] and reacts to one event at a time.
pub struct HostService {
	rx: mpsc::Receiver<HostCmd>,
	events_rx: mpsc::UnboundedReceiver<EditorEvent>,
	events: EditorEventSink,
	tasks: Tasks,
	collab: Collaborators,
	config: Config,
}

impl HostService {
	/// Spawns the host service and returns its handle.
	///
	/// Persisted state is restored before the first command is handled.
	pub fn start(config: Config, collab: Collaborators) -> HostHandle {
		let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let events = EditorEventSink::from_sender(events_tx);

		let service = Self {
			rx,
			events_rx,
			events: events.clone(),
			tasks: Tasks::new(tx.downgrade()),
			collab,
			config,
		};

		tokio::spawn(service.run());

		HostHandle::new(tx, events)
	}

	async fn run(self) {
		let Self {
			mut rx,
			mut events_rx,
			events,
			tasks,
			collab,
			config,
		} = self;

		let state = StateStore::restore(collab.kv.clone(), collab.workbench.current_theme()).await;
		let mut subscriptions = SubscriptionSet::new();
		match collab.editor.subscribe(events) {
			Ok(sub) => subscriptions.push(sub),
			Err(err) => tracing::warn!(error = %err, "editor source unavailable; running without change events"),
		}

		let mut ctx = HostContext {
			state_changes: state.subscribe(),
			state,
			bus: Broadcaster::new(),
			debouncer: Debouncer::new(config.host.debounce()),
			features: config.host.features.iter().map(|f| FeatureId::new(f.as_str())).collect(),
			marker_glob: config.markers.glob.clone(),
			credential_key: config.generation.credential_key.clone(),
			collab,
			tasks,
			delivered: HashMap::new(),
		};
		router::startup(&mut ctx);
		tracing::info!("host service started");

		loop {
			let deadline = ctx.debouncer.next_deadline();
			tokio::select! {
				cmd = rx.recv() => {
					let Some(cmd) = cmd else {
						break;
					};
					match cmd {
						HostCmd::Attach { kind, sink, reply } => {
							let id = ctx.bus.attach(kind, sink);
							let _ = reply.send(id);
						}
						HostCmd::Detach { surface } => {
							ctx.bus.detach(surface);
						}
						HostCmd::Inbound { surface, message } => {
							router::dispatch(&mut ctx, surface, message).await;
						}
						HostCmd::Deliver { surface, message } => {
							ctx.bus.send(surface, message);
						}
						HostCmd::Publish { ticket, messages } => {
							ctx.publish_latest(ticket, messages);
						}
						HostCmd::Snapshot { reply } => {
							let _ = reply.send(ctx.state.read().clone());
						}
						HostCmd::Shutdown { reply } => {
							subscriptions.cancel_all();
							let _ = reply.send(());
							break;
						}
					}
				}
				Some(event) = events_rx.recv() => {
					router::editor_event(&mut ctx, event).await;
				}
				() = wait_until(deadline) => {
					ctx.fire_due();
				}
			}
		}

		subscriptions.cancel_all();
		for surface in ctx.bus.registry().list(None) {
			ctx.bus.detach(surface);
		}
		tracing::info!("host service stopped");
	}
}

async fn wait_until(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}
