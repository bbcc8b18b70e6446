use devpilot_proto::{Message, SurfaceId, SurfaceKind};
use tokio::sync::mpsc;

use super::commands::HostCmd;
use crate::collab::{EditorEvent, EditorEventSink};
use crate::error::HostError;
use crate::registry::SurfaceSink;
use crate::state::AppState;
use crate::subscription::Subscription;

/// An attached surface as seen by its container.
#[derive(Debug)]
pub struct SurfaceLink {
	/// Host-allocated identity.
	pub id: SurfaceId,
	/// Messages the host sends to the surface, in send order.
	pub outbound: mpsc::UnboundedReceiver<Message>,
	/// Detaches the surface when cancelled.
	pub subscription: Subscription,
}

/// Handle for communicating with the [`HostService`](super::HostService).
#[derive(Clone, Debug)]
pub struct HostHandle {
	tx: mpsc::Sender<HostCmd>,
	events: EditorEventSink,
}

impl HostHandle {
	/// Wraps a command sender and editor event sink in a typed handle.
	pub fn new(tx: mpsc::Sender<HostCmd>, events: EditorEventSink) -> Self {
		Self { tx, events }
	}

	/// Registers a new surface of `kind`. It starts `NotReady`.
	pub async fn attach(&self, kind: SurfaceKind) -> Result<SurfaceLink, HostError> {
		let (sink, outbound) = SurfaceSink::channel();
		let (reply, rx) = tokio::sync::oneshot::channel();
		self.send(HostCmd::Attach { kind, sink, reply }).await?;
		let id = rx.await.map_err(|_| HostError::Stopped)?;

		let tx = self.tx.clone();
		let subscription = Subscription::new(move || {
			if let Err(mpsc::error::TrySendError::Full(cmd)) = tx.try_send(HostCmd::Detach { surface: id })
				&& let Ok(rt) = tokio::runtime::Handle::try_current()
			{
				rt.spawn(async move {
					let _ = tx.send(cmd).await;
				});
			}
		});
		Ok(SurfaceLink {
			id,
			outbound,
			subscription,
		})
	}

	/// Removes a surface.
	pub async fn detach(&self, surface: SurfaceId) -> Result<(), HostError> {
		self.send(HostCmd::Detach { surface }).await
	}

	/// Hands a message received from `surface` to the router.
	pub async fn post(&self, surface: SurfaceId, message: Message) -> Result<(), HostError> {
		self.send(HostCmd::Inbound { surface, message }).await
	}

	/// Forwards an editor event as if the editor source emitted it.
	pub fn editor_event(&self, event: EditorEvent) -> Result<(), HostError> {
		if self.events.emit(event) {
			Ok(())
		} else {
			Err(HostError::Stopped)
		}
	}

	/// Returns the sink editor sources deliver events to.
	pub fn editor_events(&self) -> EditorEventSink {
		self.events.clone()
	}

	/// Reads the current application state.
	pub async fn state(&self) -> Result<AppState, HostError> {
		let (reply, rx) = tokio::sync::oneshot::channel();
		self.send(HostCmd::Snapshot { reply }).await?;
		rx.await.map_err(|_| HostError::Stopped)
	}

	/// Stops the service. Resolves once its subscriptions are cancelled.
	pub async fn shutdown(&self) -> Result<(), HostError> {
		let (reply, rx) = tokio::sync::oneshot::channel();
		self.send(HostCmd::Shutdown { reply }).await?;
		rx.await.map_err(|_| HostError::Stopped)
	}

	async fn send(&self, cmd: HostCmd) -> Result<(), HostError> {
		self.tx.send(cmd).await.map_err(|_| HostError::Stopped)
	}
}
