use devpilot_proto::{HostMessage, Message, SurfaceId, SurfaceKind};
use tokio::sync::oneshot;

use crate::registry::SurfaceSink;
use crate::state::AppState;

/// Commands for the host service actor.
#[derive(Debug)]
pub enum HostCmd {
	/// Register a new surface.
	Attach {
		/// Role of the surface.
		kind: SurfaceKind,
		/// Outbound channel owned by the surface's container.
		sink: SurfaceSink,
		/// Reply channel for the allocated id.
		reply: oneshot::Sender<SurfaceId>,
	},
	/// Remove a surface.
	Detach {
		/// The surface identity.
		surface: SurfaceId,
	},
	/// A message received from a surface.
	Inbound {
		/// Originating surface.
		surface: SurfaceId,
		/// The received envelope.
		message: Message,
	},
	/// Result of background work bound for one surface.
	Deliver {
		/// Requesting surface.
		surface: SurfaceId,
		/// Result message.
		message: HostMessage,
	},
	/// Result of background work bound for every surface.
	Publish {
		/// Start order of the task that produced `messages`.
		ticket: u64,
		/// Messages in publish order.
		messages: Vec<HostMessage>,
	},
	/// Read the current application state.
	Snapshot {
		/// Reply channel for the state.
		reply: oneshot::Sender<AppState>,
	},
	/// Stop the service and cancel its subscriptions.
	Shutdown {
		/// Reply channel signalled once stopped.
		reply: oneshot::Sender<()>,
	},
}
