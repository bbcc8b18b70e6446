//! Fan-out of host messages to every registered surface.

use devpilot_proto::{Message, SurfaceId, SurfaceKind};

use crate::gate::{Delivery, Flush, ReadinessGate};
use crate::registry::{SurfacePhase, SurfaceRegistry, SurfaceSink};

/// Tally of one [`Broadcaster::publish`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
	/// Surfaces the message was pushed to.
	pub delivered: usize,
	/// Surfaces that will receive it after their handshake.
	pub queued: usize,
	/// Not-ready surfaces that skipped a snapshot.
	pub dropped: usize,
	/// Surfaces detached because their channel was closed.
	pub failed: Vec<SurfaceId>,
}

/// Owns the surface registry and readiness gate, and routes every outbound
/// message through them.
///
/// A send that fails because the container dropped its channel detaches the
/// surface.
#[derive(Debug, Default)]
pub struct Broadcaster {
	registry: SurfaceRegistry,
	gate: ReadinessGate,
}

impl Broadcaster {
	/// Creates an empty broadcaster.
	pub fn new() -> Self {
		Self::default()
	}

	/// Read access to the registry.
	pub fn registry(&self) -> &SurfaceRegistry {
		&self.registry
	}

	/// Registers a surface in `NotReady`.
	pub fn attach(&mut self, kind: SurfaceKind, sink: SurfaceSink) -> SurfaceId {
		let id = self.registry.attach(kind, sink);
		tracing::info!(surface = %id, %kind, "surface attached");
		id
	}

	/// Removes a surface and releases anything queued for it.
	pub fn detach(&mut self, surface: SurfaceId) -> bool {
		let released = self.gate.release(surface);
		let removed = self.registry.detach(surface);
		if removed {
			tracing::info!(%surface, released, "surface detached");
		}
		removed
	}

	/// Completes a surface's handshake, flushing queued results.
	pub fn mark_ready(&mut self, surface: SurfaceId) -> Flush {
		let flush = self.gate.mark_ready(&mut self.registry, surface);
		if let Some(err) = flush.failed {
			tracing::warn!(%surface, error = %err, "flush failed; detaching surface");
			self.detach(surface);
		}
		flush
	}

	/// Sends one message to one surface through the gate.
	pub fn send(&mut self, surface: SurfaceId, msg: impl Into<Message>) -> Delivery {
		let delivery = self.gate.send(&self.registry, surface, msg.into());
		if let Delivery::Failed(err) = delivery {
			tracing::warn!(%surface, error = %err, "send failed; detaching surface");
			self.detach(surface);
		}
		delivery
	}

	/// Sends `msg` to every surface registered at the moment of the call.
	pub fn publish(&mut self, msg: impl Into<Message>) -> PublishReport {
		let msg = msg.into();
		let mut report = PublishReport::default();
		for surface in self.registry.list(None) {
			match self.send(surface, msg.clone()) {
				Delivery::Delivered => report.delivered += 1,
				Delivery::Queued => report.queued += 1,
				Delivery::Dropped => report.dropped += 1,
				Delivery::Failed(_) => report.failed.push(surface),
				Delivery::Discarded => {}
			}
		}
		report
	}

	/// Returns the phase of a surface.
	pub fn phase(&self, surface: SurfaceId) -> SurfacePhase {
		self.registry.phase(surface)
	}
}
