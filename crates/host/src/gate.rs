//! Readiness-gated delivery.
//!
//! A surface's bootstrap races with the host's broadcasts. Until the surface
//! completes its handshake, snapshot messages are dropped (a fresh snapshot is
//! sent on readiness) and one-shot results are queued, then flushed in arrival
//! order the moment the surface becomes ready.

use std::collections::{HashMap, VecDeque};

use devpilot_proto::{DeliveryClass, Message, SurfaceId};

use crate::error::TransportError;
use crate::registry::{ReadyTransition, SurfacePhase, SurfaceRegistry};

/// What happened to one `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
	/// Pushed onto the surface's channel.
	Delivered,
	/// Held until the surface is ready.
	Queued,
	/// Snapshot for a surface that is not ready yet.
	Dropped,
	/// The surface is detached.
	Discarded,
	/// The surface's channel is closed.
	Failed(TransportError),
}

/// Outcome of [`ReadinessGate::mark_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flush {
	/// Registry transition.
	pub transition: ReadyTransition,
	/// Number of queued messages delivered.
	pub flushed: usize,
	/// Set when the channel closed while flushing.
	pub failed: Option<TransportError>,
}

/// Per-surface pending queues for one-shot results.
#[derive(Debug, Default)]
pub struct ReadinessGate {
	pending: HashMap<SurfaceId, VecDeque<Message>>,
}

impl ReadinessGate {
	/// Creates a gate with no pending messages.
	pub fn new() -> Self {
		Self::default()
	}

	/// Delivers, queues or drops `msg` according to the surface's phase.
	pub fn send(&mut self, registry: &SurfaceRegistry, surface: SurfaceId, msg: Message) -> Delivery {
		match registry.phase(surface) {
			SurfacePhase::Detached => {
				tracing::trace!(%surface, kind = msg.kind(), "discarding message for detached surface");
				Delivery::Discarded
			}
			SurfacePhase::Ready => deliver(registry, surface, msg),
			SurfacePhase::NotReady => match msg.delivery() {
				DeliveryClass::Snapshot => {
					tracing::trace!(%surface, kind = msg.kind(), "dropping snapshot before handshake");
					Delivery::Dropped
				}
				DeliveryClass::OneShot => {
					tracing::trace!(%surface, kind = msg.kind(), "queueing result until handshake");
					self.pending.entry(surface).or_default().push_back(msg);
					Delivery::Queued
				}
			},
		}
	}

	/// Marks the surface ready and flushes its queue on the first transition.
	pub fn mark_ready(&mut self, registry: &mut SurfaceRegistry, surface: SurfaceId) -> Flush {
		let transition = registry.mark_ready(surface);
		let mut flush = Flush {
			transition,
			flushed: 0,
			failed: None,
		};
		if transition != ReadyTransition::Became {
			return flush;
		}
		let Some(queue) = self.pending.remove(&surface) else {
			return flush;
		};
		for msg in queue {
			match deliver(registry, surface, msg) {
				Delivery::Delivered => flush.flushed += 1,
				Delivery::Failed(err) => {
					flush.failed = Some(err);
					break;
				}
				_ => {}
			}
		}
		flush
	}

	/// Drops every message queued for `surface`. Returns how many were dropped.
	pub fn release(&mut self, surface: SurfaceId) -> usize {
		self.pending.remove(&surface).map_or(0, |queue| queue.len())
	}

	#[cfg(test)]
	pub(crate) fn queued(&self, surface: SurfaceId) -> usize {
		self.pending.get(&surface).map_or(0, VecDeque::len)
	}
}

fn deliver(registry: &SurfaceRegistry, surface: SurfaceId, msg: Message) -> Delivery {
	let Some(sink) = registry.sink(surface) else {
		return Delivery::Discarded;
	};
	match sink.deliver(surface, msg) {
		Ok(()) => Delivery::Delivered,
		Err(err) => Delivery::Failed(err),
	}
}
