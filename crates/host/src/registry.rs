//! Attached surfaces, their kind and their readiness.

use std::collections::BTreeMap;

use devpilot_proto::{Message, SurfaceId, SurfaceKind};
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Outbound channel to one surface. The surface's container owns the other end.
#[derive(Debug, Clone)]
pub struct SurfaceSink {
	tx: mpsc::UnboundedSender<Message>,
}

impl SurfaceSink {
	/// Wraps a channel sender.
	pub fn from_sender(tx: mpsc::UnboundedSender<Message>) -> Self {
		Self { tx }
	}

	/// Creates a sink and the receiver the container drains.
	pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self::from_sender(tx), rx)
	}

	/// Pushes `msg` onto the channel.
	pub fn deliver(&self, surface: SurfaceId, msg: Message) -> Result<(), TransportError> {
		self.tx.send(msg).map_err(|_| TransportError::Closed(surface))
	}
}

/// Lifecycle phase of a surface: `NotReady -> Ready -> Detached`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfacePhase {
	/// Attached, still bootstrapping.
	NotReady,
	/// Handshake completed.
	Ready,
	/// Gone. Terminal; also reported for handles that were never issued.
	Detached,
}

/// Outcome of [`SurfaceRegistry::mark_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyTransition {
	/// The surface moved from `NotReady` to `Ready`.
	Became,
	/// The surface was already `Ready`; nothing changed.
	Already,
	/// The surface is detached; nothing changed.
	Detached,
}

#[derive(Debug)]
struct Entry {
	kind: SurfaceKind,
	ready: bool,
	sink: SurfaceSink,
}

/// Registry of attached surfaces, keyed by monotonically allocated ids.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
	next_id: u64,
	entries: BTreeMap<SurfaceId, Entry>,
}

impl SurfaceRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a new surface in `NotReady`.
	pub fn attach(&mut self, kind: SurfaceKind, sink: SurfaceSink) -> SurfaceId {
		self.next_id += 1;
		let id = SurfaceId(self.next_id);
		self.entries.insert(id, Entry { kind, ready: false, sink });
		id
	}

	/// Removes a surface. Returns false if it was not attached.
	pub fn detach(&mut self, id: SurfaceId) -> bool {
		self.entries.remove(&id).is_some()
	}

	/// Moves a surface to `Ready`. Repeated calls are no-ops.
	pub fn mark_ready(&mut self, id: SurfaceId) -> ReadyTransition {
		match self.entries.get_mut(&id) {
			None => ReadyTransition::Detached,
			Some(entry) if entry.ready => ReadyTransition::Already,
			Some(entry) => {
				entry.ready = true;
				ReadyTransition::Became
			}
		}
	}

	/// Returns the phase of `id`.
	pub fn phase(&self, id: SurfaceId) -> SurfacePhase {
		match self.entries.get(&id) {
			None => SurfacePhase::Detached,
			Some(entry) if entry.ready => SurfacePhase::Ready,
			Some(_) => SurfacePhase::NotReady,
		}
	}

	/// Returns the kind of an attached surface.
	pub fn kind(&self, id: SurfaceId) -> Option<SurfaceKind> {
		self.entries.get(&id).map(|entry| entry.kind)
	}

	/// Returns the outbound sink of an attached surface.
	pub fn sink(&self, id: SurfaceId) -> Option<&SurfaceSink> {
		self.entries.get(&id).map(|entry| &entry.sink)
	}

	/// Lists attached surfaces in attach order, optionally only those of `kind`.
	pub fn list(&self, kind: Option<SurfaceKind>) -> Vec<SurfaceId> {
		self.entries
			.iter()
			.filter(|(_, entry)| kind.is_none_or(|k| entry.kind == k))
			.map(|(id, _)| *id)
			.collect()
	}

	/// Number of attached surfaces.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true when no surface is attached.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sink() -> SurfaceSink {
		SurfaceSink::channel().0
	}

	#[test]
	fn lifecycle_is_one_way() {
		let mut reg = SurfaceRegistry::new();
		let id = reg.attach(SurfaceKind::Primary, sink());
		assert_eq!(reg.phase(id), SurfacePhase::NotReady);
		assert_eq!(reg.mark_ready(id), ReadyTransition::Became);
		assert_eq!(reg.mark_ready(id), ReadyTransition::Already);
		assert_eq!(reg.phase(id), SurfacePhase::Ready);
		assert!(reg.detach(id));
		assert_eq!(reg.phase(id), SurfacePhase::Detached);
		assert_eq!(reg.mark_ready(id), ReadyTransition::Detached);
		assert!(!reg.detach(id));
	}

	#[test]
	fn ids_are_never_reused() {
		let mut reg = SurfaceRegistry::new();
		let a = reg.attach(SurfaceKind::Overlay, sink());
		reg.detach(a);
		let b = reg.attach(SurfaceKind::Overlay, sink());
		assert_ne!(a, b);
		assert_eq!(reg.phase(a), SurfacePhase::Detached);
	}

	#[test]
	fn list_filters_by_kind() {
		let mut reg = SurfaceRegistry::new();
		let p1 = reg.attach(SurfaceKind::Primary, sink());
		let s = reg.attach(SurfaceKind::Secondary, sink());
		let p2 = reg.attach(SurfaceKind::Primary, sink());
		assert_eq!(reg.list(None), vec![p1, s, p2]);
		assert_eq!(reg.list(Some(SurfaceKind::Primary)), vec![p1, p2]);
		assert!(reg.list(Some(SurfaceKind::Overlay)).is_empty());
	}
}
