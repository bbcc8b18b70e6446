//! Per-kind debounce windows for high-frequency editor events.
//!
//! # Design
//!
//! Each event kind owns at most one slot: the deadline at which it fires and
//! the most recent producer scheduled for it. A new [`Debouncer::schedule`]
//! for the same kind pushes the deadline out and replaces the producer, so
//! only the latest representative of a burst ever runs. The owner drives the
//! timer: it sleeps until [`Debouncer::next_deadline`] and then collects the
//! producers returned by [`Debouncer::take_due`].
//!
//! Time is always passed in explicitly, which keeps the type free of timers
//! and lets tests run against tokio's paused clock.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

/// Default quiescence window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(crate::config::DEFAULT_DEBOUNCE_MS);

#[derive(Debug)]
struct Slot<P> {
	deadline: Instant,
	producer: P,
}

/// Coalesces bursts of `schedule` calls per kind `K` into one producer `P`.
#[derive(Debug)]
pub struct Debouncer<K, P> {
	window: Duration,
	slots: HashMap<K, Slot<P>>,
}

impl<K, P> Default for Debouncer<K, P> {
	fn default() -> Self {
		Self::new(DEFAULT_WINDOW)
	}
}

impl<K, P> Debouncer<K, P> {
	/// Creates a debouncer with the given quiescence window.
	pub fn new(window: Duration) -> Self {
		Self {
			window,
			slots: HashMap::new(),
		}
	}

	/// Earliest pending deadline across all kinds.
	pub fn next_deadline(&self) -> Option<Instant> {
		self.slots.values().map(|slot| slot.deadline).min()
	}

	#[cfg(test)]
	fn pending(&self) -> usize {
		self.slots.len()
	}
}

impl<K: Eq + Hash + Copy, P> Debouncer<K, P> {
	/// Records an occurrence of `kind` at `now` with `producer` as its latest
	/// representative. Restarts the window and replaces any pending producer.
	pub fn schedule(&mut self, kind: K, producer: P, now: Instant) {
		self.slots.insert(
			kind,
			Slot {
				deadline: now + self.window,
				producer,
			},
		);
	}

	/// Removes and returns every producer whose window has elapsed at `now`.
	pub fn take_due(&mut self, now: Instant) -> Vec<(K, P)> {
		let due: Vec<K> = self
			.slots
			.iter()
			.filter(|(_, slot)| slot.deadline <= now)
			.map(|(kind, _)| *kind)
			.collect();
		due.into_iter()
			.filter_map(|kind| self.slots.remove(&kind).map(|slot| (kind, slot.producer)))
			.collect()
	}

	#[cfg(test)]
	fn is_pending(&self, kind: K) -> bool {
		self.slots.contains_key(&kind)
	}
}
