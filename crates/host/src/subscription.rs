//! Explicit cancellation handles for attachments and event subscriptions.

use std::fmt;

use tokio_util::sync::CancellationToken;

/// A single `cancel()` capability returned by every attach or subscribe call.
///
/// Cancelling is idempotent. Dropping a subscription does not cancel it;
/// collect subscriptions in a [`SubscriptionSet`] to tear them down together.
pub struct Subscription {
	cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
	/// Wraps an arbitrary teardown action.
	pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
		Self {
			cancel: Some(Box::new(cancel)),
		}
	}

	/// Returns a subscription that cancels `token`.
	pub fn from_token(token: CancellationToken) -> Self {
		Self::new(move || token.cancel())
	}

	/// Returns a subscription with nothing to tear down.
	pub fn noop() -> Self {
		Self { cancel: None }
	}

	/// Runs the teardown action, if it has not run yet.
	pub fn cancel(&mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel();
		}
	}

	/// Returns true once [`cancel`](Self::cancel) has run.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_none()
	}
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("cancelled", &self.is_cancelled())
			.finish()
	}
}

/// Subscriptions cancelled together on teardown.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
	items: Vec<Subscription>,
}

impl SubscriptionSet {
	/// Creates an empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a subscription.
	pub fn push(&mut self, sub: Subscription) {
		self.items.push(sub);
	}

	/// Number of live subscriptions.
	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// Returns true when the set holds nothing.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Cancels every subscription in reverse registration order.
	pub fn cancel_all(&mut self) {
		while let Some(mut sub) = self.items.pop() {
			sub.cancel();
		}
	}
}
