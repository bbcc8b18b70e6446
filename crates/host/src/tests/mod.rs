//! Service-level tests driving the host actor through its handle.

use std::time::Duration;

use devpilot_proto::{Message, SurfaceId, SurfaceKind};
use serde_json::Value;

use crate::collab::EditorEvent;
use crate::config::Config;
use crate::service::{HostHandle, HostService, SurfaceLink};
use crate::testing::Fakes;

mod generation;

pub(super) struct Harness {
	pub host: HostHandle,
	pub fakes: Fakes,
}

impl Harness {
	pub async fn start(fakes: Fakes) -> Self {
		let host = HostService::start(Config::default(), fakes.collaborators());
		settle().await;
		Self { host, fakes }
	}

	pub async fn surface(&self, kind: SurfaceKind) -> TestSurface {
		let link = self.host.attach(kind).await.expect("attach surface");
		TestSurface {
			host: self.host.clone(),
			link,
		}
	}

	pub async fn ready_surface(&self, kind: SurfaceKind) -> TestSurface {
		let mut surface = self.surface(kind).await;
		surface.send("ready", Value::Null).await;
		settle().await;
		surface.drain();
		surface
	}

	pub fn editor_event(&self, event: EditorEvent) {
		self.host.editor_event(event).expect("host running");
	}
}

pub(super) struct TestSurface {
	host: HostHandle,
	pub link: SurfaceLink,
}

impl TestSurface {
	pub fn id(&self) -> SurfaceId {
		self.link.id
	}

	pub async fn send(&self, kind: &str, payload: Value) {
		self.host
			.post(self.link.id, Message::new(kind, payload))
			.await
			.expect("host running");
	}

	pub fn drain(&mut self) -> Vec<Message> {
		let mut out = Vec::new();
		while let Ok(msg) = self.link.outbound.try_recv() {
			out.push(msg);
		}
		out
	}

	/// Waits for background work, then returns everything received.
	pub async fn received(&mut self) -> Vec<Message> {
		settle().await;
		self.drain()
	}
}

/// Lets the host and its background tasks run to idle without reaching a
/// debounce deadline.
pub(super) async fn settle() {
	tokio::time::sleep(Duration::from_millis(5)).await;
}

pub(super) fn kinds(messages: &[Message]) -> Vec<&str> {
	messages.iter().map(Message::kind).collect()
}

pub(super) fn find<'a>(messages: &'a [Message], kind: &str) -> &'a Value {
	messages
		.iter()
		.find(|m| m.kind() == kind)
		.map(Message::payload)
		.unwrap_or_else(|| panic!("no `{kind}` in {:?}", kinds(messages)))
}
