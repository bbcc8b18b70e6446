//! Synchronization bus between the devpilot host and its display surfaces.
//!
//! The host owns one canonical [`AppState`](state::AppState) and any number of
//! attached surfaces. Outbound traffic goes through the
//! [`Broadcaster`](broadcast::Broadcaster), which consults the
//! [`ReadinessGate`](gate::ReadinessGate) per surface; high-frequency editor
//! events pass through a [`Debouncer`](debounce::Debouncer) first; inbound
//! surface messages are dispatched by the router. Everything runs inside one
//! [`HostService`] actor, reached through a cloneable [`HostHandle`].

pub mod broadcast;
pub mod collab;
pub mod config;
pub mod debounce;
pub mod error;
pub mod gate;
pub mod registry;
mod router;
pub mod service;
pub mod state;
pub mod subscription;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;

pub use collab::{
	Collaborators, CredentialStore, EditorEvent, EditorEventSink, EditorSource, GenerationKind, GenerationService, KvStore, SourceScanner,
	Workbench,
};
pub use config::{Config, ConfigError};
pub use error::{GenerationError, HostError, PersistenceError, SourceError, TransportError, ValidationError};
pub use service::{HostHandle, HostService, SurfaceLink};
pub use subscription::{Subscription, SubscriptionSet};
