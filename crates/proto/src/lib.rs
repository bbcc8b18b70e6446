//! Shared vocabulary between the devpilot host and its display surfaces.
//!
//! Surfaces and the host exchange JSON [`Message`] envelopes. The host side
//! speaks [`HostMessage`], surfaces speak [`SurfaceMessage`], and each tag has
//! a [`DeliveryClass`] deciding what happens to it while a surface is still
//! loading.

pub mod message;
pub mod paths;
pub mod types;

pub use message::{
	ApplyEditRequest, ChatRequest, CommandOutcome, CommandRequest, CommitRequest, DeliveryClass, Feedback, HostMessage, Message, PayloadError,
	Reply, SurfaceMessage, tag,
};
pub use types::{
	EditorSnapshot, FeatureId, Marker, Position, QuizId, QuizScore, Range, Selection, SurfaceId, SurfaceKind, TextEdit, ThemeKind,
	UnknownSurfaceKind, UnknownThemeKind,
};
