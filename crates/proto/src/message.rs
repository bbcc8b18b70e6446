//! Message envelope and typed views for both directions.
//!
//! Every frame on a surface channel is a [`Message`]: `{ "type": tag, "payload": json }`.
//! The host produces frames from [`HostMessage`] and interprets inbound frames as
//! [`SurfaceMessage`]. Tags outside the recognised sets are carried through
//! untouched and ignored by the receiver.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{EditorSnapshot, FeatureId, Marker, QuizId, QuizScore, Selection, TextEdit, ThemeKind};

/// Wire tags for recognised message types.
pub mod tag {
	/// Host → surface: active editor snapshot.
	pub const ACTIVE_EDITOR: &str = "activeEditor";
	/// Host → surface: current selections.
	pub const CURSOR_SELECTION: &str = "cursorSelection";
	/// Host → surface: diff of the last changed resource.
	pub const FILE_DIFF: &str = "fileDiff";
	/// Host → surface: marker scan result.
	pub const TODOS_RESULT: &str = "todosResult";
	/// Host → surface: generated commit message.
	pub const COMMIT_RESULT: &str = "commitResult";
	/// Host → surface: chat answer.
	pub const CHAT_REPLY: &str = "chatReply";
	/// Host → surface: theme kind.
	pub const THEME: &str = "theme";
	/// Host → surface: active feature.
	pub const SWITCH_FEATURE: &str = "switchFeature";
	/// Host → surface: quiz progress map.
	pub const QUIZ_PROGRESS: &str = "quizProgress";
	/// Host → surface: result of an edit application.
	pub const APPLY_EDIT_RESULT: &str = "applyEditResult";
	/// Host → surface: result of a generic command.
	pub const COMMAND_RESULT: &str = "commandResult";

	/// Surface → host: request the active editor snapshot.
	pub const REQUEST_ACTIVE_EDITOR: &str = "requestActiveEditor";
	/// Surface → host: generate a commit message.
	pub const GENERATE_COMMIT: &str = "generateCommit";
	/// Surface → host: chat message.
	pub const CHAT_MESSAGE: &str = "chatMessage";
	/// Surface → host: apply structural edits.
	pub const APPLY_EDIT: &str = "applyEdit";
	/// Surface → host: generic named command.
	pub const COMMAND: &str = "command";
	/// Surface → host: readiness handshake.
	pub const READY: &str = "ready";
	/// Surface → host: user feedback.
	pub const FEEDBACK: &str = "feedback";
}

/// Immutable wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
	#[serde(rename = "type")]
	kind: String,
	#[serde(default)]
	payload: Value,
}

impl Message {
	/// Creates a message with a payload.
	pub fn new(kind: impl Into<String>, payload: Value) -> Self {
		Self {
			kind: kind.into(),
			payload,
		}
	}

	/// Creates a message without payload.
	pub fn bare(kind: impl Into<String>) -> Self {
		Self::new(kind, Value::Null)
	}

	/// Returns the type tag.
	pub fn kind(&self) -> &str {
		&self.kind
	}

	/// Returns the payload.
	pub fn payload(&self) -> &Value {
		&self.payload
	}

	/// Returns how the readiness gate treats this message.
	pub fn delivery(&self) -> DeliveryClass {
		DeliveryClass::of(&self.kind)
	}
}

/// Readiness-gate policy for a message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryClass {
	/// Full current value; dropped for surfaces that are not ready yet.
	Snapshot,
	/// Result of a single request; queued until the surface is ready.
	OneShot,
}

impl DeliveryClass {
	/// Classifies a type tag. Unknown tags are treated as snapshots.
	pub fn of(kind: &str) -> Self {
		match kind {
			tag::COMMIT_RESULT | tag::CHAT_REPLY | tag::APPLY_EDIT_RESULT | tag::COMMAND_RESULT => Self::OneShot,
			_ => Self::Snapshot,
		}
	}
}

/// `{ok, text?, error?}` result payload shared by one-shot replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
	/// Whether the request succeeded.
	pub ok: bool,
	/// Produced text, for generation replies.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	/// Failure description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl Reply {
	/// Successful reply without text.
	pub fn done() -> Self {
		Self {
			ok: true,
			text: None,
			error: None,
		}
	}

	/// Successful reply carrying text.
	pub fn text(text: impl Into<String>) -> Self {
		Self {
			ok: true,
			text: Some(text.into()),
			error: None,
		}
	}

	/// Failed reply.
	pub fn failed(error: impl Into<String>) -> Self {
		Self {
			ok: false,
			text: None,
			error: Some(error.into()),
		}
	}
}

/// Result of a generic `command` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
	/// Command name the outcome belongs to.
	pub command: String,
	/// Outcome.
	#[serde(flatten)]
	pub reply: Reply,
}

/// Messages the host sends to surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum HostMessage {
	/// Active editor snapshot, `null` when no editor is active.
	ActiveEditor(Option<EditorSnapshot>),
	/// Current selections of the active editor.
	CursorSelection {
		/// Selections in editor order.
		selections: Vec<Selection>,
	},
	/// Diff of the most recently changed resource.
	FileDiff {
		/// Unified diff text.
		diff: String,
	},
	/// Marker comments found in the workspace.
	TodosResult {
		/// Markers in scan order.
		todos: Vec<Marker>,
	},
	/// Generated commit message.
	CommitResult(Reply),
	/// Chat answer.
	ChatReply(Reply),
	/// Host colour theme.
	Theme {
		/// Theme category.
		kind: ThemeKind,
	},
	/// Feature every surface should display.
	SwitchFeature {
		/// Active feature, `null` for none.
		feature: Option<FeatureId>,
	},
	/// Recorded quiz attempts.
	QuizProgress(BTreeMap<QuizId, QuizScore>),
	/// Result of an `applyEdit` request.
	ApplyEditResult(Reply),
	/// Result of a `command` request.
	CommandResult(CommandOutcome),
}

impl HostMessage {
	/// Returns the wire tag of this message.
	pub const fn tag(&self) -> &'static str {
		match self {
			Self::ActiveEditor(_) => tag::ACTIVE_EDITOR,
			Self::CursorSelection { .. } => tag::CURSOR_SELECTION,
			Self::FileDiff { .. } => tag::FILE_DIFF,
			Self::TodosResult { .. } => tag::TODOS_RESULT,
			Self::CommitResult(_) => tag::COMMIT_RESULT,
			Self::ChatReply(_) => tag::CHAT_REPLY,
			Self::Theme { .. } => tag::THEME,
			Self::SwitchFeature { .. } => tag::SWITCH_FEATURE,
			Self::QuizProgress(_) => tag::QUIZ_PROGRESS,
			Self::ApplyEditResult(_) => tag::APPLY_EDIT_RESULT,
			Self::CommandResult(_) => tag::COMMAND_RESULT,
		}
	}

	/// Returns how the readiness gate treats this message.
	pub fn delivery(&self) -> DeliveryClass {
		DeliveryClass::of(self.tag())
	}

	/// Interprets an envelope as a host message.
	pub fn decode(msg: &Message) -> Result<Self, serde_json::Error> {
		serde_json::from_value(serde_json::json!({
			"type": msg.kind(),
			"payload": msg.payload(),
		}))
	}
}

impl From<HostMessage> for Message {
	fn from(msg: HostMessage) -> Self {
		let kind = msg.tag();
		let payload = serde_json::to_value(&msg)
			.ok()
			.and_then(|mut value| value.get_mut("payload").map(Value::take))
			.unwrap_or(Value::Null);
		Message::new(kind, payload)
	}
}

/// Payload of `generateCommit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
	/// Restrict the diff to one resource; the whole workspace otherwise.
	#[serde(default)]
	pub uri: Option<String>,
}

/// Payload of `chatMessage`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
	/// User text.
	#[serde(default)]
	pub text: String,
}

/// Payload of `applyEdit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyEditRequest {
	/// Target document URI.
	#[serde(default)]
	pub uri: String,
	/// Replacements to apply.
	#[serde(default)]
	pub edits: Vec<TextEdit>,
}

/// Payload of the generic `command` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
	/// Command name, e.g. `devpilot.setActiveFeature`.
	pub command: String,
	/// Positional arguments.
	#[serde(default)]
	pub args: Vec<Value>,
}

/// Payload of `feedback`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
	/// `up` or `down`.
	#[serde(default)]
	pub rating: Option<String>,
	/// Free-form comment.
	#[serde(default)]
	pub comment: Option<String>,
}

/// Messages surfaces send to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceMessage {
	/// Readiness handshake.
	Ready,
	/// Ask for the active editor snapshot.
	RequestActiveEditor,
	/// Generate a commit message.
	GenerateCommit(CommitRequest),
	/// Chat with the generation service.
	ChatMessage(ChatRequest),
	/// Apply structural edits to a document.
	ApplyEdit(ApplyEditRequest),
	/// Generic named command.
	Command(CommandRequest),
	/// User feedback.
	Feedback(Feedback),
	/// Unrecognised tag.
	Unknown(String),
}

/// Inbound message with a recognised tag but an unusable payload.
#[derive(Debug, Error)]
#[error("malformed `{tag}` payload: {source}")]
pub struct PayloadError {
	/// Tag of the offending message.
	pub tag: String,
	/// Decoding failure.
	#[source]
	pub source: serde_json::Error,
}

impl SurfaceMessage {
	/// Interprets an envelope received from a surface.
	///
	/// A `null` or missing payload decodes as the payload type's default.
	pub fn parse(msg: &Message) -> Result<Self, PayloadError> {
		Ok(match msg.kind() {
			tag::READY => Self::Ready,
			tag::REQUEST_ACTIVE_EDITOR => Self::RequestActiveEditor,
			tag::GENERATE_COMMIT => Self::GenerateCommit(decode(msg)?),
			tag::CHAT_MESSAGE => Self::ChatMessage(decode(msg)?),
			tag::APPLY_EDIT => Self::ApplyEdit(decode(msg)?),
			tag::COMMAND => Self::Command(decode(msg)?),
			tag::FEEDBACK => Self::Feedback(decode(msg)?),
			other => Self::Unknown(other.to_string()),
		})
	}
}

fn decode<T: DeserializeOwned + Default>(msg: &Message) -> Result<T, PayloadError> {
	if msg.payload().is_null() {
		return Ok(T::default());
	}
	T::deserialize(msg.payload()).map_err(|source| PayloadError {
		tag: msg.kind().to_string(),
		source,
	})
}
