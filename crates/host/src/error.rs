//! Error taxonomy of the host core.
//!
//! Every error is contained at the component that produced it. None of them
//! is allowed to stop the host event loop; user-visible failures travel as
//! `{ok: false, error}` payloads.

use std::path::PathBuf;

use devpilot_proto::{PayloadError, SurfaceId};
use thiserror::Error;

/// Delivery to a surface failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
	/// The surface is not (or no longer) registered.
	#[error("{0} is detached")]
	Detached(SurfaceId),
	/// The surface's container dropped its end of the channel.
	#[error("channel to {0} is closed")]
	Closed(SurfaceId),
}

/// Durable key-value storage failed.
#[derive(Debug, Error)]
pub enum PersistenceError {
	/// Reading or writing the backing file failed.
	#[error("I/O error at {path}: {error}")]
	Io {
		/// Backing file.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},
	/// The backing file is not a JSON object.
	#[error("malformed store at {path}: {error}")]
	Corrupt {
		/// Backing file.
		path: PathBuf,
		/// Decoding failure.
		error: serde_json::Error,
	},
	/// A stored value does not have the expected shape.
	#[error("malformed value for `{key}`: {error}")]
	Decode {
		/// Storage key.
		key: String,
		/// Decoding failure.
		error: serde_json::Error,
	},
	/// A value could not be encoded.
	#[error("failed to encode value for `{key}`: {error}")]
	Encode {
		/// Storage key.
		key: String,
		/// Encoding failure.
		error: serde_json::Error,
	},
	/// The storage backend rejected the operation.
	#[error("storage unavailable: {0}")]
	Unavailable(String),
}

/// Failure of the external text-generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
	/// No credential is stored under the configured key.
	#[error("missing credential `{0}`; set it with devpilot.setOpenAIKey")]
	MissingCredential(String),
	/// The request never produced a response.
	#[error("network error: {0}")]
	Network(String),
	/// The endpoint answered with a non-success status.
	#[error("generation endpoint returned {status}: {body}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body, possibly truncated.
		body: String,
	},
	/// The endpoint answered without any text.
	#[error("generation endpoint returned no text")]
	Empty,
	/// There was no input to generate from.
	#[error("nothing to describe")]
	NothingToDescribe,
	/// Collecting the input failed.
	#[error(transparent)]
	Source(#[from] SourceError),
}

/// A surface command was rejected before any state changed.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// The feature id is not in the known set.
	#[error("unknown feature `{0}`")]
	UnknownFeature(String),
	/// No handler is registered for the command name.
	#[error("unknown command `{0}`")]
	UnknownCommand(String),
	/// The quick action id is not recognised.
	#[error("unknown quick action `{0}`")]
	UnknownAction(String),
	/// Command arguments have the wrong shape.
	#[error("invalid arguments for `{command}`: {reason}")]
	Arguments {
		/// Command name.
		command: String,
		/// What was wrong.
		reason: &'static str,
	},
	/// The target resource is not a valid URI.
	#[error("invalid resource `{0}`")]
	Resource(String),
	/// A chat message without text.
	#[error("message text is empty")]
	EmptyText,
	/// An edit request contained no edits.
	#[error("no edits to apply")]
	NoEdits,
	/// An edit range ends before it starts.
	#[error("edit {0} has a range that ends before it starts")]
	UnorderedRange(usize),
	/// A known message tag carried an unusable payload.
	#[error(transparent)]
	Payload(#[from] PayloadError),
}

/// Failure of an editor-source or scanner operation.
#[derive(Debug, Error)]
pub enum SourceError {
	/// Filesystem access failed.
	#[error("I/O error at {path}: {error}")]
	Io {
		/// Affected path.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},
	/// The resource is not a file inside the workspace.
	#[error("resource `{0}` is outside the workspace")]
	Foreign(String),
	/// An edit addresses a position past the end of the document.
	#[error("edit {index} is out of bounds for `{uri}`")]
	OutOfBounds {
		/// Document URI.
		uri: String,
		/// Index of the offending edit.
		index: usize,
	},
	/// Two edits overlap.
	#[error("edits {0} and {1} overlap")]
	Overlap(usize, usize),
	/// An external VCS command failed.
	#[error("`{command}` failed: {stderr}")]
	Command {
		/// The command line.
		command: String,
		/// Captured standard error.
		stderr: String,
	},
	/// A glob pattern could not be compiled.
	#[error("invalid glob `{glob}`: {reason}")]
	Glob {
		/// The pattern.
		glob: String,
		/// Compiler message.
		reason: String,
	},
	/// Change notifications could not be set up.
	#[error("failed to watch workspace: {0}")]
	Watch(String),
	/// A blocking scan task was cancelled or panicked.
	#[error("scan task failed: {0}")]
	Task(String),
}

/// The host service is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HostError {
	/// The service loop has exited.
	#[error("host service stopped")]
	Stopped,
}
