//! Concrete collaborators for running a devpilot host against a directory.
//!
//! The host core only sees the traits in [`devpilot_host::collab`]; this crate
//! supplies filesystem, git and HTTP implementations of them so the host can
//! run headless with a workspace directory standing in for the editor.

pub mod credentials;
pub mod editor;
pub mod generator;
pub mod kv;
pub mod scanner;
pub mod watcher;

pub use credentials::{API_KEY_ENV, FileCredentialStore};
pub use editor::{ActiveDocument, WorkspaceSource};
pub use generator::ChatCompletions;
pub use kv::JsonFileStore;
pub use scanner::FsMarkerScanner;
pub use watcher::WorkspaceWatcher;
