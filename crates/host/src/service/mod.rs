//! Host service actor.
//!
//! All state lives in one [`HostContext`](context::HostContext) owned by the
//! service task. Surfaces, the editor source and background work talk to it
//! through [`HostCmd`] messages, so no two handlers ever run concurrently.

mod actor;
mod commands;
pub(crate) mod context;
mod handle;

pub use actor::HostService;
pub use commands::HostCmd;
pub use handle::{HostHandle, SurfaceLink};
