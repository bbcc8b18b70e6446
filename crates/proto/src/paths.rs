//! Utilities for host file paths and socket resolution.

use std::path::PathBuf;

/// Returns the default socket path surfaces use to reach the host.
///
/// # Resolution Order
///
/// 1. `DEVPILOT_SOCKET` environment variable.
/// 2. System runtime directory (e.g., `$XDG_RUNTIME_DIR`).
/// 3. System temp directory (e.g., `/tmp`).
///
/// The default file name is `devpilot-host.sock`.
#[must_use]
pub fn default_socket_path() -> PathBuf {
	if let Ok(p) = std::env::var("DEVPILOT_SOCKET") {
		return PathBuf::from(p);
	}

	dirs::runtime_dir()
		.filter(|p| std::fs::create_dir_all(p).is_ok())
		.unwrap_or_else(std::env::temp_dir)
		.join("devpilot-host.sock")
}

/// Returns the directory holding persisted host state and credentials.
///
/// # Resolution Order
///
/// 1. `DEVPILOT_STATE_DIR` environment variable.
/// 2. `<data dir>/devpilot` (e.g., `~/.local/share/devpilot`).
/// 3. `<temp dir>/devpilot`.
#[must_use]
pub fn default_state_dir() -> PathBuf {
	if let Ok(p) = std::env::var("DEVPILOT_STATE_DIR") {
		return PathBuf::from(p);
	}

	dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("devpilot")
}

/// Returns the host configuration file path.
///
/// `DEVPILOT_CONFIG` wins; otherwise `<config dir>/devpilot/config.toml`. The
/// file does not have to exist.
#[must_use]
pub fn default_config_path() -> PathBuf {
	if let Ok(p) = std::env::var("DEVPILOT_CONFIG") {
		return PathBuf::from(p);
	}

	dirs::config_dir()
		.unwrap_or_else(std::env::temp_dir)
		.join("devpilot")
		.join("config.toml")
}
