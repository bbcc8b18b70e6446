//! Host configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default quiescence window for debounced editor events.
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or shape.
	#[error("invalid configuration in {path}: {error}")]
	Toml {
		/// Path to the offending file.
		path: PathBuf,
		/// Parser error.
		error: toml::de::Error,
	},

	/// A field parsed but its value is unusable.
	#[error("invalid value for `{field}`: {reason}")]
	Invalid {
		/// Dotted field name.
		field: &'static str,
		/// What was wrong.
		reason: String,
	},
}

/// Top-level host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	/// Core bus settings.
	pub host: HostConfig,
	/// Marker scanner settings.
	pub markers: MarkerConfig,
	/// Generation endpoint settings.
	pub generation: GenerationConfig,
	/// Filesystem locations.
	pub paths: PathsConfig,
}

/// `[host]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
	/// Debounce quiescence window in milliseconds.
	pub debounce_ms: u64,
	/// Feature ids surfaces may switch to.
	pub features: Vec<String>,
}

impl Default for HostConfig {
	fn default() -> Self {
		Self {
			debounce_ms: DEFAULT_DEBOUNCE_MS,
			features: [
				"commit",
				"chat",
				"todo",
				"help",
				"quiz-html-easy",
				"quiz-html-medium",
				"quiz-css-easy",
				"quiz-css-hard",
				"quiz-js-easy",
				"quiz-js-medium",
			]
			.into_iter()
			.map(String::from)
			.collect(),
		}
	}
}

impl HostConfig {
	/// Returns the debounce window.
	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}
}

/// `[markers]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkerConfig {
	/// Files to scan.
	pub glob: String,
	/// Files never scanned.
	pub exclude: Vec<String>,
	/// Substring that marks a line.
	pub token: String,
}

impl Default for MarkerConfig {
	fn default() -> Self {
		Self {
			glob: "**/*.{ts,tsx,js,jsx,py,java,rs}".to_string(),
			exclude: vec!["**/node_modules/**".to_string()],
			token: "TODO".to_string(),
		}
	}
}

/// `[generation]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
	/// OpenAI-compatible chat completions URL.
	pub endpoint: String,
	/// Model name sent with every request.
	pub model: String,
	/// Credential store key holding the API key.
	pub credential_key: String,
	/// Request timeout in seconds.
	pub timeout_secs: u64,
	/// System prompt for commit message generation.
	pub commit_prompt: String,
}

impl Default for GenerationConfig {
	fn default() -> Self {
		Self {
			endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
			model: "gpt-4o-mini".to_string(),
			credential_key: "devpilot.openaiKey".to_string(),
			timeout_secs: 60,
			commit_prompt: "Write concise Git commit messages.".to_string(),
		}
	}
}

impl GenerationConfig {
	/// Returns the request timeout.
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}
}

/// `[paths]` section. Unset entries resolve through `devpilot_proto::paths`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
	/// Unix socket surfaces connect to.
	pub socket: Option<PathBuf>,
	/// Directory for persisted state and credentials.
	pub state_dir: Option<PathBuf>,
}

impl Config {
	/// Parses configuration from TOML text. `origin` is only used in errors.
	pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(text).map_err(|error| ConfigError::Toml {
			path: origin.to_path_buf(),
			error,
		})?;
		config.validate()?;
		Ok(config)
	}

	/// Loads configuration from `path`; a missing file yields defaults.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		match std::fs::read_to_string(path) {
			Ok(text) => Self::from_toml_str(&text, path),
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
				tracing::debug!(path = %path.display(), "config file missing; using defaults");
				Ok(Self::default())
			}
			Err(error) => Err(ConfigError::Io {
				path: path.to_path_buf(),
				error,
			}),
		}
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.host.debounce_ms == 0 {
			return Err(ConfigError::Invalid {
				field: "host.debounce_ms",
				reason: "must be greater than zero".to_string(),
			});
		}
		if self.markers.token.is_empty() {
			return Err(ConfigError::Invalid {
				field: "markers.token",
				reason: "must not be empty".to_string(),
			});
		}
		if url::Url::parse(&self.generation.endpoint).is_err() {
			return Err(ConfigError::Invalid {
				field: "generation.endpoint",
				reason: format!("`{}` is not a URL", self.generation.endpoint),
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_file_is_default() {
		let config = Config::from_toml_str("", Path::new("devpilot.toml")).unwrap();
		assert_eq!(config, Config::default());
		assert_eq!(config.host.debounce(), Duration::from_millis(400));
	}

	#[test]
	fn sections_override_fields() {
		let config = Config::from_toml_str(
			r#"
			[host]
			debounce_ms = 250

			[markers]
			token = "FIXME"

			[paths]
			socket = "/tmp/dp.sock"
			"#,
			Path::new("devpilot.toml"),
		)
		.unwrap();
		assert_eq!(config.host.debounce_ms, 250);
		assert_eq!(config.markers.token, "FIXME");
		assert_eq!(config.markers.glob, MarkerConfig::default().glob);
		assert_eq!(config.paths.socket, Some(PathBuf::from("/tmp/dp.sock")));
		assert!(config.host.features.iter().any(|f| f == "quiz-css-hard"));
	}

	#[test]
	fn unknown_fields_are_rejected() {
		let err = Config::from_toml_str("[host]\ndebounce = 1\n", Path::new("bad.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::Toml { .. }));
	}

	#[test]
	fn zero_debounce_is_invalid() {
		let err = Config::from_toml_str("[host]\ndebounce_ms = 0\n", Path::new("bad.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "host.debounce_ms", .. }));
	}

	#[test]
	fn missing_file_loads_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let config = Config::load(&dir.path().join("absent.toml")).unwrap();
		assert_eq!(config, Config::default());
	}
}
