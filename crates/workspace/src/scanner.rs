//! Marker comment scanner over a workspace directory.

use std::path::{Path, PathBuf};

use devpilot_host::config::MarkerConfig;
use devpilot_host::{SourceError, SourceScanner};
use devpilot_proto::Marker;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

/// Walks the workspace (honouring `.gitignore`) and reports lines containing a token.
#[derive(Debug, Clone)]
pub struct FsMarkerScanner {
	root: PathBuf,
	exclude: GlobSet,
	token: String,
}

impl FsMarkerScanner {
	/// Creates a scanner rooted at `root`.
	pub fn new(root: impl Into<PathBuf>, config: &MarkerConfig) -> Result<Self, SourceError> {
		let mut builder = GlobSetBuilder::new();
		for pattern in &config.exclude {
			builder.add(compile(pattern)?);
		}
		let exclude = builder.build().map_err(|err| SourceError::Glob {
			glob: config.exclude.join(", "),
			reason: err.to_string(),
		})?;
		Ok(Self {
			root: root.into(),
			exclude,
			token: config.token.clone(),
		})
	}

	fn scan_file(&self, path: &Path, markers: &mut Vec<Marker>) {
		let text = match std::fs::read_to_string(path) {
			Ok(text) => text,
			Err(err) => {
				tracing::trace!(path = %path.display(), error = %err, "skipping unreadable file");
				return;
			}
		};
		let file = path
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_default();
		for (idx, line) in text.lines().enumerate() {
			if line.contains(&self.token) {
				markers.push(Marker {
					file: file.clone(),
					line: u32::try_from(idx + 1).unwrap_or(u32::MAX),
					text: line.trim().to_string(),
				});
			}
		}
	}
}

impl SourceScanner for FsMarkerScanner {
	fn scan_for_markers(&self, glob: &str) -> Result<Vec<Marker>, SourceError> {
		let include = compile(glob)?.compile_matcher();
		let walker = WalkBuilder::new(&self.root)
			.standard_filters(true)
			.require_git(false)
			.follow_links(false)
			.sort_by_file_name(|a, b| a.cmp(b))
			.build();

		let mut markers = Vec::new();
		for entry in walker {
			let entry = match entry {
				Ok(entry) => entry,
				Err(err) => {
					tracing::warn!(error = %err, "scanner entry error");
					continue;
				}
			};
			if !entry.file_type().is_some_and(|ft| ft.is_file()) {
				continue;
			}
			let path = entry.path();
			let relative = path.strip_prefix(&self.root).unwrap_or(path);
			if !include.is_match(relative) || self.exclude.is_match(relative) {
				continue;
			}
			self.scan_file(path, &mut markers);
		}
		tracing::debug!(root = %self.root.display(), glob, found = markers.len(), "marker scan finished");
		Ok(markers)
	}
}

fn compile(pattern: &str) -> Result<Glob, SourceError> {
	Glob::new(pattern).map_err(|err| SourceError::Glob {
		glob: pattern.to_string(),
		reason: err.kind().to_string(),
	})
}
