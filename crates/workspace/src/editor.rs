//! Headless editing session over a workspace directory.
//!
//! There is no interactive editor, so the "active editor" is the document
//! touched most recently, either by the file watcher, an applied edit, or an
//! explicit [`WorkspaceSource::focus`].

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use devpilot_host::{EditorEventSink, EditorSource, SourceError, Subscription};
use devpilot_proto::{EditorSnapshot, Position, Selection, TextEdit};
use parking_lot::Mutex;
use ropey::{Rope, RopeSlice};
use url::Url;

use crate::watcher::WorkspaceWatcher;

/// Most recently touched document, shared with the watcher thread.
#[derive(Debug, Clone, Default)]
pub struct ActiveDocument(Arc<Mutex<Option<PathBuf>>>);

impl ActiveDocument {
	/// Marks `path` as the active document.
	pub fn touch(&self, path: PathBuf) {
		*self.0.lock() = Some(path);
	}

	/// Clears the active document if it is `path`.
	pub fn forget(&self, path: &Path) {
		let mut active = self.0.lock();
		if active.as_deref() == Some(path) {
			*active = None;
		}
	}

	/// Returns the active document.
	pub fn get(&self) -> Option<PathBuf> {
		self.0.lock().clone()
	}
}

/// [`EditorSource`] backed by the filesystem and the `git` CLI.
#[derive(Debug, Clone)]
pub struct WorkspaceSource {
	root: PathBuf,
	active: ActiveDocument,
}

impl WorkspaceSource {
	/// Creates a source rooted at `root`.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		let root = root.into();
		let root = std::fs::canonicalize(&root).unwrap_or(root);
		Self {
			root,
			active: ActiveDocument::default(),
		}
	}

	/// Workspace root.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Makes `path` the active document.
	pub fn focus(&self, path: impl AsRef<Path>) {
		let path = path.as_ref();
		let path = if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) };
		self.active.touch(path);
	}

	/// Maps a `file://` URI to a path inside the workspace.
	fn resolve(&self, uri: &str) -> Result<PathBuf, SourceError> {
		let foreign = || SourceError::Foreign(uri.to_string());
		let url = Url::parse(uri).map_err(|_| foreign())?;
		if url.scheme() != "file" {
			return Err(foreign());
		}
		let path = url.to_file_path().map_err(|()| foreign())?;
		if path.components().any(|c| matches!(c, Component::ParentDir)) || !path.starts_with(&self.root) {
			return Err(foreign());
		}
		Ok(path)
	}

	async fn git_diff(&self, path: Option<&Path>) -> Result<String, SourceError> {
		let mut cmd = tokio::process::Command::new("git");
		cmd.args(["diff", "--no-color"]).current_dir(&self.root).kill_on_drop(true);
		let mut command = String::from("git diff");
		if let Some(path) = path {
			let relative = path.strip_prefix(&self.root).unwrap_or(path);
			cmd.arg("--").arg(relative);
			command = format!("git diff -- {}", relative.display());
		}

		let output = cmd.output().await.map_err(|error| SourceError::Io {
			path: self.root.clone(),
			error,
		})?;
		if !output.status.success() {
			return Err(SourceError::Command {
				command,
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}
		Ok(String::from_utf8_lossy(&output.stdout).into_owned())
	}
}

#[async_trait]
impl EditorSource for WorkspaceSource {
	async fn active_editor(&self) -> Option<EditorSnapshot> {
		let path = self.active.get()?;
		let text = match tokio::fs::read_to_string(&path).await {
			Ok(text) => text,
			Err(err) => {
				tracing::debug!(path = %path.display(), error = %err, "active document unreadable");
				self.active.forget(&path);
				return None;
			}
		};
		snapshot(&path, text)
	}

	async fn selections(&self, _uri: &str) -> Vec<Selection> {
		Vec::new()
	}

	async fn diff_for_resource(&self, uri: &str) -> Result<String, SourceError> {
		let path = self.resolve(uri)?;
		self.git_diff(Some(&path)).await
	}

	async fn workspace_diff(&self) -> Result<String, SourceError> {
		self.git_diff(None).await
	}

	async fn apply_edits(&self, uri: &str, edits: &[TextEdit]) -> Result<(), SourceError> {
		let path = self.resolve(uri)?;
		let io = |error: std::io::Error| SourceError::Io {
			path: path.clone(),
			error,
		};
		let text = tokio::fs::read_to_string(&path).await.map_err(io)?;
		let mut rope = Rope::from_str(&text);
		apply(&mut rope, uri, edits)?;
		tokio::fs::write(&path, rope.to_string()).await.map_err(io)?;

		tracing::debug!(path = %path.display(), edits = edits.len(), "edits applied");
		self.active.touch(path);
		Ok(())
	}

	fn subscribe(&self, sink: EditorEventSink) -> Result<Subscription, SourceError> {
		WorkspaceWatcher::new(self.root.clone(), self.active.clone()).start(sink)
	}
}

fn snapshot(path: &Path, text: String) -> Option<EditorSnapshot> {
	let uri = Url::from_file_path(path).ok()?;
	let line_count = Rope::from_str(&text).len_lines();
	Some(EditorSnapshot {
		uri: uri.into(),
		language_id: language_id(path).to_string(),
		file_name: path.file_name()?.to_string_lossy().into_owned(),
		line_count: u32::try_from(line_count).unwrap_or(u32::MAX),
		text,
	})
}

/// Language identifier for a file extension.
pub fn language_id(path: &Path) -> &'static str {
	match path.extension().and_then(|ext| ext.to_str()).unwrap_or_default() {
		"rs" => "rust",
		"ts" => "typescript",
		"tsx" => "typescriptreact",
		"js" | "mjs" | "cjs" => "javascript",
		"jsx" => "javascriptreact",
		"py" => "python",
		"java" => "java",
		"go" => "go",
		"c" | "h" => "c",
		"cpp" | "cc" | "hpp" => "cpp",
		"css" => "css",
		"html" => "html",
		"json" => "json",
		"toml" => "toml",
		"md" => "markdown",
		"sh" => "shellscript",
		_ => "plaintext",
	}
}

/// Applies `edits` to `rope`. Positions refer to the original text; nothing is
/// changed unless every edit is in bounds and no two edits overlap.
fn apply(rope: &mut Rope, uri: &str, edits: &[TextEdit]) -> Result<(), SourceError> {
	let mut spans = Vec::with_capacity(edits.len());
	for (index, edit) in edits.iter().enumerate() {
		let out_of_bounds = || SourceError::OutOfBounds {
			uri: uri.to_string(),
			index,
		};
		let start = char_index(rope, edit.range.start).ok_or_else(out_of_bounds)?;
		let end = char_index(rope, edit.range.end).ok_or_else(out_of_bounds)?;
		if end < start {
			return Err(out_of_bounds());
		}
		spans.push((start, end, index));
	}

	spans.sort_unstable_by_key(|&(start, end, index)| (start, end, index));
	for pair in spans.windows(2) {
		let (_, prev_end, prev) = pair[0];
		let (next_start, _, next) = pair[1];
		if prev_end > next_start {
			return Err(SourceError::Overlap(prev.min(next), prev.max(next)));
		}
	}

	for &(start, end, index) in spans.iter().rev() {
		rope.remove(start..end);
		rope.insert(start, &edits[index].new_text);
	}
	Ok(())
}

fn char_index(rope: &Rope, pos: Position) -> Option<usize> {
	let line = usize::try_from(pos.line).ok()?;
	if line >= rope.len_lines() {
		return None;
	}
	let content = line_content(rope.line(line));
	let character = usize::try_from(pos.character).ok()?;
	if character > content.len_utf16_cu() {
		return None;
	}
	Some(rope.line_to_char(line) + content.utf16_cu_to_char(character))
}

fn line_content(line: RopeSlice<'_>) -> RopeSlice<'_> {
	let mut end = line.len_chars();
	while end > 0 && matches!(line.char(end - 1), '\n' | '\r') {
		end -= 1;
	}
	line.slice(..end)
}
