//! Filesystem notifications translated into editor events.

use std::path::{Component, Path, PathBuf};

use devpilot_host::{EditorEvent, EditorEventSink, SourceError, Subscription};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use url::Url;

use crate::editor::ActiveDocument;

/// What happened to one workspace file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
	Opened(PathBuf),
	Changed(PathBuf),
	Closed(PathBuf),
}

/// Recursive watcher over the workspace root.
#[derive(Debug, Clone)]
pub struct WorkspaceWatcher {
	root: PathBuf,
	active: ActiveDocument,
}

impl WorkspaceWatcher {
	/// Creates a watcher that keeps `active` pointed at the last touched file.
	pub fn new(root: impl Into<PathBuf>, active: ActiveDocument) -> Self {
		Self { root: root.into(), active }
	}

	/// Starts watching. Events flow to `sink` until the subscription is cancelled.
	pub fn start(&self, sink: EditorEventSink) -> Result<Subscription, SourceError> {
		let active = self.active.clone();
		let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| match event {
			Ok(event) => {
				for change in translate(event) {
					if !forward(&active, &sink, change) {
						tracing::trace!("editor event dropped because host stopped listening");
					}
				}
			}
			Err(err) => tracing::warn!(error = %err, "watch backend error"),
		})
		.map_err(|err| SourceError::Watch(err.to_string()))?;
		watcher
			.watch(&self.root, RecursiveMode::Recursive)
			.map_err(|err| SourceError::Watch(err.to_string()))?;

		tracing::info!(root = %self.root.display(), "watching workspace");
		Ok(Subscription::new(move || drop(watcher)))
	}
}

fn forward(active: &ActiveDocument, sink: &EditorEventSink, change: Change) -> bool {
	let event = match change {
		Change::Opened(path) => {
			active.touch(path.clone());
			file_uri(&path).map(|uri| EditorEvent::DocumentOpened { uri })
		}
		Change::Changed(path) => {
			active.touch(path.clone());
			file_uri(&path).map(|uri| EditorEvent::DocumentChanged { uri })
		}
		Change::Closed(path) => {
			active.forget(&path);
			file_uri(&path).map(|uri| EditorEvent::DocumentClosed { uri })
		}
	};
	event.is_none_or(|event| sink.emit(event))
}

fn file_uri(path: &Path) -> Option<String> {
	Url::from_file_path(path).ok().map(String::from)
}

fn translate(event: Event) -> Vec<Change> {
	let Event { kind, paths, .. } = event;
	let changes: Vec<Change> = match kind {
		EventKind::Create(_) => paths.into_iter().map(Change::Opened).collect(),
		EventKind::Modify(ModifyKind::Name(mode)) => renamed(paths, mode),
		EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
		EventKind::Modify(_) => paths.into_iter().map(Change::Changed).collect(),
		EventKind::Remove(_) => paths.into_iter().map(Change::Closed).collect(),
		_ => Vec::new(),
	};
	changes.into_iter().filter(relevant).collect()
}

fn renamed(paths: Vec<PathBuf>, mode: RenameMode) -> Vec<Change> {
	match mode {
		RenameMode::Both => {
			let mut changes = Vec::with_capacity(2);
			if let Some(from) = paths.first() {
				changes.push(Change::Closed(from.clone()));
			}
			if let Some(to) = paths.get(1) {
				changes.push(Change::Opened(to.clone()));
			}
			changes
		}
		RenameMode::From => paths.into_iter().map(Change::Closed).collect(),
		RenameMode::To => paths.into_iter().map(Change::Opened).collect(),
		RenameMode::Any | RenameMode::Other => paths
			.into_iter()
			.map(|path| if path.exists() { Change::Opened(path) } else { Change::Closed(path) })
			.collect(),
	}
}

/// Drops VCS internals and directories.
fn relevant(change: &Change) -> bool {
	let (Change::Opened(path) | Change::Changed(path) | Change::Closed(path)) = change;
	if path.components().any(|c| c == Component::Normal(".git".as_ref())) {
		return false;
	}
	matches!(change, Change::Closed(_)) || !path.is_dir()
}

#[cfg(test)]
mod tests {
	use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
	use pretty_assertions::assert_eq;
	use tokio::sync::mpsc;

	use super::*;

	fn event(kind: EventKind, paths: &[&str]) -> Event {
		paths.iter().fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
	}

	#[test]
	fn maps_notify_kinds() {
		assert_eq!(
			translate(event(EventKind::Create(CreateKind::File), &["/w/a.rs"])),
			vec![Change::Opened("/w/a.rs".into())]
		);
		assert_eq!(
			translate(event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), &["/w/a.rs"])),
			vec![Change::Changed("/w/a.rs".into())]
		);
		assert_eq!(
			translate(event(EventKind::Remove(RemoveKind::File), &["/w/a.rs"])),
			vec![Change::Closed("/w/a.rs".into())]
		);
		assert!(translate(event(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)), &["/w/a.rs"])).is_empty());
	}

	#[test]
	fn rename_closes_source_and_opens_target() {
		assert_eq!(
			translate(event(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), &["/w/old.rs", "/w/new.rs"])),
			vec![Change::Closed("/w/old.rs".into()), Change::Opened("/w/new.rs".into())]
		);
	}

	#[test]
	fn ignores_git_internals() {
		assert!(translate(event(EventKind::Modify(ModifyKind::Any), &["/w/.git/index"])).is_empty());
	}

	#[test]
	fn forward_tracks_active_document() {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let sink = EditorEventSink::from_sender(tx);
		let active = ActiveDocument::default();

		assert!(forward(&active, &sink, Change::Changed("/w/a.rs".into())));
		assert_eq!(active.get(), Some(PathBuf::from("/w/a.rs")));
		assert_eq!(
			rx.try_recv().unwrap(),
			EditorEvent::DocumentChanged {
				uri: "file:///w/a.rs".into()
			}
		);

		assert!(forward(&active, &sink, Change::Closed("/w/a.rs".into())));
		assert_eq!(active.get(), None);
		assert_eq!(
			rx.try_recv().unwrap(),
			EditorEvent::DocumentClosed {
				uri: "file:///w/a.rs".into()
			}
		);
	}

	#[tokio::test]
	async fn watch_reports_file_writes() {
		let dir = tempfile::tempdir().unwrap();
		let root = std::fs::canonicalize(dir.path()).unwrap();
		let (tx, mut rx) = mpsc::unbounded_channel();
		let active = ActiveDocument::default();
		let mut subscription = WorkspaceWatcher::new(&root, active.clone())
			.start(EditorEventSink::from_sender(tx))
			.unwrap();

		std::fs::write(root.join("main.py"), "print(1)\n").unwrap();
		let event = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
			.await
			.expect("no watch event")
			.unwrap();
		assert!(matches!(
			event,
			EditorEvent::DocumentOpened { .. } | EditorEvent::DocumentChanged { .. }
		));
		assert_eq!(active.get(), Some(root.join("main.py")));
		subscription.cancel();
	}
}
