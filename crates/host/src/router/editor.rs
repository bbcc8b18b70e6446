//! Editor event policy: which changes are debounced and which publish at once.

use devpilot_proto::HostMessage;
use tokio::time::Instant;

use crate::collab::{Collaborators, EditorEvent};
use crate::service::context::{DebounceKey, HostContext};

/// Reacts to one notification from the editor source.
pub(crate) async fn editor_event(ctx: &mut HostContext, event: EditorEvent) {
	tracing::trace!(?event, "editor event");
	match event {
		EditorEvent::DocumentChanged { uri } => {
			let now = Instant::now();
			let sync = editor_sync(&ctx.collab, ctx.marker_glob.clone());
			ctx.debouncer.schedule(DebounceKey::EditorSync, Box::pin(sync), now);
			let editor = ctx.collab.editor.clone();
			let diff = async move {
				match editor.diff_for_resource(&uri).await {
					Ok(diff) => vec![HostMessage::FileDiff { diff }],
					Err(err) => {
						tracing::debug!(%uri, error = %err, "no diff for changed document");
						Vec::new()
					}
				}
			};
			ctx.debouncer.schedule(DebounceKey::FileDiff, Box::pin(diff), now);
		}
		EditorEvent::ActiveEditorChanged
		| EditorEvent::DocumentOpened { .. }
		| EditorEvent::DocumentClosed { .. }
		| EditorEvent::DocumentSaved { .. } => publish_active_editor(ctx),
		EditorEvent::SelectionChanged { uri } => {
			let editor = ctx.collab.editor.clone();
			ctx.tasks.publish(async move {
				let selections = editor.selections(&uri).await;
				vec![HostMessage::CursorSelection { selections }]
			});
		}
		EditorEvent::ThemeChanged(kind) => ctx.write_state(|state| state.theme_kind = kind).await,
	}
}

pub(crate) fn publish_active_editor(ctx: &mut HostContext) {
	let editor = ctx.collab.editor.clone();
	ctx.tasks
		.publish(async move { vec![HostMessage::ActiveEditor(editor.active_editor().await)] });
}

pub(crate) fn publish_markers(ctx: &mut HostContext) {
	let scan = scan_markers(&ctx.collab, ctx.marker_glob.clone());
	ctx.tasks.publish(scan);
}

/// Active editor snapshot followed by a fresh marker scan.
fn editor_sync(collab: &Collaborators, glob: String) -> impl Future<Output = Vec<HostMessage>> + Send + 'static {
	let editor = collab.editor.clone();
	let markers = scan_markers(collab, glob);
	async move {
		let mut messages = vec![HostMessage::ActiveEditor(editor.active_editor().await)];
		messages.extend(markers.await);
		messages
	}
}

fn scan_markers(collab: &Collaborators, glob: String) -> impl Future<Output = Vec<HostMessage>> + Send + 'static {
	let scanner = collab.scanner.clone();
	async move {
		match tokio::task::spawn_blocking(move || scanner.scan_for_markers(&glob)).await {
			Ok(Ok(todos)) => vec![HostMessage::TodosResult { todos }],
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "marker scan failed");
				Vec::new()
			}
			Err(err) => {
				tracing::warn!(error = %err, "marker scan task failed");
				Vec::new()
			}
		}
	}
}
