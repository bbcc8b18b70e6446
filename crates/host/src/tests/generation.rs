use std::sync::atomic::Ordering;
use std::time::Duration;

use devpilot_proto::{Position, Range, SurfaceKind, TextEdit};
use pretty_assertions::assert_eq;
use serde_json::json;

use super::{Harness, find, kinds, settle};
use crate::collab::GenerationKind;
use crate::testing::Fakes;

#[tokio::test(start_paused = true)]
async fn generation_failure_reaches_only_the_requester() {
	let fakes = Fakes::default();
	fakes.generator.fail.store(true, Ordering::SeqCst);
	let h = Harness::start(fakes).await;
	let mut a = h.ready_surface(SurfaceKind::Primary).await;
	let mut b = h.ready_surface(SurfaceKind::Secondary).await;

	a.send("chatMessage", json!({"text": "explain lifetimes"})).await;

	let reply = find(&a.received().await, "chatReply").clone();
	assert_eq!(reply["ok"], json!(false));
	assert!(reply["error"].as_str().unwrap().contains("missing credential"));
	assert!(reply.get("text").is_none());
	assert!(b.received().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn commit_message_uses_resource_diff() {
	let fakes = Fakes::default();
	fakes
		.editor
		.diffs
		.lock()
		.unwrap()
		.insert("file:///w/src/lib.rs".into(), "+pub fn run() {}".into());
	let h = Harness::start(fakes).await;
	let mut a = h.ready_surface(SurfaceKind::Primary).await;

	a.send("generateCommit", json!({"uri": "file:///w/src/lib.rs"})).await;

	assert_eq!(
		find(&a.received().await, "commitResult"),
		&json!({"ok": true, "text": "commit: +pub fn run() {}"})
	);
}

#[tokio::test(start_paused = true)]
async fn commit_message_without_changes_is_a_failure() {
	let h = Harness::start(Fakes::default()).await;
	let mut a = h.ready_surface(SurfaceKind::Primary).await;

	a.send("generateCommit", serde_json::Value::Null).await;

	assert_eq!(
		find(&a.received().await, "commitResult"),
		&json!({"ok": false, "error": "nothing to describe"})
	);
	assert!(h.fakes.generator.calls.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn commit_message_falls_back_to_workspace_diff() {
	let fakes = Fakes::default();
	*fakes.editor.workspace_diff.lock().unwrap() = "+a\n-b\n".into();
	let h = Harness::start(fakes).await;
	let mut a = h.ready_surface(SurfaceKind::Primary).await;

	a.send("generateCommit", json!({})).await;

	assert_eq!(find(&a.received().await, "commitResult")["ok"], json!(true));
	assert_eq!(
		*h.fakes.generator.calls.lock().unwrap(),
		vec![(GenerationKind::Commit, "+a\n-b\n".to_string())]
	);
}

#[tokio::test(start_paused = true)]
async fn overlapping_requests_are_answered_to_their_own_surface() {
	let fakes = Fakes::default();
	{
		let mut delays = fakes.generator.delays.lock().unwrap();
		delays.insert("slow".into(), Duration::from_millis(200));
		delays.insert("fast".into(), Duration::from_millis(20));
	}
	let h = Harness::start(fakes).await;
	let mut a = h.ready_surface(SurfaceKind::Primary).await;
	let mut b = h.ready_surface(SurfaceKind::Secondary).await;

	a.send("chatMessage", json!({"text": "slow"})).await;
	b.send("chatMessage", json!({"text": "fast"})).await;

	tokio::time::sleep(Duration::from_millis(50)).await;
	assert_eq!(find(&b.drain(), "chatReply"), &json!({"ok": true, "text": "echo: fast"}));
	assert!(a.drain().is_empty());

	tokio::time::sleep(Duration::from_millis(200)).await;
	assert_eq!(find(&a.drain(), "chatReply"), &json!({"ok": true, "text": "echo: slow"}));
	assert!(b.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn result_for_detached_requester_is_discarded() {
	let fakes = Fakes::default();
	fakes
		.generator
		.delays
		.lock()
		.unwrap()
		.insert("slow".into(), Duration::from_millis(100));
	let h = Harness::start(fakes).await;
	let mut a = h.ready_surface(SurfaceKind::Primary).await;
	let mut b = h.ready_surface(SurfaceKind::Secondary).await;

	a.send("chatMessage", json!({"text": "slow"})).await;
	settle().await;
	h.host.detach(a.id()).await.unwrap();
	tokio::time::sleep(Duration::from_millis(200)).await;

	assert!(a.drain().is_empty());
	assert!(b.drain().is_empty());
	assert_eq!(h.fakes.generator.calls.lock().unwrap().len(), 1);
	assert!(h.host.state().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn empty_chat_is_rejected_without_calling_the_generator() {
	let h = Harness::start(Fakes::default()).await;
	let mut a = h.ready_surface(SurfaceKind::Primary).await;

	a.send("chatMessage", json!({"text": "   "})).await;

	assert_eq!(
		find(&a.received().await, "chatReply"),
		&json!({"ok": false, "error": "message text is empty"})
	);
	assert!(h.fakes.generator.calls.lock().unwrap().is_empty());
}

fn edit_payload(uri: &str, start: (u32, u32), end: (u32, u32)) -> serde_json::Value {
	json!({
		"uri": uri,
		"edits": [{
			"range": {
				"start": {"line": start.0, "character": start.1},
				"end": {"line": end.0, "character": end.1},
			},
			"newText": "renamed",
		}],
	})
}

#[tokio::test(start_paused = true)]
async fn apply_edit_reports_to_requester() {
	let h = Harness::start(Fakes::default()).await;
	let mut a = h.ready_surface(SurfaceKind::Overlay).await;
	let mut b = h.ready_surface(SurfaceKind::Primary).await;

	a.send("applyEdit", edit_payload("file:///w/src/main.rs", (1, 4), (1, 8))).await;

	assert_eq!(find(&a.received().await, "applyEditResult"), &json!({"ok": true}));
	assert!(b.received().await.is_empty());
	assert_eq!(
		*h.fakes.editor.applied.lock().unwrap(),
		vec![(
			"file:///w/src/main.rs".to_string(),
			vec![TextEdit {
				range: Range::new(Position::new(1, 4), Position::new(1, 8)),
				new_text: "renamed".into(),
			}]
		)]
	);
}

#[tokio::test(start_paused = true)]
async fn invalid_edits_never_reach_the_editor() {
	let h = Harness::start(Fakes::default()).await;
	let mut a = h.ready_surface(SurfaceKind::Overlay).await;

	a.send("applyEdit", edit_payload("file:///w/a.rs", (3, 0), (2, 0))).await;
	let reversed = find(&a.received().await, "applyEditResult").clone();
	assert_eq!(reversed["ok"], json!(false));

	a.send("applyEdit", edit_payload("not a uri", (0, 0), (0, 1))).await;
	assert_eq!(
		find(&a.received().await, "applyEditResult"),
		&json!({"ok": false, "error": "invalid resource `not a uri`"})
	);

	a.send("applyEdit", json!({"uri": 5})).await;
	assert_eq!(kinds(&a.received().await), vec!["applyEditResult"]);

	assert!(h.fakes.editor.applied.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn editor_failure_becomes_failure_payload() {
	let fakes = Fakes::default();
	fakes.editor.reject_edits.store(true, Ordering::SeqCst);
	let h = Harness::start(fakes).await;
	let mut a = h.ready_surface(SurfaceKind::Overlay).await;

	a.send("applyEdit", edit_payload("file:///w/a.rs", (0, 0), (0, 1))).await;

	let reply = find(&a.received().await, "applyEditResult").clone();
	assert_eq!(reply["ok"], json!(false));
	assert!(reply["error"].as_str().unwrap().contains("out of bounds"));
}
