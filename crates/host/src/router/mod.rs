//! Dispatch of inbound surface messages to their handlers.
//!
//! Handlers run against the [`HostContext`] one at a time. Work that waits on
//! a collaborator is handed to [`Tasks`](crate::service::context::Tasks) so
//! the router keeps handling other surfaces; its result comes back pinned to
//! the requesting surface.

mod commands;
mod editor;

use std::sync::Arc;

use devpilot_proto::{
	ApplyEditRequest, ChatRequest, CommandOutcome, CommitRequest, FeatureId, HostMessage, Message, PayloadError, Reply, SurfaceId,
	SurfaceKind, SurfaceMessage, tag,
};

pub(crate) use self::editor::editor_event;
use crate::collab::{EditorSource, GenerationKind, GenerationService};
use crate::error::{GenerationError, ValidationError};
use crate::registry::{ReadyTransition, SurfacePhase};
use crate::service::context::HostContext;

/// Runs once after state is restored, before any surface is attached.
pub(crate) fn startup(ctx: &mut HostContext) {
	if let Some(feature) = &ctx.state.read().active_feature {
		tracing::info!(%feature, "restoring active feature");
		ctx.collab.workbench.reveal(SurfaceKind::Primary);
	}
	editor::publish_active_editor(ctx);
	editor::publish_markers(ctx);
}

/// Routes one inbound message from `surface` to its handler.
pub(crate) async fn dispatch(ctx: &mut HostContext, surface: SurfaceId, message: Message) {
	if ctx.bus.phase(surface) == SurfacePhase::Detached {
		tracing::debug!(%surface, kind = message.kind(), "ignoring message from detached surface");
		return;
	}
	let parsed = match SurfaceMessage::parse(&message) {
		Ok(parsed) => parsed,
		Err(err) => {
			reject_payload(ctx, surface, &message, err);
			return;
		}
	};
	tracing::debug!(%surface, kind = message.kind(), "inbound message");

	match parsed {
		SurfaceMessage::Ready => handshake(ctx, surface),
		SurfaceMessage::RequestActiveEditor => {
			let editor = ctx.collab.editor.clone();
			ctx.tasks
				.reply(surface, async move { HostMessage::ActiveEditor(editor.active_editor().await) });
		}
		SurfaceMessage::GenerateCommit(req) => generate_commit(ctx, surface, req),
		SurfaceMessage::ChatMessage(req) => chat(ctx, surface, req),
		SurfaceMessage::ApplyEdit(req) => apply_edit(ctx, surface, req),
		SurfaceMessage::Command(req) => commands::run(ctx, surface, req).await,
		SurfaceMessage::Feedback(feedback) => {
			tracing::info!(
				%surface,
				rating = feedback.rating.as_deref().unwrap_or("none"),
				comment = feedback.comment.as_deref().unwrap_or(""),
				"feedback received"
			);
		}
		SurfaceMessage::Unknown(kind) => {
			tracing::debug!(%surface, kind = %kind, "ignoring unknown message type");
		}
	}
}

/// Completes the readiness handshake and re-sends the current state to `surface` alone.
fn handshake(ctx: &mut HostContext, surface: SurfaceId) {
	let flush = ctx.bus.mark_ready(surface);
	match flush.transition {
		ReadyTransition::Became => {
			tracing::info!(%surface, flushed = flush.flushed, "surface ready");
		}
		ReadyTransition::Already => {
			tracing::debug!(%surface, "repeated handshake");
		}
		ReadyTransition::Detached => return,
	}
	for message in ctx.snapshot_messages() {
		ctx.bus.send(surface, message);
	}
}

/// Validates and applies a feature switch. A change is broadcast to every surface.
pub(crate) async fn switch_feature(ctx: &mut HostContext, feature: Option<FeatureId>) -> Result<(), ValidationError> {
	if let Some(feature) = &feature
		&& !ctx.features.contains(feature)
	{
		return Err(ValidationError::UnknownFeature(feature.to_string()));
	}
	ctx.write_state(|state| state.active_feature = feature).await;
	Ok(())
}

fn generate_commit(ctx: &mut HostContext, surface: SurfaceId, req: CommitRequest) {
	let editor = ctx.collab.editor.clone();
	let generator = ctx.collab.generator.clone();
	ctx.tasks.reply(surface, async move {
		let result = commit_message(editor, generator, req.uri).await;
		HostMessage::CommitResult(reply_from(surface, GenerationKind::Commit, result))
	});
}

async fn commit_message(
	editor: Arc<dyn EditorSource>,
	generator: Arc<dyn GenerationService>,
	uri: Option<String>,
) -> Result<String, GenerationError> {
	let diff = match uri {
		Some(uri) => editor.diff_for_resource(&uri).await?,
		None => editor.workspace_diff().await?,
	};
	if diff.trim().is_empty() {
		return Err(GenerationError::NothingToDescribe);
	}
	generator.generate(GenerationKind::Commit, &diff).await
}

fn chat(ctx: &mut HostContext, surface: SurfaceId, req: ChatRequest) {
	if req.text.trim().is_empty() {
		ctx.bus.send(surface, HostMessage::ChatReply(Reply::failed(ValidationError::EmptyText.to_string())));
		return;
	}
	let generator = ctx.collab.generator.clone();
	ctx.tasks.reply(surface, async move {
		let result = generator.generate(GenerationKind::Chat, &req.text).await;
		HostMessage::ChatReply(reply_from(surface, GenerationKind::Chat, result))
	});
}

fn reply_from(surface: SurfaceId, kind: GenerationKind, result: Result<String, GenerationError>) -> Reply {
	match result {
		Ok(text) => Reply::text(text),
		Err(err) => {
			tracing::warn!(%surface, ?kind, error = %err, "generation failed");
			Reply::failed(err.to_string())
		}
	}
}

fn apply_edit(ctx: &mut HostContext, surface: SurfaceId, req: ApplyEditRequest) {
	if let Err(err) = validate_edit(&req) {
		tracing::debug!(%surface, error = %err, "rejecting edit");
		ctx.bus.send(surface, HostMessage::ApplyEditResult(Reply::failed(err.to_string())));
		return;
	}
	let editor = ctx.collab.editor.clone();
	ctx.tasks.reply(surface, async move {
		let reply = match editor.apply_edits(&req.uri, &req.edits).await {
			Ok(()) => Reply::done(),
			Err(err) => {
				tracing::warn!(%surface, uri = %req.uri, error = %err, "edit failed");
				Reply::failed(err.to_string())
			}
		};
		HostMessage::ApplyEditResult(reply)
	});
}

fn validate_edit(req: &ApplyEditRequest) -> Result<(), ValidationError> {
	if url::Url::parse(&req.uri).is_err() {
		return Err(ValidationError::Resource(req.uri.clone()));
	}
	if req.edits.is_empty() {
		return Err(ValidationError::NoEdits);
	}
	if let Some(index) = req.edits.iter().position(|edit| !edit.range.is_ordered()) {
		return Err(ValidationError::UnorderedRange(index));
	}
	Ok(())
}

/// Answers a known tag with an unusable payload on its matching result type.
fn reject_payload(ctx: &mut HostContext, surface: SurfaceId, message: &Message, err: PayloadError) {
	tracing::debug!(%surface, error = %err, "malformed payload");
	let reply = Reply::failed(ValidationError::from(err).to_string());
	let response = match message.kind() {
		tag::GENERATE_COMMIT => HostMessage::CommitResult(reply),
		tag::CHAT_MESSAGE => HostMessage::ChatReply(reply),
		tag::APPLY_EDIT => HostMessage::ApplyEditResult(reply),
		tag::COMMAND => HostMessage::CommandResult(CommandOutcome {
			command: message
				.payload()
				.get("command")
				.and_then(|c| c.as_str())
				.unwrap_or_default()
				.to_string(),
			reply,
		}),
		_ => return,
	};
	ctx.bus.send(surface, response);
}
