//! The generic `command` message: name table and handlers.

use std::time::{SystemTime, UNIX_EPOCH};

use devpilot_proto::{CommandOutcome, CommandRequest, FeatureId, HostMessage, QuizScore, Reply, SurfaceId, SurfaceKind};
use serde_json::Value;
use thiserror::Error;

use crate::error::{PersistenceError, ValidationError};
use crate::service::context::HostContext;

pub(crate) const SET_ACTIVE_FEATURE: &str = "devpilot.setActiveFeature";
pub(crate) const OPEN_PANEL: &str = "devpilot.openPanel";
pub(crate) const OPEN_DASHBOARD: &str = "devpilot.openDashboard";
pub(crate) const QUICK_ACTION: &str = "devpilot.quickAction";
pub(crate) const SAVE_QUIZ_PROGRESS: &str = "devpilot.saveQuizProgress";
pub(crate) const SET_OPENAI_KEY: &str = "devpilot.setOpenAIKey";

/// Commands that reveal the primary surface on a specific feature.
const FEATURE_COMMANDS: &[(&str, &str)] = &[
	("devpilot.openCommitGenerator", "commit"),
	("devpilot.openChatbot", "chat"),
	("devpilot.openTodoTracker", "todo"),
	("devpilot.quizHtmlEasy", "quiz-html-easy"),
	("devpilot.quizHtmlMedium", "quiz-html-medium"),
	("devpilot.quizCssEasy", "quiz-css-easy"),
	("devpilot.quizCssHard", "quiz-css-hard"),
	("devpilot.quizJsEasy", "quiz-js-easy"),
	("devpilot.quizJsMedium", "quiz-js-medium"),
];

/// Quick action ids and the command each one runs.
const QUICK_ACTIONS: &[(&str, &str)] = &[
	("learn", OPEN_PANEL),
	("chat", "devpilot.openChatbot"),
	("commit", "devpilot.openCommitGenerator"),
	("todo", "devpilot.openTodoTracker"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
	SetActiveFeature,
	OpenPanel,
	OpenFeature(&'static str),
	QuickAction,
	SaveQuizProgress,
	SetCredential,
}

fn resolve(command: &str) -> Option<Action> {
	match command {
		SET_ACTIVE_FEATURE => Some(Action::SetActiveFeature),
		OPEN_PANEL | OPEN_DASHBOARD => Some(Action::OpenPanel),
		QUICK_ACTION => Some(Action::QuickAction),
		SAVE_QUIZ_PROGRESS => Some(Action::SaveQuizProgress),
		SET_OPENAI_KEY => Some(Action::SetCredential),
		_ => FEATURE_COMMANDS
			.iter()
			.find(|(name, _)| *name == command)
			.map(|(_, feature)| Action::OpenFeature(*feature)),
	}
}

#[derive(Debug, Error)]
enum CommandError {
	#[error(transparent)]
	Invalid(#[from] ValidationError),
	#[error(transparent)]
	Storage(#[from] PersistenceError),
}

/// Executes a command and answers the requester with `commandResult`.
pub(crate) async fn run(ctx: &mut HostContext, surface: SurfaceId, req: CommandRequest) {
	let reply = match execute(ctx, &req.command, &req.args).await {
		Ok(()) => Reply::done(),
		Err(err) => {
			tracing::debug!(%surface, command = %req.command, error = %err, "command rejected");
			Reply::failed(err.to_string())
		}
	};
	ctx.bus.send(
		surface,
		HostMessage::CommandResult(CommandOutcome {
			command: req.command,
			reply,
		}),
	);
}

async fn execute(ctx: &mut HostContext, command: &str, args: &[Value]) -> Result<(), CommandError> {
	let action = resolve(command).ok_or_else(|| ValidationError::UnknownCommand(command.to_string()))?;
	let action = match action {
		Action::QuickAction => {
			let id = string_arg(command, args)?;
			QUICK_ACTIONS
				.iter()
				.find(|(action, _)| *action == id)
				.and_then(|(_, target)| resolve(target))
				.ok_or_else(|| ValidationError::UnknownAction(id.to_string()))?
		}
		other => other,
	};

	match action {
		Action::SetActiveFeature => {
			let feature = feature_arg(command, args)?;
			super::switch_feature(ctx, feature).await?;
		}
		Action::OpenPanel => ctx.collab.workbench.reveal(SurfaceKind::Primary),
		Action::OpenFeature(feature) => {
			ctx.collab.workbench.reveal(SurfaceKind::Primary);
			super::switch_feature(ctx, Some(FeatureId::from(feature))).await?;
		}
		Action::SaveQuizProgress => save_quiz_progress(ctx, command, args).await?,
		Action::SetCredential => {
			let secret = string_arg(command, args)?;
			ctx.collab.credentials.set(&ctx.credential_key, secret).await?;
			tracing::info!(key = %ctx.credential_key, "credential stored");
		}
		Action::QuickAction => {
			return Err(ValidationError::Arguments {
				command: command.to_string(),
				reason: "quick actions cannot be nested",
			}
			.into());
		}
	}
	Ok(())
}

async fn save_quiz_progress(ctx: &mut HostContext, command: &str, args: &[Value]) -> Result<(), ValidationError> {
	let invalid = |reason| ValidationError::Arguments {
		command: command.to_string(),
		reason,
	};
	let [id, score, total] = args else {
		return Err(invalid("expected [quizId, score, total]"));
	};
	let id = id.as_str().filter(|id| !id.is_empty()).ok_or_else(|| invalid("quizId must be a string"))?;
	let score = count(score).ok_or_else(|| invalid("score must be a non-negative integer"))?;
	let total = count(total).ok_or_else(|| invalid("total must be a non-negative integer"))?;
	if score > total {
		return Err(invalid("score exceeds total"));
	}

	let entry = QuizScore {
		score,
		total,
		last_attempt: now_millis(),
	};
	ctx.write_state(|state| {
		state.quiz_progress.insert(id.to_string(), entry);
	})
	.await;
	Ok(())
}

/// First argument as a feature: `"id"`, `null`, `{feature: "id"|null}` or nothing.
fn feature_arg(command: &str, args: &[Value]) -> Result<Option<FeatureId>, ValidationError> {
	let value = match args.first() {
		Some(Value::Object(map)) => map.get("feature").unwrap_or(&Value::Null),
		Some(value) => value,
		None => &Value::Null,
	};
	match value {
		Value::Null => Ok(None),
		Value::String(name) => Ok(Some(FeatureId::new(name.as_str()))),
		_ => Err(ValidationError::Arguments {
			command: command.to_string(),
			reason: "feature must be a string or null",
		}),
	}
}

fn string_arg<'a>(command: &str, args: &'a [Value]) -> Result<&'a str, ValidationError> {
	args.first()
		.and_then(Value::as_str)
		.filter(|s| !s.is_empty())
		.ok_or_else(|| ValidationError::Arguments {
			command: command.to_string(),
			reason: "expected a non-empty string argument",
		})
}

fn count(value: &Value) -> Option<u32> {
	value.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn now_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
