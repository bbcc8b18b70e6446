//! OpenAI-compatible chat completions client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devpilot_host::config::GenerationConfig;
use devpilot_host::{CredentialStore, GenerationError, GenerationKind, GenerationService};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

/// Longest error body kept in a [`GenerationError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
	model: &'a str,
	messages: Vec<ChatTurn<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
	role: &'static str,
	content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
	#[serde(default)]
	choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
	message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
	content: Option<String>,
}

/// [`GenerationService`] that posts to a `/chat/completions` endpoint.
///
/// The API key is looked up on every request, so a key stored through
/// `devpilot.setOpenAIKey` takes effect without a restart.
pub struct ChatCompletions {
	client: Client,
	endpoint: String,
	model: String,
	credential_key: String,
	commit_prompt: String,
	timeout: Duration,
	credentials: Arc<dyn CredentialStore>,
}

impl ChatCompletions {
	/// Builds a client from the `[generation]` config section.
	pub fn new(config: &GenerationConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self, GenerationError> {
		let client = Client::builder()
			.user_agent(concat!("devpilot/", env!("CARGO_PKG_VERSION")))
			.build()
			.map_err(|e| GenerationError::Network(e.to_string()))?;
		Ok(Self {
			client,
			endpoint: config.endpoint.clone(),
			model: config.model.clone(),
			credential_key: config.credential_key.clone(),
			commit_prompt: config.commit_prompt.clone(),
			timeout: config.timeout(),
			credentials,
		})
	}

	fn request<'a>(&'a self, kind: GenerationKind, input: &'a str) -> ChatRequest<'a> {
		let mut messages = Vec::with_capacity(2);
		if kind == GenerationKind::Commit {
			messages.push(ChatTurn {
				role: "system",
				content: &self.commit_prompt,
			});
		}
		messages.push(ChatTurn {
			role: "user",
			content: input,
		});
		ChatRequest {
			model: &self.model,
			messages,
		}
	}

	async fn api_key(&self) -> Result<String, GenerationError> {
		match self.credentials.get(&self.credential_key).await {
			Ok(Some(key)) => Ok(key),
			Ok(None) => Err(GenerationError::MissingCredential(self.credential_key.clone())),
			Err(err) => {
				tracing::warn!(key = %self.credential_key, error = %err, "credential lookup failed");
				Err(GenerationError::MissingCredential(self.credential_key.clone()))
			}
		}
	}
}

#[async_trait]
impl GenerationService for ChatCompletions {
	async fn generate(&self, kind: GenerationKind, input: &str) -> Result<String, GenerationError> {
		let key = self.api_key().await?;
		let request = self.request(kind, input);

		tracing::debug!(?kind, model = %self.model, bytes = input.len(), "generation request");
		let response = self
			.client
			.post(&self.endpoint)
			.header(CONTENT_TYPE, "application/json")
			.bearer_auth(key)
			.json(&request)
			.timeout(self.timeout)
			.send()
			.await
			.map_err(|e| GenerationError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(GenerationError::Status {
				status: status.as_u16(),
				body: truncate(body),
			});
		}

		let body: ChatResponse = response
			.json()
			.await
			.map_err(|e| GenerationError::Network(format!("invalid response: {e}")))?;
		completion_text(body)
	}
}

fn completion_text(response: ChatResponse) -> Result<String, GenerationError> {
	response
		.choices
		.into_iter()
		.next()
		.and_then(|choice| choice.message)
		.and_then(|message| message.content)
		.map(|text| text.trim().to_string())
		.filter(|text| !text.is_empty())
		.ok_or(GenerationError::Empty)
}

fn truncate(mut body: String) -> String {
	if body.len() > MAX_ERROR_BODY {
		let mut end = MAX_ERROR_BODY;
		while !body.is_char_boundary(end) {
			end -= 1;
		}
		body.truncate(end);
		body.push('…');
	}
	body
}

#[cfg(test)]
mod tests {
	use devpilot_host::PersistenceError;
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	struct NoKey;

	#[async_trait]
	impl CredentialStore for NoKey {
		async fn get(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
			Ok(None)
		}

		async fn set(&self, _key: &str, _secret: &str) -> Result<(), PersistenceError> {
			Ok(())
		}
	}

	fn client() -> ChatCompletions {
		ChatCompletions::new(&GenerationConfig::default(), Arc::new(NoKey)).unwrap()
	}

	#[test]
	fn commit_requests_carry_the_system_prompt() {
		let client = client();
		let body = serde_json::to_value(client.request(GenerationKind::Commit, "diff --git a b")).unwrap();
		assert_eq!(
			body,
			json!({
				"model": "gpt-4o-mini",
				"messages": [
					{"role": "system", "content": "Write concise Git commit messages."},
					{"role": "user", "content": "diff --git a b"},
				],
			})
		);
	}

	#[test]
	fn chat_requests_send_only_the_user_turn() {
		let client = client();
		let body = serde_json::to_value(client.request(GenerationKind::Chat, "hi")).unwrap();
		assert_eq!(body["messages"], json!([{"role": "user", "content": "hi"}]));
	}

	#[test]
	fn first_choice_is_trimmed() {
		let response: ChatResponse = serde_json::from_value(json!({
			"choices": [{"message": {"role": "assistant", "content": "  Fix parser\n"}}],
		}))
		.unwrap();
		assert_eq!(completion_text(response).unwrap(), "Fix parser");
	}

	#[test]
	fn blank_or_missing_choices_are_empty() {
		for body in [json!({}), json!({"choices": []}), json!({"choices": [{"message": {"content": "  "}}]})] {
			let response: ChatResponse = serde_json::from_value(body).unwrap();
			assert!(matches!(completion_text(response), Err(GenerationError::Empty)));
		}
	}

	#[test]
	fn long_error_bodies_are_truncated_on_char_boundaries() {
		let body = truncate("é".repeat(400));
		assert!(body.len() <= MAX_ERROR_BODY + '…'.len_utf8());
		assert!(body.ends_with('…'));
	}

	#[tokio::test]
	async fn missing_key_fails_before_any_request() {
		let err = client().generate(GenerationKind::Chat, "hi").await.unwrap_err();
		assert!(matches!(err, GenerationError::MissingCredential(key) if key == "devpilot.openaiKey"));
	}
}
