use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::{AssistantBackend, BackendResult};
use crate::error::Error;

/// Client for the fallback language backend (generic chat completion).
///
/// Used only when no primary assistant is configured. Its results are always
/// `Text` or `Failure` — it cannot signal a confirmation requirement, so the
/// `confirmed` flag is accepted and ignored.
pub struct FallbackChat {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    provider: String,
    model: String,
}

impl FallbackChat {
    /// `model_spec` is `provider/model`, e.g. `ollama/llama3.1:8b`.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model_spec: &str) -> Self {
        let (provider, model) = split_model_spec(model_spec);
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            provider,
            model,
        }
    }

    async fn try_ask(&self, prompt: &str) -> Result<BackendResult, Error> {
        let body = build_chat_request(&self.provider, &self.model, prompt);

        let mut request = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let value: Value = response.json().await?;
        Ok(BackendResult::Text(parse_chat_response(&value)))
    }
}

impl AssistantBackend for FallbackChat {
    async fn ask(&self, prompt: &str, _confirmed: bool) -> BackendResult {
        match self.try_ask(prompt).await {
            Ok(result) => result,
            Err(e) => {
                debug!(error = %e, "fallback chat call failed");
                BackendResult::Failure(e.to_string())
            }
        }
    }
}

/// Split `provider/model` into its parts; a bare name is both provider-less
/// and the model.
fn split_model_spec(spec: &str) -> (String, String) {
    match spec.split_once('/') {
        Some((provider, model)) => (provider.to_string(), model.to_string()),
        None => (spec.to_string(), spec.to_string()),
    }
}

pub(crate) fn build_chat_request(provider: &str, model: &str, prompt: &str) -> Value {
    json!({
        "provider": provider,
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "stream": false,
    })
}

/// Read the chat-completion nested message first, the flat `response` field
/// second — in that order.
pub(crate) fn parse_chat_response(value: &Value) -> String {
    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .or_else(|| value.get("response").and_then(Value::as_str))
        .unwrap_or("No response")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_model_spec_with_provider() {
        assert_eq!(
            split_model_spec("ollama/llama3.1:8b"),
            ("ollama".into(), "llama3.1:8b".into())
        );
    }

    #[test]
    fn split_model_spec_bare_name() {
        assert_eq!(split_model_spec("mistral"), ("mistral".into(), "mistral".into()));
    }

    #[test]
    fn build_chat_request_shape() {
        let body = build_chat_request("ollama", "llama3.1:8b", "hello");
        assert_eq!(body["provider"], "ollama");
        assert_eq!(body["model"], "llama3.1:8b");
        assert_eq!(body["stream"], false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "hello");
    }

    #[test]
    fn parse_chat_completion_shape() {
        let value = json!({
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}]
        });
        assert_eq!(parse_chat_response(&value), "Hi there");
    }

    #[test]
    fn parse_flat_response_shape() {
        assert_eq!(parse_chat_response(&json!({"response": "Flat"})), "Flat");
    }

    #[test]
    fn nested_message_wins_over_flat() {
        let value = json!({
            "choices": [{"message": {"content": "Nested"}}],
            "response": "Flat"
        });
        assert_eq!(parse_chat_response(&value), "Nested");
    }

    #[test]
    fn parse_empty_payload() {
        assert_eq!(parse_chat_response(&json!({})), "No response");
    }
}
