use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::{AssistantBackend, BackendResult};
use crate::error::Error;

/// Client for the primary assistant backend.
///
/// A single configured endpoint receives `{prompt, provider, confirmed}` and
/// may answer with `meta.requiresConfirmation` to gate a sensitive action.
/// This is the only backend that can produce `RequiresConfirmation`.
pub struct PrimaryAssistant {
    client: Client,
    url: String,
    api_key: Option<String>,
    provider: String,
}

impl PrimaryAssistant {
    pub fn new(url: impl Into<String>, api_key: Option<String>, provider: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key,
            provider: provider.into(),
        }
    }

    async fn try_ask(&self, prompt: &str, confirmed: bool) -> Result<BackendResult, Error> {
        let body = build_request(&self.provider, prompt, confirmed);

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
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
        Ok(parse_response(value))
    }
}

impl AssistantBackend for PrimaryAssistant {
    async fn ask(&self, prompt: &str, confirmed: bool) -> BackendResult {
        match self.try_ask(prompt, confirmed).await {
            Ok(result) => result,
            Err(e) => {
                debug!(error = %e, "primary assistant call failed");
                BackendResult::Failure(e.to_string())
            }
        }
    }
}

pub(crate) fn build_request(provider: &str, prompt: &str, confirmed: bool) -> Value {
    json!({
        "prompt": prompt,
        "provider": provider,
        "confirmed": confirmed,
    })
}

/// Normalize the assistant response: the payload may sit under a `data`
/// field; `meta.requiresConfirmation` wins over any response text.
pub(crate) fn parse_response(value: Value) -> BackendResult {
    let payload = value.get("data").cloned().unwrap_or(value);

    let meta = payload.get("meta");
    let requires_confirmation = meta
        .and_then(|m| m.get("requiresConfirmation"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if requires_confirmation {
        let reasons = meta
            .and_then(|m| m.get("reasons"))
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        return BackendResult::RequiresConfirmation(reasons);
    }

    let text = payload
        .get("response")
        .and_then(Value::as_str)
        .unwrap_or_default();
    BackendResult::Text(text.to_string())
}
