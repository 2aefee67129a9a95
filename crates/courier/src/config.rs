use serde::Deserialize;

use crate::error::Error;

fn default_actions_url() -> String {
    "http://localhost:3300".into()
}

fn default_actions_token() -> String {
    "courier-command-bot".into()
}

fn default_fallback_url() -> String {
    "http://localhost:3200".into()
}

fn default_fallback_model() -> String {
    "ollama/llama3.1:8b".into()
}

fn default_assistant_provider() -> String {
    "nova".into()
}

/// Top-level configuration loaded from `courier.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CourierConfig {
    /// Structured-action backend (tasks, orders, deployments, resources).
    #[serde(default)]
    pub actions: ActionsConfig,

    /// Generic chat-completion backend. Used only when no primary
    /// assistant is configured.
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Primary assistant backend. When present it answers all assistant
    /// queries exclusively; the fallback is never consulted.
    pub assistant: Option<AssistantConfig>,

    /// PostgreSQL URL for the usage store. When absent, usage recording
    /// and license lookups run against the in-memory store.
    pub database_url: Option<String>,

    #[cfg(feature = "telegram")]
    #[serde(default)]
    pub telegram: crate::channel::telegram::TelegramConfig,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            actions: ActionsConfig::default(),
            fallback: FallbackConfig::default(),
            assistant: None,
            database_url: None,
            #[cfg(feature = "telegram")]
            telegram: Default::default(),
        }
    }
}

/// Connection settings for the structured-action backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionsConfig {
    #[serde(default = "default_actions_url")]
    pub base_url: String,
    /// Fixed-identity bearer credential sent with every request.
    #[serde(default = "default_actions_token")]
    pub token: String,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            base_url: default_actions_url(),
            token: default_actions_token(),
        }
    }
}

/// Connection settings for the fallback language backend.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_url")]
    pub base_url: String,
    /// Optional `X-API-Key` header value.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model spec in `provider/model` form.
    #[serde(default = "default_fallback_model")]
    pub model: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            base_url: default_fallback_url(),
            api_key: None,
            model: default_fallback_model(),
        }
    }
}

/// Connection settings for the primary assistant backend.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    pub url: String,
    /// Optional `x-api-key` header value.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_assistant_provider")]
    pub provider: String,
}

impl CourierConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let config = CourierConfig::from_toml("").unwrap();
        assert_eq!(config.actions.base_url, "http://localhost:3300");
        assert_eq!(config.actions.token, "courier-command-bot");
        assert_eq!(config.fallback.base_url, "http://localhost:3200");
        assert_eq!(config.fallback.model, "ollama/llama3.1:8b");
        assert!(config.assistant.is_none());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            database_url = "postgres://localhost/courier"

            [actions]
            base_url = "http://actions:3300"
            token = "secret"

            [fallback]
            base_url = "http://llm:3200"
            api_key = "fk"
            model = "ollama/mistral"

            [assistant]
            url = "http://nova:4000/api/assist"
            api_key = "nk"
            provider = "nova"
        "#;
        let config = CourierConfig::from_toml(toml).unwrap();
        assert_eq!(config.actions.base_url, "http://actions:3300");
        assert_eq!(config.actions.token, "secret");
        assert_eq!(config.fallback.api_key.as_deref(), Some("fk"));
        let assistant = config.assistant.unwrap();
        assert_eq!(assistant.url, "http://nova:4000/api/assist");
        assert_eq!(assistant.provider, "nova");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/courier")
        );
    }

    #[test]
    fn assistant_provider_defaults() {
        let toml = r#"
            [assistant]
            url = "http://nova:4000"
        "#;
        let config = CourierConfig::from_toml(toml).unwrap();
        assert_eq!(config.assistant.unwrap().provider, "nova");
    }

    #[test]
    fn invalid_toml_syntax() {
        let err = CourierConfig::from_toml("not valid {{{").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_file() {
        let err =
            CourierConfig::from_file(std::path::Path::new("/nonexistent/courier.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
