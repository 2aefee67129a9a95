pub mod actions;
pub mod assistant;
pub mod fallback;

pub use actions::{ActionsBackend, ActionsClient, DeployPlan, ResourcePayload, TaskBoard};
pub use assistant::PrimaryAssistant;
pub use fallback::FallbackChat;

use crate::config::CourierConfig;

/// Normalized outcome of an assistant backend call.
///
/// All shape-normalization happens inside the backend clients; nothing above
/// this boundary branches on a raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendResult {
    Text(String),
    /// The backend wants an explicit confirm/cancel before acting. Only the
    /// primary assistant can produce this.
    RequiresConfirmation(Vec<String>),
    /// Transport error or non-2xx response, with the underlying error text.
    Failure(String),
}

/// Trait for assistant backends answering free-form prompts.
///
/// Implementors must be thread-safe (`Send + Sync`). Failures are folded into
/// `BackendResult::Failure`; a call is attempted once and never retried.
pub trait AssistantBackend: Send + Sync {
    fn ask(
        &self,
        prompt: &str,
        confirmed: bool,
    ) -> impl std::future::Future<Output = BackendResult> + Send;
}

/// The configuration-time choice of assistant backend.
///
/// Holds exactly one client: when a primary assistant is configured the
/// fallback is never constructed, so a per-request fallback cascade is
/// unrepresentable. Selection happens once at startup, never per request.
pub enum Assistant<P = PrimaryAssistant, F = FallbackChat> {
    Primary(P),
    Fallback(F),
}

impl Assistant {
    pub fn from_config(config: &CourierConfig) -> Self {
        match &config.assistant {
            Some(assistant) => Assistant::Primary(PrimaryAssistant::new(
                &assistant.url,
                assistant.api_key.clone(),
                &assistant.provider,
            )),
            None => Assistant::Fallback(FallbackChat::new(
                &config.fallback.base_url,
                config.fallback.api_key.clone(),
                &config.fallback.model,
            )),
        }
    }
}

impl<P, F> Assistant<P, F> {
    pub fn is_primary(&self) -> bool {
        matches!(self, Assistant::Primary(_))
    }
}

impl<P: AssistantBackend, F: AssistantBackend> AssistantBackend for Assistant<P, F> {
    async fn ask(&self, prompt: &str, confirmed: bool) -> BackendResult {
        match self {
            Assistant::Primary(primary) => primary.ask(prompt, confirmed).await,
            Assistant::Fallback(fallback) => fallback.ask(prompt, confirmed).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CourierConfig;

    #[test]
    fn selection_prefers_configured_primary() {
        let config = CourierConfig::from_toml(
            r#"
            [assistant]
            url = "http://nova:4000"
            "#,
        )
        .unwrap();
        assert!(Assistant::from_config(&config).is_primary());
    }

    #[test]
    fn selection_falls_back_without_primary() {
        let config = CourierConfig::from_toml("").unwrap();
        assert!(!Assistant::from_config(&config).is_primary());
    }

    #[tokio::test]
    async fn enum_dispatches_exclusively() {
        struct Scripted(BackendResult);
        impl AssistantBackend for Scripted {
            async fn ask(&self, _prompt: &str, _confirmed: bool) -> BackendResult {
                self.0.clone()
            }
        }

        let assistant: Assistant<Scripted, Scripted> =
            Assistant::Primary(Scripted(BackendResult::Failure("down".into())));
        // A failing primary stays a failure — there is no fallback to cascade to.
        assert_eq!(
            assistant.ask("hi", false).await,
            BackendResult::Failure("down".into())
        );
    }
}
