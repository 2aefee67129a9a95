pub mod parse;
pub mod texts;

use chrono::Utc;
use tracing::{debug, warn};

use crate::backend::{ActionsBackend, AssistantBackend, BackendResult, ResourcePayload};
use crate::confirm::ConfirmationStore;
use crate::error::Error;
use crate::usage::{LicenseCheck, MessageRecord, UsageStore};

pub use parse::{COMMAND_PREFIX, ParsedCommand, parse_command};

/// An inbound chat message. One per transport event, discarded after handling.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub conversation_id: i64,
    pub sender_id: i64,
    pub message_id: i64,
    pub text: String,
}

impl InboundMessage {
    pub fn is_command(&self) -> bool {
        self.text.starts_with(COMMAND_PREFIX)
    }
}

/// Outbound reply sink for one conversation.
///
/// Backend-dependent commands send twice — a provisional notice, then the
/// result — so the sink must deliver sends in call order. Test harnesses
/// implement this with a collecting buffer.
pub trait Outbox: Send + Sync {
    fn send(&self, text: &str) -> impl std::future::Future<Output = Result<(), Error>> + Send;
}

/// Routes each inbound message to exactly one handler.
///
/// Stateless across invocations except via the confirmation store it
/// delegates to; safe to share across concurrent per-message tasks.
pub struct Router<B, A, U> {
    actions: B,
    assistant: A,
    confirmations: ConfirmationStore,
    usage: U,
}

impl<B, A, U> Router<B, A, U>
where
    B: ActionsBackend,
    A: AssistantBackend,
    U: UsageStore,
{
    pub fn new(actions: B, assistant: A, usage: U) -> Self {
        Self {
            actions,
            assistant,
            confirmations: ConfirmationStore::new(),
            usage,
        }
    }

    pub fn confirmations(&self) -> &ConfirmationStore {
        &self.confirmations
    }

    /// Handle one inbound message, producing at most one reply sequence on
    /// the outbox. Backend failures become replies, not errors; an `Err`
    /// here means the outbox itself failed.
    pub async fn handle<O: Outbox>(&self, msg: &InboundMessage, outbox: &O) -> Result<(), Error> {
        self.record(msg).await;

        match parse_command(&msg.text) {
            Some(cmd) => self.dispatch_command(msg, &cmd, outbox).await,
            None => self.run_assistant(msg.conversation_id, &msg.text, outbox).await,
        }
    }

    async fn dispatch_command<O: Outbox>(
        &self,
        msg: &InboundMessage,
        cmd: &ParsedCommand,
        outbox: &O,
    ) -> Result<(), Error> {
        match cmd.name.as_str() {
            "start" => outbox.send(&texts::welcome()).await,
            "help" | "ayuda" => outbox.send(&texts::help()).await,
            "status" => outbox.send(&texts::status()).await,
            "menu" => outbox.send(&texts::menu()).await,
            "licencias" => outbox.send(&texts::licenses_help()).await,
            "tasks" => self.handle_tasks(outbox).await,
            "orders" => self.handle_orders(cmd.arg(0), outbox).await,
            "deploy" => self.handle_deploy(cmd.arg(0), outbox).await,
            "commandcenter" | "dashboard" | "miniapps" | "tools" | "terminal" => {
                self.handle_resource(&cmd.name, outbox).await
            }
            "nova" => self.handle_nova(msg.conversation_id, &cmd.tail(), outbox).await,
            "confirm" => self.handle_confirm(msg.conversation_id, outbox).await,
            "cancel" => self.handle_cancel(msg.conversation_id, outbox).await,
            "license" | "validar" => self.handle_license(msg.sender_id, cmd.arg(0), outbox).await,
            "mylicenses" => self.handle_mylicenses(msg.sender_id, outbox).await,
            "registrar" => self.handle_register(msg.sender_id, cmd.arg(0), outbox).await,
            "stats" => self.handle_stats(outbox).await,
            "ping" => self.handle_ping(outbox).await,
            other => {
                // No handler claims the token; matches the source behavior of
                // dropping unrecognized commands without a reply.
                debug!(command = other, "unrecognized command ignored");
                Ok(())
            }
        }
    }

    /// Best-effort analytics write. Failures degrade the side-effect only;
    /// the command must still complete and reply normally.
    async fn record(&self, msg: &InboundMessage) {
        let record = MessageRecord {
            sender_id: msg.sender_id,
            conversation_id: msg.conversation_id,
            message_id: msg.message_id,
            text: msg.text.clone(),
            command: parse_command(&msg.text).map(|c| c.name),
            sent_at: Utc::now(),
        };
        if let Err(e) = self.usage.record_message(&record).await {
            warn!(error = %e, sender_id = msg.sender_id, "usage recording failed");
        }
    }

    // --- Structured-action commands ---

    async fn handle_tasks<O: Outbox>(&self, outbox: &O) -> Result<(), Error> {
        outbox.send("Fetching tasks...").await?;
        match self.actions.task_board().await {
            Ok(board) if board.is_empty() => outbox.send("No tasks found.").await,
            Ok(board) => {
                let lines: Vec<String> = board
                    .column_counts()
                    .iter()
                    .map(|(column, count)| format!("- {column}: {count}"))
                    .collect();
                outbox
                    .send(&format!("Task board\n\n{}", lines.join("\n")))
                    .await
            }
            Err(e) => outbox.send(&format!("Error fetching tasks: {e}")).await,
        }
    }

    async fn handle_orders<O: Outbox>(&self, status: Option<&str>, outbox: &O) -> Result<(), Error> {
        outbox.send("Fetching orders...").await?;
        match self.actions.orders(status).await {
            Ok(count) => {
                let mut reply = format!("Orders\n\nTotal: {count}\n");
                if let Some(status) = status {
                    reply.push_str(&format!("Status: {status}\n"));
                }
                reply.push_str("\nUse /orders <status> to filter");
                outbox.send(&reply).await
            }
            Err(e) => outbox.send(&format!("Error fetching orders: {e}")).await,
        }
    }

    async fn handle_deploy<O: Outbox>(&self, phase: Option<&str>, outbox: &O) -> Result<(), Error> {
        outbox.send("Fetching deployment info...").await?;
        match self.actions.deploy(phase).await {
            Ok(plan) => {
                let phase = plan.phase.as_deref().unwrap_or("All phases");
                let actions: Vec<String> =
                    plan.actions.iter().map(|a| format!("- {a}")).collect();
                outbox
                    .send(&format!("Deployment: {phase}\n\n{}", actions.join("\n")))
                    .await
            }
            Err(e) => outbox.send(&format!("Error fetching deployment info: {e}")).await,
        }
    }

    async fn handle_resource<O: Outbox>(&self, name: &str, outbox: &O) -> Result<(), Error> {
        outbox.send(&format!("Fetching {name}...")).await?;
        match self.actions.resource(name).await {
            Ok(ResourcePayload::Text(text)) => outbox.send(&text).await,
            Ok(ResourcePayload::Link(url)) => outbox.send(&format!("{name}: {url}")).await,
            Ok(ResourcePayload::Raw(value)) => {
                let rendered =
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                outbox.send(&rendered).await
            }
            Err(e) => outbox.send(&format!("Error fetching {name}: {e}")).await,
        }
    }

    // --- Assistant and confirmation ---

    async fn handle_nova<O: Outbox>(
        &self,
        conversation_id: i64,
        prompt: &str,
        outbox: &O,
    ) -> Result<(), Error> {
        if prompt.is_empty() {
            return outbox.send(texts::NOVA_USAGE).await;
        }
        outbox.send("Thinking...").await?;
        self.run_assistant(conversation_id, prompt, outbox).await
    }

    async fn run_assistant<O: Outbox>(
        &self,
        conversation_id: i64,
        prompt: &str,
        outbox: &O,
    ) -> Result<(), Error> {
        match self.assistant.ask(prompt, false).await {
            BackendResult::RequiresConfirmation(reasons) => {
                self.confirmations.set(conversation_id, prompt);
                let why = if reasons.is_empty() {
                    "sensitive action".to_string()
                } else {
                    reasons.join(", ")
                };
                outbox
                    .send(&format!(
                        "I need confirmation before executing: {why}.\nReply /confirm or /cancel."
                    ))
                    .await
            }
            BackendResult::Text(text) if text.is_empty() => outbox.send("Done.").await,
            BackendResult::Text(text) => outbox.send(&text).await,
            BackendResult::Failure(message) => {
                outbox
                    .send(&format!("Sorry, the assistant is unavailable: {message}"))
                    .await
            }
        }
    }

    async fn handle_confirm<O: Outbox>(&self, conversation_id: i64, outbox: &O) -> Result<(), Error> {
        // Removed before the backend call: the transition back to idle is
        // unconditional on invocation, not on backend success.
        let pending = match self.confirmations.take(conversation_id) {
            Some(pending) => pending,
            None => return outbox.send("Nothing pending to confirm.").await,
        };

        match self.assistant.ask(&pending.prompt, true).await {
            BackendResult::Text(text) if !text.is_empty() => outbox.send(&text).await,
            BackendResult::Text(_) | BackendResult::RequiresConfirmation(_) => {
                outbox.send("Confirmed. What's next?").await
            }
            BackendResult::Failure(message) => {
                outbox.send(&format!("Error confirming: {message}")).await
            }
        }
    }

    async fn handle_cancel<O: Outbox>(&self, conversation_id: i64, outbox: &O) -> Result<(), Error> {
        self.confirmations.clear(conversation_id);
        outbox.send("Action cancelled.").await
    }

    // --- Usage store commands ---

    async fn handle_license<O: Outbox>(
        &self,
        sender_id: i64,
        key: Option<&str>,
        outbox: &O,
    ) -> Result<(), Error> {
        let Some(key) = key else {
            return outbox.send(texts::LICENSE_USAGE).await;
        };
        outbox.send("Validating license...").await?;
        match self.usage.validate_license(sender_id, key).await {
            Ok(LicenseCheck::Valid {
                plan,
                expires_at,
                features,
            }) => {
                let expires = expires_at
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "Never".into());
                let mut reply = format!("License valid\n\nKey: {key}\nPlan: {plan}\nExpires: {expires}");
                if !features.is_empty() {
                    reply.push_str("\nFeatures:\n");
                    for feature in &features {
                        reply.push_str(&format!("- {feature}\n"));
                    }
                }
                outbox.send(reply.trim_end()).await
            }
            Ok(LicenseCheck::Invalid { reason }) => {
                outbox
                    .send(&format!("License invalid\n\nKey: {key}\nReason: {reason}"))
                    .await
            }
            Err(e) => outbox.send(&format!("Validation error: {e}")).await,
        }
    }

    async fn handle_mylicenses<O: Outbox>(&self, sender_id: i64, outbox: &O) -> Result<(), Error> {
        match self.usage.recent_validations(sender_id, 5).await {
            Ok(list) if list.is_empty() => {
                outbox
                    .send("No license checks on record. Use /license <key> to validate one.")
                    .await
            }
            Ok(list) => {
                let lines: Vec<String> = list
                    .iter()
                    .map(|v| {
                        format!(
                            "- {} — {} ({})",
                            v.key,
                            v.result,
                            v.validated_at.format("%Y-%m-%d")
                        )
                    })
                    .collect();
                outbox
                    .send(&format!("Your recent validations\n\n{}", lines.join("\n")))
                    .await
            }
            Err(e) => outbox.send(&format!("Error fetching licenses: {e}")).await,
        }
    }

    async fn handle_register<O: Outbox>(
        &self,
        sender_id: i64,
        email: Option<&str>,
        outbox: &O,
    ) -> Result<(), Error> {
        let Some(email) = email else {
            return outbox.send(texts::REGISTER_USAGE).await;
        };
        match self.usage.link_email(sender_id, email).await {
            Ok(()) => outbox.send(&format!("Email registered: {email}")).await,
            Err(e) => outbox.send(&format!("Error registering email: {e}")).await,
        }
    }

    async fn handle_stats<O: Outbox>(&self, outbox: &O) -> Result<(), Error> {
        match self.usage.totals().await {
            Ok(totals) => {
                outbox
                    .send(&format!(
                        "Usage statistics\n\nUsers: {}\nMessages: {}\nCommands: {}",
                        totals.users, totals.messages, totals.commands
                    ))
                    .await
            }
            Err(e) => outbox.send(&format!("Error fetching statistics: {e}")).await,
        }
    }

    async fn handle_ping<O: Outbox>(&self, outbox: &O) -> Result<(), Error> {
        let actions = match self.actions.ping().await {
            Ok(()) => "actions backend: ok".to_string(),
            Err(e) => format!("actions backend: offline ({e})"),
        };
        let usage = match self.usage.ping().await {
            Ok(()) => "usage store: ok".to_string(),
            Err(e) => format!("usage store: error ({e})"),
        };
        outbox.send(&format!("Ping\n\n{actions}\n{usage}")).await
    }
}
