pub mod backend;
#[cfg(feature = "telegram")]
pub mod channel;
pub mod config;
pub mod confirm;
pub mod dispatch;
pub mod error;
pub mod usage;

pub use backend::{
    ActionsBackend, ActionsClient, Assistant, AssistantBackend, BackendResult, FallbackChat,
    PrimaryAssistant,
};
pub use config::{ActionsConfig, AssistantConfig, CourierConfig, FallbackConfig};
pub use confirm::{ConfirmationStore, PendingConfirmation};
pub use dispatch::{InboundMessage, Outbox, ParsedCommand, Router, parse_command};
pub use error::Error;
#[cfg(feature = "postgres")]
pub use usage::PostgresUsageStore;
pub use usage::{InMemoryUsageStore, LicenseCheck, MessageRecord, UsageStore, UsageTotals};
