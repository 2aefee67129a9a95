use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One inbound message, recorded for analytics. Fire-and-forget: the
/// dispatcher attempts the write once and ignores failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender_id: i64,
    pub conversation_id: i64,
    pub message_id: i64,
    pub text: String,
    /// Command name (without prefix) when the message was a command.
    pub command: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn is_command(&self) -> bool {
        self.command.is_some()
    }
}

/// Aggregate counters across all users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTotals {
    pub users: u64,
    pub messages: u64,
    pub commands: u64,
}

/// Outcome of a license key validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseCheck {
    Valid {
        plan: String,
        expires_at: Option<DateTime<Utc>>,
        features: Vec<String>,
    },
    Invalid {
        reason: String,
    },
}

/// A past validation attempt, shown by `/mylicenses`.
#[derive(Debug, Clone)]
pub struct LicenseValidation {
    pub key: String,
    pub result: String,
    pub validated_at: DateTime<Utc>,
}

/// Trait for the external usage/license store.
///
/// The core owns no invariants over this data beyond "attempt once, ignore
/// failure" for writes. Implementors must be thread-safe (`Send + Sync`).
pub trait UsageStore: Send + Sync {
    /// Upsert the sender's user record (message/command counters, last
    /// command) and append the message to the log.
    fn record_message(
        &self,
        record: &MessageRecord,
    ) -> impl std::future::Future<Output = Result<(), Error>> + Send;

    /// Validate a license key, logging the attempt against the sender.
    fn validate_license(
        &self,
        sender_id: i64,
        key: &str,
    ) -> impl std::future::Future<Output = Result<LicenseCheck, Error>> + Send;

    /// Most recent validation attempts by the sender, newest first.
    fn recent_validations(
        &self,
        sender_id: i64,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<LicenseValidation>, Error>> + Send;

    /// Attach an email address to the sender's user record.
    fn link_email(
        &self,
        sender_id: i64,
        email: &str,
    ) -> impl std::future::Future<Output = Result<(), Error>> + Send;

    fn totals(&self) -> impl std::future::Future<Output = Result<UsageTotals, Error>> + Send;

    /// Liveness probe for `/ping`.
    fn ping(&self) -> impl std::future::Future<Output = Result<(), Error>> + Send;
}

#[derive(Debug, Clone, Default)]
struct UserRecord {
    message_count: u64,
    command_count: u64,
    last_command: Option<String>,
    email: Option<String>,
    last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct LicensePlan {
    plan: String,
    expires_at: Option<DateTime<Utc>>,
    features: Vec<String>,
}

/// In-memory usage store using `std::sync::RwLock` (not tokio — matches the
/// codebase pattern for locks never held across `.await`). Used in tests and
/// in deployments without a database.
pub struct InMemoryUsageStore {
    users: RwLock<HashMap<i64, UserRecord>>,
    messages: RwLock<Vec<MessageRecord>>,
    licenses: RwLock<HashMap<String, LicensePlan>>,
    validations: RwLock<HashMap<i64, Vec<LicenseValidation>>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            messages: RwLock::new(Vec::new()),
            licenses: RwLock::new(HashMap::new()),
            validations: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a known-good license key.
    pub fn register_license(
        &self,
        key: impl Into<String>,
        plan: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        features: Vec<String>,
    ) {
        if let Ok(mut licenses) = self.licenses.write() {
            licenses.insert(
                key.into(),
                LicensePlan {
                    plan: plan.into(),
                    expires_at,
                    features,
                },
            );
        }
    }

    fn poisoned(e: impl std::fmt::Display) -> Error {
        Error::Store(format!("lock poisoned: {e}"))
    }
}

impl Default for InMemoryUsageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageStore for InMemoryUsageStore {
    async fn record_message(&self, record: &MessageRecord) -> Result<(), Error> {
        {
            let mut users = self.users.write().map_err(Self::poisoned)?;
            let user = users.entry(record.sender_id).or_default();
            user.message_count += 1;
            if let Some(command) = &record.command {
                user.command_count += 1;
                user.last_command = Some(command.clone());
            }
            user.last_seen_at = Some(record.sent_at);
        }
        let mut messages = self.messages.write().map_err(Self::poisoned)?;
        messages.push(record.clone());
        Ok(())
    }

    async fn validate_license(&self, sender_id: i64, key: &str) -> Result<LicenseCheck, Error> {
        let check = {
            let licenses = self.licenses.read().map_err(Self::poisoned)?;
            match licenses.get(key) {
                Some(plan) if plan.expires_at.is_some_and(|at| at < Utc::now()) => {
                    LicenseCheck::Invalid {
                        reason: "expired".into(),
                    }
                }
                Some(plan) => LicenseCheck::Valid {
                    plan: plan.plan.clone(),
                    expires_at: plan.expires_at,
                    features: plan.features.clone(),
                },
                None => LicenseCheck::Invalid {
                    reason: "unknown key".into(),
                },
            }
        };

        let result = match &check {
            LicenseCheck::Valid { .. } => "valid",
            LicenseCheck::Invalid { .. } => "invalid",
        };
        let mut validations = self.validations.write().map_err(Self::poisoned)?;
        validations
            .entry(sender_id)
            .or_default()
            .push(LicenseValidation {
                key: key.to_string(),
                result: result.into(),
                validated_at: Utc::now(),
            });
        Ok(check)
    }

    async fn recent_validations(
        &self,
        sender_id: i64,
        limit: usize,
    ) -> Result<Vec<LicenseValidation>, Error> {
        let validations = self.validations.read().map_err(Self::poisoned)?;
        let mut list = validations.get(&sender_id).cloned().unwrap_or_default();
        list.reverse(); // newest first
        list.truncate(limit);
        Ok(list)
    }

    async fn link_email(&self, sender_id: i64, email: &str) -> Result<(), Error> {
        let mut users = self.users.write().map_err(Self::poisoned)?;
        users.entry(sender_id).or_default().email = Some(email.to_string());
        Ok(())
    }

    async fn totals(&self) -> Result<UsageTotals, Error> {
        let users = self.users.read().map_err(Self::poisoned)?;
        let messages = self.messages.read().map_err(Self::poisoned)?;
        Ok(UsageTotals {
            users: users.len() as u64,
            messages: messages.len() as u64,
            commands: messages.iter().filter(|m| m.is_command()).count() as u64,
        })
    }

    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }
}

// --- PostgreSQL usage store ---

#[cfg(feature = "postgres")]
mod postgres_usage {
    use super::*;

    /// PostgreSQL-backed usage store.
    ///
    /// Uses `sqlx` runtime queries (no compile-time macros). Three tables:
    /// `chat_users` (counters keyed by sender id), `chat_messages`
    /// (append-only log) and `licenses`/`license_validations`.
    pub struct PostgresUsageStore {
        pool: sqlx::PgPool,
    }

    impl PostgresUsageStore {
        /// Create from an existing connection pool.
        pub fn new(pool: sqlx::PgPool) -> Self {
            Self { pool }
        }

        /// Connect to PostgreSQL using the given URL.
        pub async fn connect(database_url: &str) -> Result<Self, Error> {
            let pool = sqlx::PgPool::connect(database_url)
                .await
                .map_err(|e| Error::Store(format!("database connection failed: {e}")))?;
            Ok(Self { pool })
        }

        /// Run the usage tables migration. Safe to call multiple times.
        pub async fn run_migration(&self) -> Result<(), Error> {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS chat_users (
                    sender_id      BIGINT PRIMARY KEY,
                    message_count  BIGINT NOT NULL DEFAULT 0,
                    command_count  BIGINT NOT NULL DEFAULT 0,
                    last_command   TEXT,
                    email          TEXT,
                    last_seen_at   TIMESTAMPTZ
                );

                CREATE TABLE IF NOT EXISTS chat_messages (
                    id               BIGSERIAL PRIMARY KEY,
                    sender_id        BIGINT NOT NULL,
                    conversation_id  BIGINT NOT NULL,
                    message_id       BIGINT NOT NULL,
                    message_text     TEXT NOT NULL,
                    command          TEXT,
                    sent_at          TIMESTAMPTZ NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_chat_messages_sender
                    ON chat_messages(sender_id);

                CREATE TABLE IF NOT EXISTS licenses (
                    key         TEXT PRIMARY KEY,
                    plan        TEXT NOT NULL,
                    expires_at  TIMESTAMPTZ,
                    features    TEXT[] NOT NULL DEFAULT '{}'
                );

                CREATE TABLE IF NOT EXISTS license_validations (
                    id            BIGSERIAL PRIMARY KEY,
                    sender_id     BIGINT NOT NULL,
                    key           TEXT NOT NULL,
                    result        TEXT NOT NULL,
                    validated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE INDEX IF NOT EXISTS idx_license_validations_sender
                    ON license_validations(sender_id);
                "#,
            )
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("usage migration failed: {e}")))?;
            Ok(())
        }
    }

    #[derive(sqlx::FromRow)]
    struct LicenseRow {
        plan: String,
        expires_at: Option<DateTime<Utc>>,
        features: Vec<String>,
    }

    #[derive(sqlx::FromRow)]
    struct ValidationRow {
        key: String,
        result: String,
        validated_at: DateTime<Utc>,
    }

    impl UsageStore for PostgresUsageStore {
        async fn record_message(&self, record: &MessageRecord) -> Result<(), Error> {
            sqlx::query(
                r#"
                INSERT INTO chat_users (sender_id, message_count, command_count, last_command, last_seen_at)
                VALUES ($1, 1, $2, $3, $4)
                ON CONFLICT (sender_id) DO UPDATE SET
                    message_count = chat_users.message_count + 1,
                    command_count = chat_users.command_count + $2,
                    last_command  = COALESCE($3, chat_users.last_command),
                    last_seen_at  = $4
                "#,
            )
            .bind(record.sender_id)
            .bind(if record.is_command() { 1i64 } else { 0i64 })
            .bind(&record.command)
            .bind(record.sent_at)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("user upsert failed: {e}")))?;

            sqlx::query(
                r#"
                INSERT INTO chat_messages (sender_id, conversation_id, message_id, message_text, command, sent_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(record.sender_id)
            .bind(record.conversation_id)
            .bind(record.message_id)
            .bind(&record.text)
            .bind(&record.command)
            .bind(record.sent_at)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("message log failed: {e}")))?;
            Ok(())
        }

        async fn validate_license(&self, sender_id: i64, key: &str) -> Result<LicenseCheck, Error> {
            let row: Option<LicenseRow> =
                sqlx::query_as("SELECT plan, expires_at, features FROM licenses WHERE key = $1")
                    .bind(key)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| Error::Store(format!("license lookup failed: {e}")))?;

            let check = match row {
                Some(row) if row.expires_at.is_some_and(|at| at < Utc::now()) => {
                    LicenseCheck::Invalid {
                        reason: "expired".into(),
                    }
                }
                Some(row) => LicenseCheck::Valid {
                    plan: row.plan,
                    expires_at: row.expires_at,
                    features: row.features,
                },
                None => LicenseCheck::Invalid {
                    reason: "unknown key".into(),
                },
            };

            let result = match &check {
                LicenseCheck::Valid { .. } => "valid",
                LicenseCheck::Invalid { .. } => "invalid",
            };
            sqlx::query(
                "INSERT INTO license_validations (sender_id, key, result) VALUES ($1, $2, $3)",
            )
            .bind(sender_id)
            .bind(key)
            .bind(result)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("validation log failed: {e}")))?;
            Ok(check)
        }

        async fn recent_validations(
            &self,
            sender_id: i64,
            limit: usize,
        ) -> Result<Vec<LicenseValidation>, Error> {
            let rows: Vec<ValidationRow> = sqlx::query_as(
                r#"
                SELECT key, result, validated_at FROM license_validations
                WHERE sender_id = $1 ORDER BY validated_at DESC LIMIT $2
                "#,
            )
            .bind(sender_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("validation query failed: {e}")))?;

            Ok(rows
                .into_iter()
                .map(|row| LicenseValidation {
                    key: row.key,
                    result: row.result,
                    validated_at: row.validated_at,
                })
                .collect())
        }

        async fn link_email(&self, sender_id: i64, email: &str) -> Result<(), Error> {
            sqlx::query(
                r#"
                INSERT INTO chat_users (sender_id, email) VALUES ($1, $2)
                ON CONFLICT (sender_id) DO UPDATE SET email = $2
                "#,
            )
            .bind(sender_id)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("email link failed: {e}")))?;
            Ok(())
        }

        async fn totals(&self) -> Result<UsageTotals, Error> {
            let (users, messages, commands): (i64, i64, i64) = sqlx::query_as(
                r#"
                SELECT
                    (SELECT count(*) FROM chat_users),
                    (SELECT count(*) FROM chat_messages),
                    (SELECT count(*) FROM chat_messages WHERE command IS NOT NULL)
                "#,
            )
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Store(format!("totals query failed: {e}")))?;

            Ok(UsageTotals {
                users: users as u64,
                messages: messages as u64,
                commands: commands as u64,
            })
        }

        async fn ping(&self) -> Result<(), Error> {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| Error::Store(format!("ping failed: {e}")))?;
            Ok(())
        }
    }
}

#[cfg(feature = "postgres")]
pub use postgres_usage::PostgresUsageStore;
