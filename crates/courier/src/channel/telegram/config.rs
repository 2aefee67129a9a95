use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Environment variable consulted when `[telegram].token` is absent.
pub const TOKEN_ENV: &str = "COURIER_TELEGRAM_TOKEN";

/// Access policy for private chats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmPolicy {
    /// Any user may talk to the bot (default).
    #[default]
    Open,
    /// Only users in `allowed_users` may interact.
    Allowlist,
    /// The bot ignores all private messages.
    Disabled,
}

/// Configuration for the Telegram channel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    /// Bot token. Falls back to the `COURIER_TELEGRAM_TOKEN` env var.
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub dm_policy: DmPolicy,

    /// User IDs permitted when `dm_policy` is `allowlist`.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

impl TelegramConfig {
    /// Resolve the bot token: config value first, environment second.
    pub fn resolve_token(&self) -> Result<String, Error> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }
        std::env::var(TOKEN_ENV).map_err(|_| {
            Error::Config(format!(
                "telegram token missing: set [telegram].token or {TOKEN_ENV}"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dm_policy_default_is_open() {
        assert_eq!(DmPolicy::default(), DmPolicy::Open);
    }

    #[test]
    fn dm_policy_serde_names() {
        for (variant, expected) in [
            (DmPolicy::Open, "\"open\""),
            (DmPolicy::Allowlist, "\"allowlist\""),
            (DmPolicy::Disabled, "\"disabled\""),
        ] {
            assert_eq!(serde_json::to_string(&variant).unwrap(), expected);
        }
    }

    #[test]
    fn minimal_toml() {
        let config: TelegramConfig = toml::from_str("").unwrap();
        assert!(config.token.is_none());
        assert_eq!(config.dm_policy, DmPolicy::Open);
        assert!(config.allowed_users.is_empty());
    }

    #[test]
    fn full_toml() {
        let config: TelegramConfig = toml::from_str(
            r#"
            token = "123:ABC"
            dm_policy = "allowlist"
            allowed_users = [111, 222]
            "#,
        )
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("123:ABC"));
        assert_eq!(config.dm_policy, DmPolicy::Allowlist);
        assert_eq!(config.allowed_users, vec![111, 222]);
    }

    #[test]
    fn configured_token_wins() {
        let config = TelegramConfig {
            token: Some("123:ABC".into()),
            ..Default::default()
        };
        assert_eq!(config.resolve_token().unwrap(), "123:ABC");
    }

    #[test]
    fn missing_token_names_both_sources() {
        // Relies on the env var being unset in the test environment.
        let config = TelegramConfig::default();
        if std::env::var(TOKEN_ENV).is_err() {
            let err = config.resolve_token().unwrap_err();
            assert!(err.to_string().contains(TOKEN_ENV));
        }
    }
}
