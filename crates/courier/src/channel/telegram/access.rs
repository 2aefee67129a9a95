use super::config::DmPolicy;

/// Gate on inbound private messages, applied before any dispatching.
pub struct AccessControl {
    policy: DmPolicy,
    allowed_users: Vec<i64>,
}

impl AccessControl {
    pub fn new(policy: DmPolicy, allowed_users: Vec<i64>) -> Self {
        Self {
            policy,
            allowed_users,
        }
    }

    /// Whether the sender's message should be processed at all. Denied
    /// messages get no reply.
    pub fn permits(&self, user_id: i64) -> bool {
        match self.policy {
            DmPolicy::Open => true,
            DmPolicy::Disabled => false,
            DmPolicy::Allowlist => self.allowed_users.contains(&user_id),
        }
    }
}
