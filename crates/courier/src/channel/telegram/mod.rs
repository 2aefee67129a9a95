mod access;
mod adapter;
mod config;
mod delivery;

pub use access::AccessControl;
pub use adapter::{TelegramAdapter, TelegramOutbox};
pub use config::{DmPolicy, TOKEN_ENV, TelegramConfig};
pub use delivery::{RateLimiter, chunk_message};
