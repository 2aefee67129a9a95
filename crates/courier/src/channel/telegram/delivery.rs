use std::time::{Duration, Instant};

/// Telegram's per-message length limit, in bytes of UTF-8.
const TELEGRAM_MAX_LEN: usize = 4096;

/// Split a reply into pieces that fit Telegram's 4096-character limit.
///
/// Prefers paragraph breaks, then line breaks, then spaces; hard-splits at
/// a character boundary only when a chunk has no whitespace at all.
pub fn chunk_message(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while rest.len() > TELEGRAM_MAX_LEN {
        let (head, tail) = rest.split_at(split_point(rest));
        chunks.push(head);
        rest = tail.trim_start_matches('\n');
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}

fn split_point(text: &str) -> usize {
    let limit = floor_char_boundary(text, TELEGRAM_MAX_LEN);
    let window = &text[..limit];

    if let Some(pos) = window.rfind("\n\n")
        && pos > 0
    {
        return pos + 1;
    }
    if let Some(pos) = window.rfind('\n')
        && pos > 0
    {
        return pos + 1;
    }
    if let Some(pos) = window.rfind(' ')
        && pos > 0
    {
        return pos + 1;
    }
    limit
}

/// Largest byte offset <= `max` that is a valid UTF-8 char boundary.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut i = max;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Minimum-interval pacer for chunked sends (Telegram throttles at roughly
/// one message per second per chat).
pub struct RateLimiter {
    last_send: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval_ms: u64) -> Self {
        let min_interval = Duration::from_millis(min_interval_ms);
        Self {
            // First send goes out immediately
            last_send: Instant::now() - min_interval,
            min_interval,
        }
    }

    /// Delay required before the next send; zero when clear to send now.
    pub fn wait_time(&self) -> Duration {
        self.min_interval.saturating_sub(self.last_send.elapsed())
    }

    pub fn mark_sent(&mut self) {
        self.last_send = Instant::now();
    }
}
