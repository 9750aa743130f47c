//! Fixed-window request limiter for the public generation endpoint
//!
//! State is per process and lost on restart.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded, retry after {retry_after:?}")]
pub struct RateLimitExceeded {
    pub retry_after: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request for `client` at `now`
    pub fn check(&self, client: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        let Ok(mut clients) = self.clients.lock() else {
            // poisoned map: do not throttle
            return Ok(());
        };

        // prune stale windows
        if clients.len() > 10_000 {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let retry_after = self.window.saturating_sub(now.duration_since(entry.started));
            tracing::warn!("Rate limit hit for {} ({} requests)", client, entry.count);
            return Err(RateLimitExceeded { retry_after });
        }

        entry.count += 1;
        Ok(())
    }
}
