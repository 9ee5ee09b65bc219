use crate::config::RateLimitConfig;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use log::warn;

/// Sliding-window limiter for write requests, keyed by wallet address or client IP.
#[derive(Debug)]
pub struct RateLimiter {
    requests: Mutex<HashMap<String, Vec<Instant>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// Records a request for `key` and returns whether it is within the limit.
    pub async fn check(&self, key: &str) -> bool {
        let mut requests = self.requests.lock().await;
        let now = Instant::now();

        self.cleanup_old_requests(&mut requests, now);

        let history = requests.entry(key.to_string()).or_insert_with(Vec::new);
        if history.len() >= self.max_requests as usize {
            warn!("Rate limit exceeded for {}", key);
            return false;
        }

        history.push(now);
        true
    }

    fn cleanup_old_requests(&self, requests: &mut HashMap<String, Vec<Instant>>, now: Instant) {
        let window_start = now.checked_sub(self.window).unwrap_or(now);
        requests.retain(|_, timestamps| {
            timestamps.retain(|&time| time >= window_start);
            !timestamps.is_empty()
        });
    }
}
