//! In-process sliding-window rate limiting per (bucket, user).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Bucket applied to daily report generation.
pub const REPORT_BUCKET: &str = "ai-daily-report";

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    hits: HashMap<(String, String), VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl State {
    /// Drop every key whose newest hit has left the window. Runs at most
    /// once per window.
    fn sweep(&mut self, now: Instant, window: Duration) {
        if self
            .last_sweep
            .is_some_and(|at| now.saturating_duration_since(at) < window)
        {
            return;
        }
        self.hits.retain(|_, entry| {
            entry
                .back()
                .is_some_and(|newest| now.saturating_duration_since(*newest) < window)
        });
        self.last_sweep = Some(now);
    }
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(State::default()),
        }
    }

    /// Record a hit for `user_id` in `bucket`, or fail with the time until
    /// the oldest hit leaves the window.
    pub fn check(&self, bucket: &str, user_id: &str) -> Result<()> {
        self.check_at(bucket, user_id, Instant::now())
    }

    pub fn check_at(&self, bucket: &str, user_id: &str, now: Instant) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sweep(now, self.window);
        let entry = state
            .hits
            .entry((bucket.to_string(), user_id.to_string()))
            .or_default();

        while let Some(&oldest) = entry.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                entry.pop_front();
            } else {
                break;
            }
        }

        if entry.len() >= self.limit as usize {
            let retry_after = entry
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.window);
            log::warn!("Rate limit hit on {bucket} for user {user_id}");
            return Err(Error::RateLimited {
                bucket: bucket.to_string(),
                retry_after,
            });
        }

        entry.push_back(now);
        Ok(())
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).hits.len()
    }
}
