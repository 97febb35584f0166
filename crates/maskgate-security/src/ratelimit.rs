//! Global sliding-window rate limiter for upstream dispatch
//!
//! Two windows share one timestamp history: at most `per_minute` admissions
//! in the trailing 60 seconds and at most `per_hour` in the trailing hour.
//! The accounting is process-global on purpose — per-caller abuse detection
//! is the security gate's job, this limiter protects the upstream quota.

use std::collections::VecDeque;

use maskgate_core::{Error, Result};
use parking_lot::Mutex;

const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 3_600_000;

/// Default caps, matching the upstream quota the gateway fronts
pub const DEFAULT_PER_MINUTE: usize = 60;
pub const DEFAULT_PER_HOUR: usize = 1000;

#[derive(Debug)]
pub struct RateLimiter {
    per_minute: usize,
    per_hour: usize,
    history: Mutex<VecDeque<u64>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_PER_MINUTE, DEFAULT_PER_HOUR)
    }
}

impl RateLimiter {
    pub fn new(per_minute: usize, per_hour: usize) -> Self {
        Self {
            per_minute,
            per_hour,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Admit or reject one dispatch attempt at the current wall clock
    pub fn try_admit(&self) -> Result<()> {
        self.try_admit_at(now_ms())
    }

    /// Admit or reject one dispatch attempt at `now_ms`.
    ///
    /// Purge, capacity check, and append happen under one lock so two
    /// concurrent callers can never both observe the last free slot.
    pub fn try_admit_at(&self, now_ms: u64) -> Result<()> {
        let mut history = self.history.lock();

        // Drop everything outside the hourly window before any check
        while let Some(&oldest) = history.front() {
            if now_ms.saturating_sub(oldest) >= HOUR_MS {
                history.pop_front();
            } else {
                break;
            }
        }

        if history.len() >= self.per_hour {
            tracing::warn!(admitted = history.len(), "hourly rate window exhausted");
            return Err(Error::RateLimited);
        }

        // full scan rather than a back-to-front take_while: the history is
        // not sorted when the clock steps backwards, and the hourly purge
        // keeps the deque small
        let minute_cutoff = now_ms.saturating_sub(MINUTE_MS);
        let recent = history.iter().filter(|&&t| t > minute_cutoff).count();
        if recent >= self.per_minute {
            tracing::warn!(admitted = recent, "per-minute rate window exhausted");
            return Err(Error::RateLimited);
        }

        history.push_back(now_ms);
        Ok(())
    }

    /// Number of admissions currently inside the hourly window
    pub fn recent_admissions(&self) -> usize {
        self.history.lock().len()
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
