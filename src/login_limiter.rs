//! In-memory brute-force guard for salesperson login.
//!
//! State is process-local and lost on restart.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::clock::{Clock, SECONDS_PER_DAY};

/// Entries untouched for this long are swept once unlocked.
const STALE_AFTER_SECS: i64 = SECONDS_PER_DAY;

#[derive(Debug, Clone, Copy)]
struct AttemptInfo {
    count: u32,
    last_try: i64,
    lock_until: Option<i64>,
}

/// Result of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub locked: bool,
    /// Minutes until the lock lifts, 0 when not locked
    pub remaining_minutes: i64,
    /// Failures left before a lock, 0 when locked
    pub remaining_attempts: u32,
}

pub struct LoginLimiter {
    attempts: RwLock<HashMap<String, AttemptInfo>>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    lock_secs: i64,
}

impl LoginLimiter {
    pub fn new(clock: Arc<dyn Clock>, max_attempts: u32, lock_minutes: i64) -> Self {
        Self {
            attempts: RwLock::new(HashMap::new()),
            clock,
            max_attempts: max_attempts.max(1),
            lock_secs: lock_minutes.max(1) * 60,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, AttemptInfo>> {
        // A panicked writer leaves the map usable
        self.attempts.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, AttemptInfo>> {
        self.attempts.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_failure(&self, username: &str) -> LockStatus {
        let now = self.clock.timestamp();
        let mut map = self.write();
        let info = map.entry(username.to_string()).or_insert(AttemptInfo {
            count: 0,
            last_try: now,
            lock_until: None,
        });

        match info.lock_until {
            Some(until) if now < until => {
                info.last_try = now;
                return LockStatus {
                    locked: true,
                    remaining_minutes: minutes_left(until, now),
                    remaining_attempts: 0,
                };
            }
            Some(_) => {
                // Lock served, start a fresh window
                info.count = 0;
                info.lock_until = None;
            }
            None => {}
        }

        info.count += 1;
        info.last_try = now;

        if info.count >= self.max_attempts {
            info.lock_until = Some(now + self.lock_secs);
            tracing::warn!("Login locked for {} after {} failures", username, info.count);
            LockStatus {
                locked: true,
                remaining_minutes: self.lock_secs / 60,
                remaining_attempts: 0,
            }
        } else {
            LockStatus {
                locked: false,
                remaining_minutes: 0,
                remaining_attempts: self.max_attempts - info.count,
            }
        }
    }

    /// Remaining lock minutes if `username` is currently locked.
    pub fn is_locked(&self, username: &str) -> Option<i64> {
        let now = self.clock.timestamp();
        self.read()
            .get(username)
            .and_then(|info| info.lock_until)
            .filter(|until| now < *until)
            .map(|until| minutes_left(until, now))
    }

    pub fn remaining_attempts(&self, username: &str) -> u32 {
        if self.is_locked(username).is_some() {
            return 0;
        }
        let now = self.clock.timestamp();
        match self.read().get(username) {
            Some(info) if info.lock_until.is_none_or(|until| until > now) => {
                self.max_attempts.saturating_sub(info.count)
            }
            _ => self.max_attempts,
        }
    }

    pub fn reset_attempts(&self, username: &str) {
        self.write().remove(username);
    }

    /// Evict unlocked entries idle for more than a day. Returns how many went.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.timestamp();
        let mut map = self.write();
        let before = map.len();
        map.retain(|_, info| {
            let locked = info.lock_until.is_some_and(|until| now < until);
            locked || now - info.last_try <= STALE_AFTER_SECS
        });
        before - map.len()
    }

    pub fn tracked(&self) -> usize {
        self.read().len()
    }

    /// Run [`cleanup`](Self::cleanup) every `every` on the tokio runtime.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // First tick fires immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = self.cleanup();
                if removed > 0 {
                    tracing::debug!("Swept {} stale login entries", removed);
                }
            }
        })
    }
}

fn minutes_left(until: i64, now: i64) -> i64 {
    (until - now) / 60 + 1
}
