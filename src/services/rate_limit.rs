// SPDX-License-Identifier: MIT
// Copyright 2026 Pedalea y Conquista contributors

//! In-memory fixed-window rate limiter.
//!
//! One window per identifier: the first request after a window lapses opens a
//! new one with a count of 1, and requests beyond the quota are rejected until
//! `reset_at`. Windows live only in this process and vanish on restart.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// A named request quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Namespace for identifiers checked under this policy
    pub name: &'static str,
    pub max_requests: u32,
    pub window_ms: i64,
    /// Message returned to throttled clients
    pub message: &'static str,
}

impl RateLimitPolicy {
    pub fn window(&self) -> Duration {
        Duration::milliseconds(self.window_ms)
    }

    /// Identifier namespaced to this policy so categories keep separate counters.
    pub fn key(&self, client: &str) -> String {
        format!("{}:{}", self.name, client)
    }
}

/// Sign-in and session management: 5 attempts per 15 minutes.
pub const AUTH: RateLimitPolicy = RateLimitPolicy {
    name: "auth",
    max_requests: 5,
    window_ms: 15 * 60 * 1000,
    message: "Too many sign-in attempts. Try again in 15 minutes.",
};

/// Sign-in attempts against one e-mail address, whatever the client.
pub const SIGNIN_EMAIL: RateLimitPolicy = RateLimitPolicy {
    name: "signin",
    ..AUTH
};

/// Account creation: 3 per hour.
pub const SIGNUP: RateLimitPolicy = RateLimitPolicy {
    name: "signup",
    max_requests: 3,
    window_ms: 60 * 60 * 1000,
    message: "Too many sign-ups from this address. Try again in 1 hour.",
};

/// General API: 100 requests per 15 minutes.
pub const API: RateLimitPolicy = RateLimitPolicy {
    name: "api",
    max_requests: 100,
    window_ms: 15 * 60 * 1000,
    message: "Too many requests. Try again later.",
};

/// Password reset: 3 per hour.
pub const PASSWORD_RESET: RateLimitPolicy = RateLimitPolicy {
    name: "password_reset",
    max_requests: 3,
    window_ms: 60 * 60 * 1000,
    message: "Too many password reset requests. Try again in 1 hour.",
};

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
    /// Whole seconds until the window resets; only set when rejected
    pub retry_after: Option<u64>,
}

/// Details carried by a rejected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRejection {
    pub message: &'static str,
    pub limit: u32,
    pub retry_after: u64,
    pub reset_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

impl Window {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.reset_at <= now
    }
}

/// Process-wide counter store keyed by client identifier.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request against `identifier`.
    pub fn check(&self, identifier: &str, max_requests: u32, window: Duration) -> RateLimitDecision {
        self.check_at(identifier, max_requests, window, Utc::now())
    }

    /// Count a request against `identifier` at an explicit instant.
    pub fn check_at(
        &self,
        identifier: &str,
        max_requests: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let mut entry = self
            .windows
            .entry(identifier.to_string())
            .or_insert(Window {
                count: 0,
                reset_at: now,
            });

        if entry.is_expired(now) {
            *entry = Window {
                count: 1,
                reset_at: now + window,
            };
            return RateLimitDecision {
                allowed: max_requests > 0,
                remaining: max_requests.saturating_sub(1),
                reset_time: entry.reset_at,
                retry_after: None,
            };
        }

        if entry.count < max_requests {
            entry.count += 1;
            return RateLimitDecision {
                allowed: true,
                remaining: max_requests - entry.count,
                reset_time: entry.reset_at,
                retry_after: None,
            };
        }

        RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_time: entry.reset_at,
            retry_after: Some(retry_after_secs(entry.reset_at, now)),
        }
    }

    /// Report the state `identifier` would see, without counting a request.
    pub fn peek_at(
        &self,
        identifier: &str,
        max_requests: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        match self.windows.get(identifier).map(|w| *w) {
            Some(w) if !w.is_expired(now) => {
                let remaining = max_requests.saturating_sub(w.count);
                RateLimitDecision {
                    allowed: remaining > 0,
                    remaining,
                    reset_time: w.reset_at,
                    retry_after: (remaining == 0).then(|| retry_after_secs(w.reset_at, now)),
                }
            }
            _ => RateLimitDecision {
                allowed: max_requests > 0,
                remaining: max_requests,
                reset_time: now + window,
                retry_after: None,
            },
        }
    }

    /// Check `client` under `policy`, turning a rejection into an error value.
    pub fn enforce(
        &self,
        policy: &RateLimitPolicy,
        client: &str,
    ) -> Result<RateLimitDecision, RateLimitRejection> {
        let decision = self.check(&policy.key(client), policy.max_requests, policy.window());
        if decision.allowed {
            Ok(decision)
        } else {
            Err(RateLimitRejection {
                message: policy.message,
                limit: policy.max_requests,
                retry_after: decision.retry_after.unwrap_or(1),
                reset_time: decision.reset_time,
            })
        }
    }

    /// Current state of `client` under `policy`, without counting a request.
    pub fn status(&self, policy: &RateLimitPolicy, client: &str) -> RateLimitDecision {
        self.peek_at(
            &policy.key(client),
            policy.max_requests,
            policy.window(),
            Utc::now(),
        )
    }

    /// Forget the window for one identifier.
    pub fn reset(&self, identifier: &str) {
        self.windows.remove(identifier);
    }

    /// Forget every window.
    pub fn clear(&self) {
        self.windows.clear();
    }

    /// Number of tracked identifiers.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drop windows that have lapsed. Returns how many were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.is_expired(now));
        before.saturating_sub(self.windows.len())
    }

    /// Run `sweep_expired` every `period` on the Tokio runtime.
    pub fn spawn_sweeper(self: Arc<Self>, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired(Utc::now());
                if removed > 0 {
                    tracing::debug!(removed, tracked = self.len(), "Swept expired rate-limit windows");
                }
            }
        })
    }
}

fn retry_after_secs(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let ms = (reset_at - now).num_milliseconds().max(0) as u64;
    ms.div_ceil(1000)
}
