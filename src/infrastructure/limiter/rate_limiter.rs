use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::settings::AppConfig;

const WINDOW: Duration = Duration::from_secs(60);

/// Refills continuously; its capacity is the burst allowance.
#[derive(Debug)]
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    fn has_token(&self) -> bool {
        self.tokens + 1e-9 >= 1.0
    }

    fn secs_until_token(&self) -> u64 {
        let missing = (1.0 - self.tokens).max(0.0);
        ((missing / self.refill_per_sec).ceil() as u64).max(1)
    }
}

/// Weighted two-window counter bounding requests per minute.
#[derive(Debug)]
struct SlidingWindow {
    limit: u64,
    window_start: Instant,
    current: u64,
    previous: u64,
}

impl SlidingWindow {
    fn new(limit: u64, now: Instant) -> Self {
        Self {
            limit,
            window_start: now,
            current: 0,
            previous: 0,
        }
    }

    fn roll(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.window_start);
        if elapsed >= WINDOW * 2 {
            self.previous = 0;
            self.current = 0;
            self.window_start = now;
        } else if elapsed >= WINDOW {
            self.previous = self.current;
            self.current = 0;
            self.window_start += WINDOW;
        }
    }

    fn estimate(&self, now: Instant) -> f64 {
        let weight = now.duration_since(self.window_start).as_secs_f64() / WINDOW.as_secs_f64();
        self.previous as f64 * (1.0 - weight.min(1.0)) + self.current as f64
    }

    fn has_room(&self, now: Instant) -> bool {
        self.estimate(now) + 1.0 <= self.limit as f64
    }

    fn secs_until_room(&self, now: Instant) -> u64 {
        WINDOW
            .saturating_sub(now.duration_since(self.window_start))
            .as_secs()
            .max(1)
    }
}

#[derive(Debug)]
struct CallerLimit {
    bucket: TokenBucket,
    window: SlidingWindow,
    last_seen: Instant,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u64 },
    Limited { retry_after_secs: u64 },
}

impl CallerLimit {
    fn admit(&mut self, now: Instant) -> Decision {
        self.last_seen = now;
        self.bucket.refill(now);
        self.window.roll(now);

        if !self.bucket.has_token() {
            return Decision::Limited { retry_after_secs: self.bucket.secs_until_token() };
        }
        if !self.window.has_room(now) {
            return Decision::Limited { retry_after_secs: self.window.secs_until_room(now) };
        }

        self.bucket.tokens -= 1.0;
        self.window.current += 1;
        let remaining = (self.window.limit as f64 - self.window.estimate(now)).max(0.0);
        Decision::Allowed { remaining: remaining.min(self.bucket.tokens).floor() as u64 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimits {
    pub requests_per_minute: u32,
    pub burst: u32,
    pub idle_ttl: Duration,
}

impl RateLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        RateLimits {
            requests_per_minute: config.rate_limit_requests_per_minute,
            burst: config.rate_limit_burst_limit,
            idle_ttl: Duration::from_secs(10 * 60),
        }
    }
}

/// Per-caller upload limits: a burst allowance refilled at the per-minute
/// rate, capped by a sliding one-minute window.
#[derive(Clone)]
pub struct RateLimiterStore {
    callers: Arc<DashMap<String, Arc<Mutex<CallerLimit>>>>,
    limits: RateLimits,
}

impl RateLimiterStore {
    /// Starts the idle-caller sweep when called inside a tokio runtime.
    pub fn new(limits: RateLimits) -> Self {
        let store = Self {
            callers: Arc::new(DashMap::new()),
            limits,
        };

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let sweeper = store.clone();
            runtime.spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(30));
                loop {
                    interval.tick().await;
                    sweeper.evict_idle(Instant::now());
                }
            });
        }

        store
    }

    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Decision {
        let caller = self
            .callers
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(CallerLimit {
                    bucket: TokenBucket::new(
                        f64::from(self.limits.burst),
                        f64::from(self.limits.requests_per_minute) / WINDOW.as_secs_f64(),
                        now,
                    ),
                    window: SlidingWindow::new(u64::from(self.limits.requests_per_minute), now),
                    last_seen: now,
                }))
            })
            .value()
            .clone();

        caller.lock().admit(now)
    }

    /// Drops callers not seen within the idle TTL.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let before = self.callers.len();
        let ttl = self.limits.idle_ttl;
        self.callers
            .retain(|_, caller| now.duration_since(caller.lock().last_seen) <= ttl);
        before - self.callers.len()
    }

    pub fn tracked_callers(&self) -> usize {
        self.callers.len()
    }
}
