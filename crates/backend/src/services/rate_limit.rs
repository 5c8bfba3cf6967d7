//! Two-gate rate limiting: a per-IP sliding window held in memory, and a
//! global monthly ceiling on logged calendar API usage.
//!
//! State is process-local and approximate; the usage-log table stays the
//! authoritative count.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::error::{ApiError, ApiResult, RateLimitKind};
use crate::repository::Store;
use crate::tz;

const SWEEP_INTERVAL_MINUTES: i64 = 5;

#[derive(Debug, Default)]
struct IpWindows {
    hits: HashMap<String, VecDeque<DateTime<Utc>>>,
    last_sweep: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
struct CachedUsage {
    total: i64,
    month_start: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: Mutex<IpWindows>,
    usage: Mutex<Option<CachedUsage>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            windows: Mutex::new(IpWindows::default()),
            usage: Mutex::new(None),
        }
    }

    /// Run both gates, IP first. Both must pass before any external I/O.
    pub async fn check(&self, ip: &str, store: &dyn Store) -> ApiResult<()> {
        if !self.check_ip(ip) {
            tracing::warn!(ip = %ip, "IP rate limit exceeded");
            return Err(ApiError::RateLimited(RateLimitKind::Ip));
        }

        if !self.check_monthly(store).await? {
            tracing::warn!(
                limit = self.config.monthly_limit,
                "Monthly API usage ceiling reached"
            );
            return Err(ApiError::RateLimited(RateLimitKind::Monthly));
        }

        Ok(())
    }

    /// Record a hit for `ip` unless it already has `max_requests` within the
    /// trailing window. Returns whether the request is allowed.
    pub fn check_ip(&self, ip: &str) -> bool {
        let now = self.clock.now();
        let cutoff = now - Duration::seconds(self.config.window_secs);
        let mut windows = lock(&self.windows);

        let due = windows
            .last_sweep
            .map_or(true, |last| now - last >= Duration::minutes(SWEEP_INTERVAL_MINUTES));
        if due {
            sweep(&mut windows.hits, cutoff);
            windows.last_sweep = Some(now);
        }

        let hits = windows.hits.entry(ip.to_string()).or_default();
        while hits.front().is_some_and(|t| *t <= cutoff) {
            hits.pop_front();
        }

        if hits.len() >= self.config.max_requests {
            return false;
        }
        hits.push_back(now);
        true
    }

    /// Whether this month's logged usage is still under the ceiling.
    pub async fn check_monthly(&self, store: &dyn Store) -> anyhow::Result<bool> {
        let now = self.clock.now();
        let month_start = tz::month_start(now);
        let ttl = Duration::seconds(self.config.usage_cache_ttl_secs);

        let cached = *lock(&self.usage);
        let total = match cached {
            Some(c) if c.month_start == month_start && now - c.fetched_at < ttl => c.total,
            _ => {
                let total = store.usage_since(month_start).await?;
                tracing::debug!(total, "Refreshed monthly API usage");
                *lock(&self.usage) = Some(CachedUsage {
                    total,
                    month_start,
                    fetched_at: now,
                });
                total
            }
        };

        Ok(total < self.config.monthly_limit)
    }

    /// Drop the cached monthly total so the next check reads the store.
    pub fn invalidate_usage_cache(&self) {
        *lock(&self.usage) = None;
    }

    /// Remove IPs with no hits inside the current window.
    pub fn prune(&self) {
        let now = self.clock.now();
        let cutoff = now - Duration::seconds(self.config.window_secs);
        let mut windows = lock(&self.windows);
        sweep(&mut windows.hits, cutoff);
        windows.last_sweep = Some(now);
    }

    /// Forget all IP windows and the usage cache.
    #[cfg(test)]
    fn reset(&self) {
        *lock(&self.windows) = IpWindows::default();
        self.invalidate_usage_cache();
    }

    #[cfg(test)]
    fn tracked_ips(&self) -> usize {
        lock(&self.windows).hits.len()
    }
}

fn sweep(hits: &mut HashMap<String, VecDeque<DateTime<Utc>>>, cutoff: DateTime<Utc>) {
    hits.retain(|_, times| times.back().is_some_and(|last| *last > cutoff));
}

/// Client address: first `x-forwarded-for` entry, then `x-real-ip`, else
/// `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::services::testing::MemoryStore;
    use axum::http::HeaderValue;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn limiter(clock: Arc<ManualClock>) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::default(), clock)
    }

    #[test]
    fn test_five_per_window_then_reopens() {
        let clock = Arc::new(ManualClock::new(utc("2026-10-20T00:00:00Z")));
        let limiter = limiter(clock.clone());

        for _ in 0..5 {
            assert!(limiter.check_ip("203.0.113.7"));
            clock.advance(Duration::seconds(1));
        }
        assert!(!limiter.check_ip("203.0.113.7"));

        // Other clients have their own bucket
        assert!(limiter.check_ip("198.51.100.1"));

        // Last allowed hit was at +4s; the first at +0s leaves the window at +10s
        clock.set(utc("2026-10-20T00:00:10Z"));
        assert!(limiter.check_ip("203.0.113.7"));
        assert!(!limiter.check_ip("203.0.113.7"));

        clock.set(utc("2026-10-20T00:00:20Z"));
        for _ in 0..5 {
            assert!(limiter.check_ip("203.0.113.7"));
        }
    }

    #[test]
    fn test_rejected_requests_are_not_recorded() {
        let clock = Arc::new(ManualClock::new(utc("2026-10-20T00:00:00Z")));
        let limiter = limiter(clock.clone());

        for _ in 0..5 {
            assert!(limiter.check_ip("ip"));
        }
        for _ in 0..20 {
            assert!(!limiter.check_ip("ip"));
        }
        clock.advance(Duration::seconds(10));
        assert!(limiter.check_ip("ip"));
    }

    #[test]
    fn test_sweep_and_reset_drop_idle_ips() {
        let clock = Arc::new(ManualClock::new(utc("2026-10-20T00:00:00Z")));
        let limiter = limiter(clock.clone());

        limiter.check_ip("a");
        limiter.check_ip("b");
        assert_eq!(limiter.tracked_ips(), 2);

        clock.advance(Duration::minutes(6));
        limiter.check_ip("c");
        assert_eq!(limiter.tracked_ips(), 1);

        limiter.reset();
        assert_eq!(limiter.tracked_ips(), 0);

        limiter.check_ip("d");
        clock.advance(Duration::seconds(11));
        limiter.prune();
        assert_eq!(limiter.tracked_ips(), 0);
    }

    #[tokio::test]
    async fn test_monthly_ceiling_uses_cache_until_invalidated() {
        let clock = Arc::new(ManualClock::new(utc("2026-10-20T00:00:00Z")));
        let config = RateLimitConfig {
            monthly_limit: 10,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::new(config, clock.clone());
        let store = MemoryStore::default();

        store.log_usage("bookings/create", 9).await.unwrap();
        assert!(limiter.check_monthly(&store).await.unwrap());

        // Cached total is still 9
        store.log_usage("bookings/create", 1).await.unwrap();
        assert!(limiter.check_monthly(&store).await.unwrap());

        limiter.invalidate_usage_cache();
        assert!(!limiter.check_monthly(&store).await.unwrap());
    }

    #[tokio::test]
    async fn test_monthly_cache_expires() {
        let clock = Arc::new(ManualClock::new(utc("2026-10-20T00:00:00Z")));
        let config = RateLimitConfig {
            monthly_limit: 10,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::new(config, clock.clone());
        let store = MemoryStore::default();

        assert!(limiter.check_monthly(&store).await.unwrap());
        store.log_usage("bookings/create", 10).await.unwrap();
        clock.advance(Duration::seconds(61));
        assert!(!limiter.check_monthly(&store).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_reports_which_gate_failed() {
        let clock = Arc::new(ManualClock::new(utc("2026-10-20T00:00:00Z")));
        let config = RateLimitConfig {
            monthly_limit: 1,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::new(config, clock);
        let store = MemoryStore::default();
        store.log_usage("bookings/create", 1).await.unwrap();

        match limiter.check("ip", &store).await {
            Err(ApiError::RateLimited(RateLimitKind::Monthly)) => {}
            other => panic!("expected monthly limit, got {:?}", other),
        }
    }

    #[test]
    fn test_client_ip_resolution_order() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.9"));
        assert_eq!(client_ip(&headers), "198.51.100.9");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }
}
