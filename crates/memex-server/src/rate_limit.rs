//! Rate Limiter (C6): three independent fixed-window buckets — 60/min and
//! 500/hour per IP, 120/min per instance. Windows roll over by wall-clock
//! boundary (not by first-request time), so `Retry-After` is always
//! `window_end - now`, never more than the window length.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const IP_PER_MINUTE: u32 = 60;
const IP_PER_HOUR: u32 = 500;
const INSTANCE_PER_MINUTE: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    IpMinute,
    IpHour,
    InstanceMinute,
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<String, (u64, u32)>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter { buckets: Mutex::new(HashMap::new()) }
    }

    /// `(allowed, retry_after_seconds, limit_kind)`. On denial, `limit_kind`
    /// names whichever bucket tripped first.
    pub fn check(&self, ip: &str, instance: &str) -> (bool, u64, Option<LimitKind>) {
        self.check_at(ip, instance, now_secs())
    }

    fn check_at(&self, ip: &str, instance: &str, now: u64) -> (bool, u64, Option<LimitKind>) {
        let checks = [
            (format!("ip:min:{ip}"), 60u64, IP_PER_MINUTE, LimitKind::IpMinute),
            (format!("ip:hr:{ip}"), 3600u64, IP_PER_HOUR, LimitKind::IpHour),
            (format!("inst:min:{instance}"), 60u64, INSTANCE_PER_MINUTE, LimitKind::InstanceMinute),
        ];

        let mut buckets = self.buckets.lock().unwrap();
        // First pass: would any bucket be exceeded? Only commit increments
        // if every bucket has room, so a denied request doesn't partially
        // consume other buckets' quota.
        let mut retry_after = None;
        for (key, window, limit, kind) in &checks {
            let window_start = (now / window) * window;
            let (stored_start, count) = *buckets.get(key).unwrap_or(&(window_start, 0));
            let count = if stored_start == window_start { count } else { 0 };
            if count >= *limit {
                let window_end = window_start + window;
                retry_after = Some((window_end.saturating_sub(now), *kind));
                break;
            }
        }
        if let Some((secs, kind)) = retry_after {
            return (false, secs, Some(kind));
        }
        for (key, window, _limit, _kind) in &checks {
            let window_start = (now / window) * window;
            let entry = buckets.entry(key.clone()).or_insert((window_start, 0));
            if entry.0 != window_start {
                *entry = (window_start, 0);
            }
            entry.1 += 1;
        }
        (true, 0, None)
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_denies() {
        let limiter = RateLimiter::new();
        for _ in 0..IP_PER_MINUTE {
            let (allowed, _, _) = limiter.check_at("1.2.3.4", "inst", 1_000_000);
            assert!(allowed);
        }
        let (allowed, retry_after, kind) = limiter.check_at("1.2.3.4", "inst", 1_000_000);
        assert!(!allowed);
        assert!(retry_after <= 60);
        assert_eq!(kind, Some(LimitKind::IpMinute));
    }

    #[test]
    fn window_rolls_over_by_wall_clock_boundary() {
        let limiter = RateLimiter::new();
        for _ in 0..IP_PER_MINUTE {
            assert!(limiter.check_at("1.2.3.4", "inst", 60).0);
        }
        assert!(!limiter.check_at("1.2.3.4", "inst", 61).0);
        assert!(limiter.check_at("1.2.3.4", "inst", 120).0);
    }

    #[test]
    fn instance_bucket_is_independent_of_ip_bucket() {
        let limiter = RateLimiter::new();
        for i in 0..INSTANCE_PER_MINUTE {
            assert!(limiter.check_at(&format!("ip-{i}"), "shared", 1_000_000).0);
        }
        let (allowed, _, kind) = limiter.check_at("new-ip", "shared", 1_000_000);
        assert!(!allowed);
        assert_eq!(kind, Some(LimitKind::InstanceMinute));
    }
}
