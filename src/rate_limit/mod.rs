//! 按客户端标识计数的固定窗口限流器
//!
//! 窗口到期后计数直接重置，因此在窗口边界附近最多可放行 `2 × limit` 个请求。

mod clock;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

pub use clock::{Clock, ManualClock, SystemClock};

/// 无法识别客户端时使用的兜底键
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
}

#[derive(Debug, Clone)]
pub struct RateLimitRecord {
    pub count: u32,
    pub window_reset_at: DateTime<Utc>,
}

pub struct RateLimiter {
    records: Mutex<HashMap<String, RateLimitRecord>>,
    clock: Arc<dyn Clock>,
    max_keys: usize,
}

impl RateLimiter {
    pub fn new(max_keys: usize) -> Self {
        Self::with_clock(max_keys, Arc::new(SystemClock))
    }

    pub fn with_clock(max_keys: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
            max_keys: max_keys.max(1),
        }
    }

    /// 检查并消耗一次配额
    ///
    /// 读取、判断、自增在同一把锁内完成，并发请求不会同时越过上限。
    pub fn check_and_consume(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        let key = match key.trim() {
            "" => UNKNOWN_CLIENT,
            trimmed => trimmed,
        };

        if limit == 0 {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
            };
        }

        let now = self.clock.now();
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let reset_at = now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(record) = records.get_mut(key) {
            if now >= record.window_reset_at {
                record.count = 1;
                record.window_reset_at = reset_at;
                return RateLimitDecision {
                    allowed: true,
                    remaining: limit - 1,
                };
            }

            if record.count >= limit {
                return RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                };
            }

            record.count += 1;
            return RateLimitDecision {
                allowed: true,
                remaining: limit - record.count,
            };
        }

        if records.len() >= self.max_keys {
            Self::make_room(&mut records, now, self.max_keys);
        }

        records.insert(
            key.to_string(),
            RateLimitRecord {
                count: 1,
                window_reset_at: reset_at,
            },
        );

        RateLimitDecision {
            allowed: true,
            remaining: limit - 1,
        }
    }

    /// 清理所有已过期的记录，返回清理数量
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let before = records.len();
        records.retain(|_, record| now < record.window_reset_at);
        before - records.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    // 先丢弃过期记录，仍然满员时淘汰窗口最早开始的那一条
    fn make_room(records: &mut HashMap<String, RateLimitRecord>, now: DateTime<Utc>, max_keys: usize) {
        records.retain(|_, record| now < record.window_reset_at);

        while records.len() >= max_keys {
            let oldest = records
                .iter()
                .min_by_key(|(_, record)| record.window_reset_at)
                .map(|(key, _)| key.clone());

            match oldest {
                Some(key) => {
                    tracing::debug!("Evicting rate limit record for {}", key);
                    records.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HOUR: Duration = Duration::from_secs(3600);

    fn limiter_with_clock(max_keys: usize) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        (RateLimiter::with_clock(max_keys, clock.clone()), clock)
    }

    #[test]
    fn denies_the_call_after_the_limit() {
        let (limiter, _) = limiter_with_clock(100);

        for expected_remaining in (0..10).rev() {
            let decision = limiter.check_and_consume("10.0.0.1", 10, HOUR);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let denied = limiter.check_and_consume("10.0.0.1", 10, HOUR);
        assert_eq!(
            denied,
            RateLimitDecision {
                allowed: false,
                remaining: 0
            }
        );
    }

    #[test]
    fn window_rollover_resets_the_count() {
        let (limiter, clock) = limiter_with_clock(100);

        for _ in 0..12 {
            limiter.check_and_consume("10.0.0.1", 10, HOUR);
        }

        clock.advance(HOUR);
        let decision = limiter.check_and_consume("10.0.0.1", 10, HOUR);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 9);
    }

    #[test]
    fn bursts_across_a_window_edge_are_allowed() {
        let (limiter, clock) = limiter_with_clock(100);

        // 窗口开始时先消耗一次，临近结束前再用满剩余配额
        assert!(limiter.check_and_consume("edge", 5, HOUR).allowed);
        clock.advance(HOUR - Duration::from_secs(1));
        for _ in 0..4 {
            assert!(limiter.check_and_consume("edge", 5, HOUR).allowed);
        }
        assert!(!limiter.check_and_consume("edge", 5, HOUR).allowed);

        clock.advance(Duration::from_secs(1));
        let burst = (0..5)
            .filter(|_| limiter.check_and_consume("edge", 5, HOUR).allowed)
            .count();
        assert_eq!(burst, 5);
    }

    #[test]
    fn denied_calls_do_not_extend_the_window() {
        let (limiter, clock) = limiter_with_clock(100);

        limiter.check_and_consume("k", 1, HOUR);
        clock.advance(Duration::from_secs(1800));
        assert!(!limiter.check_and_consume("k", 1, HOUR).allowed);

        clock.advance(Duration::from_secs(1800));
        assert!(limiter.check_and_consume("k", 1, HOUR).allowed);
    }

    #[test]
    fn keys_are_counted_independently() {
        let (limiter, _) = limiter_with_clock(100);

        limiter.check_and_consume("a", 1, HOUR);
        assert!(!limiter.check_and_consume("a", 1, HOUR).allowed);
        assert!(limiter.check_and_consume("b", 1, HOUR).allowed);
    }

    #[test]
    fn blank_keys_share_the_unknown_bucket() {
        let (limiter, _) = limiter_with_clock(100);

        limiter.check_and_consume("", 2, HOUR);
        limiter.check_and_consume("   ", 2, HOUR);
        assert!(!limiter.check_and_consume(UNKNOWN_CLIENT, 2, HOUR).allowed);
    }

    #[test]
    fn zero_limit_always_denies() {
        let (limiter, _) = limiter_with_clock(100);
        assert!(!limiter.check_and_consume("k", 0, HOUR).allowed);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn concurrent_callers_get_exactly_limit_slots() {
        let (limiter, _) = limiter_with_clock(100);
        let limiter = Arc::new(limiter);

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || limiter.check_and_consume("203.0.113.9", 10, HOUR))
            })
            .collect();

        let allowed = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|decision| decision.allowed)
            .count();

        assert_eq!(allowed, 10);
    }

    #[test]
    fn tracked_keys_stay_within_bound() {
        let (limiter, clock) = limiter_with_clock(3);

        for i in 0..3 {
            limiter.check_and_consume(&format!("client-{i}"), 10, HOUR);
            clock.advance(Duration::from_secs(1));
        }
        limiter.check_and_consume("client-3", 10, HOUR);

        assert_eq!(limiter.tracked_keys(), 3);
        // 最早的窗口被淘汰，重新出现时从头计数
        let decision = limiter.check_and_consume("client-0", 10, HOUR);
        assert_eq!(decision.remaining, 9);
    }

    #[test]
    fn sweep_removes_only_expired_records() {
        let (limiter, clock) = limiter_with_clock(100);

        limiter.check_and_consume("old", 10, Duration::from_secs(60));
        limiter.check_and_consume("new", 10, HOUR);
        clock.advance(Duration::from_secs(120));

        assert_eq!(limiter.sweep_expired(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
