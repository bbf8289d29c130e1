//! Per-connection edit rate limiting (token bucket)

use std::time::Instant;

pub struct EditThrottle {
    rate_per_sec: f64,
    burst: f64,
    tokens: f64,
    last_refill: Instant,
}

impl EditThrottle {
    /// A `rate_per_sec` of 0 disables throttling
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate_per_sec: f64::from(rate_per_sec),
            burst,
            tokens: burst,
            last_refill: Instant::now(),
        }
    }

    /// Take one token if available
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&mut self, now: Instant) -> bool {
        if self.rate_per_sec == 0.0 {
            return true;
        }

        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.burst);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_burst_then_limited() {
        let mut throttle = EditThrottle::new(1, 3);
        let now = Instant::now();

        assert!(throttle.try_acquire_at(now));
        assert!(throttle.try_acquire_at(now));
        assert!(throttle.try_acquire_at(now));
        assert!(!throttle.try_acquire_at(now));
    }

    #[test]
    fn test_refill_over_time() {
        let mut throttle = EditThrottle::new(10, 1);
        let now = Instant::now();

        assert!(throttle.try_acquire_at(now));
        assert!(!throttle.try_acquire_at(now));
        assert!(throttle.try_acquire_at(now + Duration::from_millis(150)));
    }

    #[test]
    fn test_refill_caps_at_burst() {
        let mut throttle = EditThrottle::new(100, 2);
        let later = Instant::now() + Duration::from_secs(60);

        assert!(throttle.try_acquire_at(later));
        assert!(throttle.try_acquire_at(later));
        assert!(!throttle.try_acquire_at(later));
    }

    #[test]
    fn test_zero_rate_disables_limit() {
        let mut throttle = EditThrottle::new(0, 1);
        for _ in 0..10_000 {
            assert!(throttle.try_acquire());
        }
    }
}
