use std::time::Duration;

use rand::Rng;

/// Upper bound for one pacing interval; slower rates wait this long.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Inter-line delay: `1 / rate` plus uniform jitter in `[0, jitter]`.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    interval: Duration,
    jitter: Duration,
}

impl Pacer {
    /// `rate_lines_per_sec` must be positive and finite (checked by config validation).
    pub fn new(rate_lines_per_sec: f64, jitter_ms: u64) -> Self {
        let interval = if rate_lines_per_sec.is_finite() && rate_lines_per_sec > 0.0 {
            Duration::try_from_secs_f64(1.0 / rate_lines_per_sec)
                .unwrap_or(MAX_INTERVAL)
                .min(MAX_INTERVAL)
        } else {
            Duration::ZERO
        };

        Self {
            interval,
            jitter: Duration::from_millis(jitter_ms),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }
        let extra = rng.gen_range(0.0..=self.jitter.as_secs_f64());
        self.interval.saturating_add(Duration::from_secs_f64(extra))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_rate() {
        assert_eq!(Pacer::new(10.0, 0).interval(), Duration::from_millis(100));
        assert_eq!(Pacer::new(0.5, 0).interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_tiny_rate_is_capped() {
        assert_eq!(Pacer::new(1e-30, 0).interval(), MAX_INTERVAL);
        assert_eq!(Pacer::new(f64::MIN_POSITIVE, 0).interval(), MAX_INTERVAL);
        let mut rng = rand::thread_rng();
        assert!(Pacer::new(1e-30, u64::MAX).next_delay(&mut rng) >= MAX_INTERVAL);
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let pacer = Pacer::new(4.0, 0);
        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            assert_eq!(pacer.next_delay(&mut rng), Duration::from_millis(250));
        }
    }

    #[test]
    fn test_jitter_bounds() {
        let pacer = Pacer::new(10.0, 50);
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let delay = pacer.next_delay(&mut rng);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150) + Duration::from_micros(1));
        }
    }
}
