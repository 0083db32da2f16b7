//! Randomized pacing between browser actions

use crate::config::PacingConfig;
use rand::Rng;
use std::time::Duration;
use tracing::trace;

/// Sleeps a random duration in `[min, max]` between actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    min: Duration,
    max: Duration,
}

impl Pacer {
    /// Creates a pacer; bounds are swapped if given in the wrong order
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// A pacer that never sleeps
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Picks the next delay
    pub fn next_delay(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if min == max {
            return self.min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Sleeps for one randomized delay
    pub async fn pause(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            return;
        }
        trace!("Pacing for {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}

impl From<&PacingConfig> for Pacer {
    fn from(config: &PacingConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_stays_in_bounds() {
        let pacer = Pacer::new(Duration::from_millis(200), Duration::from_millis(400));
        for _ in 0..200 {
            let delay = pacer.next_delay();
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(400));
        }
    }

    #[test]
    fn test_swapped_bounds() {
        let pacer = Pacer::new(Duration::from_millis(50), Duration::from_millis(10));
        let delay = pacer.next_delay();
        assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(50));
    }

    #[test]
    fn test_none_is_zero() {
        assert_eq!(Pacer::none().next_delay(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_sleeps() {
        let pacer = Pacer::new(Duration::from_secs(2), Duration::from_secs(4));
        let start = tokio::time::Instant::now();
        pacer.pause().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited <= Duration::from_secs(4));
    }

    #[test]
    fn test_from_config() {
        let pacer = Pacer::from(&PacingConfig::default());
        let delay = pacer.next_delay();
        assert!(delay >= Duration::from_millis(2000) && delay <= Duration::from_millis(4000));
    }
}
