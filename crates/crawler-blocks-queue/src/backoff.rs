use std::time::Duration;

/// Exponential backoff for the loader's RPC failure path (spec §4.4:
/// `interval=1s, max=10s, multiplier=1.5`).
#[derive(Debug, Clone)]
pub struct Backoff {
    interval: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(interval: Duration, max: Duration, multiplier: f64) -> Self {
        Self { interval, max, multiplier, current: interval }
    }

    /// Returns the delay to wait, then grows it for the next call.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = self.current.mul_f64(self.multiplier);
        self.current = grown.min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.interval;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(10), 1.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps_at_max() {
        let mut b = Backoff::new(Duration::from_secs(1), Duration::from_secs(10), 1.5);
        assert_eq!(b.next_delay(), Duration::from_secs(1));
        assert_eq!(b.next_delay(), Duration::from_millis(1500));
        for _ in 0..20 {
            b.next_delay();
        }
        assert_eq!(b.next_delay(), Duration::from_secs(10));
    }

    #[test]
    fn reset_returns_to_the_initial_interval() {
        let mut b = Backoff::new(Duration::from_secs(1), Duration::from_secs(10), 1.5);
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_secs(1));
    }
}
