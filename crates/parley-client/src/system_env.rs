//! Production environment using system time.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parley_core::Environment;

/// Production environment.
///
/// `std::time::Instant` for the monotonic clock, `tokio::time::sleep` for
/// delays and the system clock for provisional message ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn wall_clock_millis(&self) -> u64 {
        // A clock set before 1970 yields 0; provisional ids stay monotonic
        // regardless.
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic() {
        let env = SystemEnv::new();
        let t1 = env.now();
        let t2 = env.now();
        assert!(t2 >= t1);
    }

    #[test]
    fn wall_clock_is_after_2020() {
        assert!(SystemEnv::new().wall_clock_millis() > 1_577_836_800_000);
    }

    #[tokio::test]
    async fn sleep_waits_at_least_the_duration() {
        let env = SystemEnv::new();
        let start = env.now();
        env.sleep(Duration::from_millis(10)).await;
        assert!(env.now() - start >= Duration::from_millis(10));
    }
}
