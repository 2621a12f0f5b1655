//! Virtual-time environment.
//!
//! Time only moves when a test calls [`SimEnv::advance`] or when a
//! [`SimEnv::sleep`] completes. Under tokio's paused clock the runtime's tick
//! sleeps complete instantly and in order, so reconnect schedules play out
//! deterministically.

use std::{
    ops::{Add, Sub},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parley_core::Environment;

/// Wall clock reading at virtual time zero (2023-11-14T22:13:20Z).
pub const SIM_WALL_CLOCK_START_MS: u64 = 1_700_000_000_000;

/// Point in virtual time, measured from the start of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time since the start of the simulation.
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0.saturating_add(rhs))
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Simulation environment with a shared virtual clock.
///
/// Clones share the clock.
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    elapsed_nanos: Arc<AtomicU64>,
}

impl SimEnv {
    /// Create an environment at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, duration: Duration) {
        advance(&self.elapsed_nanos, duration);
    }

    /// Time since the start of the simulation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

fn advance(clock: &AtomicU64, duration: Duration) {
    let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
    clock.fetch_add(nanos, Ordering::SeqCst);
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.elapsed())
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        let clock = Arc::clone(&self.elapsed_nanos);
        async move {
            tokio::time::sleep(duration).await;
            advance(&clock, duration);
        }
    }

    fn wall_clock_millis(&self) -> u64 {
        SIM_WALL_CLOCK_START_MS + self.elapsed().as_millis() as u64
    }
}
