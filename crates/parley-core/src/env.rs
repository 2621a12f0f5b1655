//! Environment abstraction for deterministic testing.
//!
//! Decouples the sync logic from system time. Production uses the real
//! monotonic and wall clocks, simulation uses a virtual clock that only moves
//! when the test advances it.

use std::{
    future::Future,
    ops::{Add, Sub},
    time::Duration,
};

/// Abstract environment providing time and async sleeping.
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, simulation uses a
    /// virtual instant.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::fmt::Debug
        + Add<Duration, Output = Self::Instant>
        + Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code sleeps. State machines receive `now` instead.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Milliseconds since the Unix epoch.
    ///
    /// Seeds provisional message ids. May jump (NTP), which is why
    /// [`crate::ProvisionalIds`] enforces its own monotonicity on top.
    fn wall_clock_millis(&self) -> u64;
}
