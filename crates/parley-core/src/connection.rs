//! Connection lifecycle state machine.
//!
//! Owns the socket state and the reconnect schedule. Knows nothing about
//! message semantics: outbound frames are encoded and handed to the driver,
//! inbound text is passed through untouched.
//!
//! Uses the action pattern: methods take time as input and return actions for
//! the driver to execute (open a socket, write a frame, close, deliver inbound
//! text to the controller).
//!
//! # State Machine
//!
//! ```text
//!                 connect()             handle_opened()
//! ┌──────────────┐ ─────────> ┌────────────┐ ─────────> ┌───────────┐
//! │ Disconnected │            │ Connecting │            │ Connected │
//! └──────────────┘ <───────── └────────────┘            └───────────┘
//!    ^    │   open failed / timed out                         │
//!    │    │ tick() after reconnect delay                      │
//!    │    └──────────────────> Connecting                     │
//!    └────────────────────────────────────────────────────────┘
//!                 unexpected close (schedules one reconnect)
//! ```
//!
//! # Invariants
//!
//! - At most one reconnect is scheduled at any time.
//! - Every failure in the automatic mode schedules a retry. There is no retry
//!   ceiling and no terminal "gave up" state.
//! - `shutdown()` is the only way to stop retrying.
//! - An attempt stuck in `Connecting` past the connect timeout counts as a
//!   failed open.

use std::{
    ops::Add,
    time::{Duration, Instant},
};

use parley_proto::OutboundFrame;

use crate::error::ConnectionError;

/// Delay before the single reconnect attempt after a closure.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound on the exponential backoff delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Time allowed for the transport to open the socket.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default chat server socket address.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:4040";

/// Actions returned by the connection state machine.
///
/// The driver executes these actions:
/// - `Open`: Establish the socket
/// - `SendFrame`: Write the text frame to the socket
/// - `Close`: Close the socket
/// - `Deliver`: Hand inbound text to the frame consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a socket to this address
    Open {
        /// Server socket address
        url: String,
    },

    /// Send this text frame
    SendFrame(String),

    /// Close the socket with this reason
    Close {
        /// Reason for closing the connection
        reason: String,
    },

    /// Inbound text for the frame consumer
    Deliver(String),
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket. A reconnect may be scheduled.
    Disconnected,
    /// Socket open requested, waiting for the transport
    Connecting,
    /// Socket open, frames flow both ways
    Connected,
}

/// How long to wait before reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay after every failure.
    Fixed(Duration),
    /// Delay doubles with every consecutive failure, capped at `max`.
    Exponential {
        /// Delay after the first failure
        base: Duration,
        /// Ceiling for the delay
        max: Duration,
    },
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { base, max } => {
                let shift = attempt.saturating_sub(1).min(31);
                base.saturating_mul(1u32 << shift).min(max)
            },
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed(DEFAULT_RECONNECT_DELAY)
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Server socket address
    pub url: String,
    /// Reconnect schedule
    pub reconnect: ReconnectPolicy,
    /// Open attempts older than this are abandoned and retried
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Connection state machine
///
/// Exclusively owns the connection state. Other components read it through
/// [`ConnectionManager::state`] and never mutate it.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct ConnectionManager<I = Instant>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Current state
    state: ConnectionState,
    /// Configuration
    config: ConnectionConfig,
    /// When the pending reconnect fires. `None` if nothing is scheduled.
    reconnect_at: Option<I>,
    /// When the in-flight open attempt is abandoned. Set only in `Connecting`.
    connect_deadline: Option<I>,
    /// Consecutive failures since the last successful open
    failures: u32,
    /// Whether closures schedule a reconnect (false after shutdown)
    auto_reconnect: bool,
}

impl<I> ConnectionManager<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Create a new manager in [`ConnectionState::Disconnected`] state
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            config,
            reconnect_at: None,
            connect_deadline: None,
            failures: 0,
            auto_reconnect: true,
        }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True while frames can be sent.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// When the scheduled reconnect fires. `None` if nothing is scheduled.
    #[must_use]
    pub fn reconnect_at(&self) -> Option<I> {
        self.reconnect_at
    }

    /// Consecutive failures since the last successful open.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Request a socket.
    ///
    /// Idempotent: only acts in `Disconnected`. Cancels any scheduled
    /// reconnect (the open happens now instead) and re-enables automatic
    /// reconnects after a previous `shutdown()`.
    pub fn connect(&mut self, now: I) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Disconnected {
            return vec![];
        }

        self.auto_reconnect = true;
        self.reconnect_at = None;
        self.begin_open(now)
    }

    /// Transport reports the socket is open.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if no open was requested
    pub fn handle_opened(&mut self) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Connecting {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "handle_opened",
            });
        }

        self.state = ConnectionState::Connected;
        self.connect_deadline = None;
        self.failures = 0;
        Ok(())
    }

    /// Transport reports the open attempt failed.
    ///
    /// Treated like an unexpected close: one retry is scheduled.
    pub fn handle_open_failed(&mut self, now: I) {
        if self.state != ConnectionState::Connecting {
            return;
        }

        self.state = ConnectionState::Disconnected;
        self.connect_deadline = None;
        self.schedule_reconnect(now);
    }

    /// Transport reports the socket closed.
    ///
    /// A close while already `Disconnected` (duplicate notification, or the
    /// echo of our own `shutdown()`) is ignored, so exactly one reconnect is
    /// scheduled per closure.
    pub fn handle_closed(&mut self, now: I) {
        if self.state == ConnectionState::Disconnected {
            return;
        }

        self.state = ConnectionState::Disconnected;
        self.connect_deadline = None;
        if self.auto_reconnect {
            self.schedule_reconnect(now);
        }
    }

    /// Process periodic maintenance.
    ///
    /// Fires the scheduled reconnect when due, and abandons an open attempt
    /// that has outlived the connect timeout (closing it and scheduling a
    /// retry as for any other failed open).
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Connected => vec![],
            ConnectionState::Connecting => match self.connect_deadline {
                Some(deadline) if now >= deadline => {
                    self.handle_open_failed(now);
                    let timeout = self.config.connect_timeout;
                    vec![ConnectionAction::Close {
                        reason: format!("connect timed out after {timeout:?}"),
                    }]
                },
                _ => vec![],
            },
            ConnectionState::Disconnected => match self.reconnect_at {
                Some(at) if now >= at => {
                    self.reconnect_at = None;
                    self.begin_open(now)
                },
                _ => vec![],
            },
        }
    }

    /// Encode a frame for transmission.
    ///
    /// At most one delivery attempt per call. Nothing is queued: if the
    /// socket is not open the frame is refused.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` if not in `Connected` state
    /// - `ConnectionError::Protocol` if the frame cannot be encoded
    pub fn send(&self, frame: &OutboundFrame) -> Result<ConnectionAction, ConnectionError> {
        if self.state != ConnectionState::Connected {
            return Err(ConnectionError::NotConnected { state: self.state });
        }

        Ok(ConnectionAction::SendFrame(frame.encode()?))
    }

    /// Pass inbound text to the frame consumer.
    ///
    /// Text that arrives while not connected (a late read racing a close) is
    /// dropped.
    pub fn handle_incoming(&self, text: String) -> Option<ConnectionAction> {
        (self.state == ConnectionState::Connected).then_some(ConnectionAction::Deliver(text))
    }

    /// Deliberately close the socket and stop reconnecting.
    ///
    /// Automatic reconnects resume only after the next explicit `connect()`.
    pub fn shutdown(&mut self, reason: &str) -> Vec<ConnectionAction> {
        let previous = self.state;

        self.auto_reconnect = false;
        self.reconnect_at = None;
        self.connect_deadline = None;
        self.failures = 0;
        self.state = ConnectionState::Disconnected;

        if previous == ConnectionState::Disconnected {
            vec![]
        } else {
            vec![ConnectionAction::Close { reason: reason.to_string() }]
        }
    }

    fn begin_open(&mut self, now: I) -> Vec<ConnectionAction> {
        self.state = ConnectionState::Connecting;
        self.connect_deadline = Some(now + self.config.connect_timeout);
        vec![ConnectionAction::Open { url: self.config.url.clone() }]
    }

    fn schedule_reconnect(&mut self, now: I) {
        self.failures = self.failures.saturating_add(1);
        self.reconnect_at = Some(now + self.config.reconnect.delay(self.failures));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn connected() -> ConnectionManager {
        let mut conn = ConnectionManager::new(ConnectionConfig::default());
        conn.connect(Instant::now());
        conn.handle_opened().unwrap();
        conn
    }

    fn frame() -> OutboundFrame {
        OutboundFrame { recipient: "u2".into(), text: "hi".into(), file: None }
    }

    #[test]
    fn connection_lifecycle() {
        let mut conn: ConnectionManager = ConnectionManager::new(ConnectionConfig::default());
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        let actions = conn.connect(Instant::now());
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(actions, vec![ConnectionAction::Open { url: DEFAULT_SERVER_URL.to_string() }]);

        conn.handle_opened().unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert!(conn.is_connected());
    }

    #[test]
    fn connect_is_idempotent() {
        let mut conn: ConnectionManager = ConnectionManager::new(ConnectionConfig::default());
        assert_eq!(conn.connect(Instant::now()).len(), 1);
        assert!(conn.connect(Instant::now()).is_empty());

        conn.handle_opened().unwrap();
        assert!(conn.connect(Instant::now()).is_empty());
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn opened_without_request_is_rejected() {
        let mut conn: ConnectionManager = ConnectionManager::new(ConnectionConfig::default());
        let result = conn.handle_opened();
        assert!(matches!(result, Err(ConnectionError::InvalidState { .. })));
    }

    #[test]
    fn send_requires_connected() {
        let mut conn: ConnectionManager = ConnectionManager::new(ConnectionConfig::default());
        assert_eq!(
            conn.send(&frame()),
            Err(ConnectionError::NotConnected { state: ConnectionState::Disconnected })
        );

        conn.connect(Instant::now());
        assert_eq!(
            conn.send(&frame()),
            Err(ConnectionError::NotConnected { state: ConnectionState::Connecting })
        );

        conn.handle_opened().unwrap();
        let action = conn.send(&frame()).unwrap();
        assert_eq!(
            action,
            ConnectionAction::SendFrame(r#"{"recipient":"u2","text":"hi","file":null}"#.into())
        );
    }

    #[test]
    fn closure_schedules_exactly_one_reconnect_after_fixed_delay() {
        let t0 = Instant::now();
        let mut conn = connected();

        conn.handle_closed(t0);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.reconnect_at(), Some(t0 + DEFAULT_RECONNECT_DELAY));

        // Duplicate close notification does not schedule a second attempt
        conn.handle_closed(t0 + Duration::from_millis(10));
        assert_eq!(conn.reconnect_at(), Some(t0 + DEFAULT_RECONNECT_DELAY));

        assert!(conn.tick(t0 + Duration::from_millis(999)).is_empty());

        let actions = conn.tick(t0 + DEFAULT_RECONNECT_DELAY);
        assert!(matches!(actions.as_slice(), [ConnectionAction::Open { .. }]));
        assert_eq!(conn.state(), ConnectionState::Connecting);

        // Nothing more fires while the attempt is in flight
        assert!(conn.tick(t0 + Duration::from_secs(10)).is_empty());

        conn.handle_opened().unwrap();
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(conn.failures(), 0);
    }

    #[test]
    fn failed_reconnect_keeps_retrying_forever() {
        let t0 = Instant::now();
        let mut conn = connected();
        conn.handle_closed(t0);

        let mut now = t0;
        for attempt in 1..=50u32 {
            now += DEFAULT_RECONNECT_DELAY;
            let actions = conn.tick(now);
            assert_eq!(actions.len(), 1, "attempt {attempt} must fire");
            conn.handle_open_failed(now);
            assert_eq!(conn.reconnect_at(), Some(now + DEFAULT_RECONNECT_DELAY));
        }
        assert_eq!(conn.failures(), 51);
    }

    #[test]
    fn exponential_policy_doubles_and_caps() {
        let policy = ReconnectPolicy::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(8),
        };

        let delays: Vec<_> = (1..=6).map(|n| policy.delay(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 8, 8]);

        // Huge attempt counts saturate instead of overflowing
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(8));
    }

    #[test]
    fn exponential_backoff_resets_after_successful_open() {
        let t0 = Instant::now();
        let config = ConnectionConfig {
            reconnect: ReconnectPolicy::Exponential {
                base: Duration::from_secs(1),
                max: DEFAULT_BACKOFF_MAX,
            },
            ..ConnectionConfig::default()
        };
        let mut conn = ConnectionManager::new(config);
        conn.connect(Instant::now());
        conn.handle_open_failed(t0);
        assert_eq!(conn.reconnect_at(), Some(t0 + Duration::from_secs(1)));

        let t1 = t0 + Duration::from_secs(1);
        conn.tick(t1);
        conn.handle_open_failed(t1);
        assert_eq!(conn.reconnect_at(), Some(t1 + Duration::from_secs(2)));

        let t2 = t1 + Duration::from_secs(2);
        conn.tick(t2);
        conn.handle_opened().unwrap();
        conn.handle_closed(t2);
        assert_eq!(conn.reconnect_at(), Some(t2 + Duration::from_secs(1)));
    }

    #[test]
    fn shutdown_stops_reconnecting_until_connect() {
        let t0 = Instant::now();
        let mut conn = connected();

        let actions = conn.shutdown("logout");
        assert_eq!(actions, vec![ConnectionAction::Close { reason: "logout".into() }]);
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        // Echo of our own close is ignored
        conn.handle_closed(t0);
        assert_eq!(conn.reconnect_at(), None);
        assert!(conn.tick(t0 + Duration::from_secs(60)).is_empty());

        // Shutting down twice closes nothing
        assert!(conn.shutdown("logout").is_empty());

        // Explicit connect re-arms the reconnect loop
        conn.connect(Instant::now());
        conn.handle_opened().unwrap();
        conn.handle_closed(t0);
        assert!(conn.reconnect_at().is_some());
    }

    #[test]
    fn shutdown_cancels_pending_reconnect() {
        let t0 = Instant::now();
        let mut conn = connected();
        conn.handle_closed(t0);
        assert!(conn.reconnect_at().is_some());

        assert!(conn.shutdown("logout").is_empty());
        assert_eq!(conn.reconnect_at(), None);
        assert!(conn.tick(t0 + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn inbound_text_only_delivered_while_connected() {
        let t0 = Instant::now();
        let mut conn = connected();

        assert_eq!(
            conn.handle_incoming("{}".into()),
            Some(ConnectionAction::Deliver("{}".into()))
        );

        conn.handle_closed(t0);
        assert_eq!(conn.handle_incoming("{}".into()), None);
    }

    #[test]
    fn stalled_open_times_out_and_retries() {
        let t0 = Instant::now();
        let mut conn: ConnectionManager = ConnectionManager::new(ConnectionConfig::default());
        conn.connect(t0);

        assert!(conn.tick(t0 + DEFAULT_CONNECT_TIMEOUT - Duration::from_millis(1)).is_empty());
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let expired = t0 + DEFAULT_CONNECT_TIMEOUT;
        let actions = conn.tick(expired);
        assert!(matches!(actions.as_slice(), [ConnectionAction::Close { .. }]));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.reconnect_at(), Some(expired + DEFAULT_RECONNECT_DELAY));

        // The retry gets a fresh deadline of its own
        let retry = expired + DEFAULT_RECONNECT_DELAY;
        assert!(matches!(conn.tick(retry).as_slice(), [ConnectionAction::Open { .. }]));
        assert!(conn.tick(retry + Duration::from_secs(9)).is_empty());
        assert_eq!(conn.state(), ConnectionState::Connecting);
    }

    #[test]
    fn late_open_after_timeout_is_rejected() {
        let t0 = Instant::now();
        let mut conn: ConnectionManager = ConnectionManager::new(ConnectionConfig::default());
        conn.connect(t0);
        conn.tick(t0 + DEFAULT_CONNECT_TIMEOUT);

        assert!(matches!(conn.handle_opened(), Err(ConnectionError::InvalidState { .. })));
        assert_eq!(conn.failures(), 1);
    }
}
