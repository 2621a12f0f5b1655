//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` stands in for the WebSocket so the same
//! [`parley_client::Runtime`] orchestration runs in tests. Clones share state:
//! hand one to the runtime and keep one to script the server side.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use parley_client::{Driver, TransportEvent};
use tokio::sync::Notify;

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

#[derive(Default)]
struct SharedState {
    open: bool,
    refuse_opens: usize,
    stall_opens: usize,
    opened: Vec<String>,
    sent: Vec<String>,
    incoming: VecDeque<TransportEvent>,
    closes: usize,
}

/// Simulation driver for deterministic testing.
#[derive(Clone, Default)]
pub struct SimDriver {
    state: Arc<Mutex<SharedState>>,
    wake: Arc<Notify>,
}

impl SimDriver {
    /// Create a new simulation driver.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inject a text frame from the server.
    pub fn inject_frame(&self, text: impl Into<String>) {
        self.lock().incoming.push_back(TransportEvent::Frame(text.into()));
        self.wake.notify_one();
    }

    /// Simulate the server dropping the socket.
    pub fn inject_close(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::debug!(%reason, "sim: injecting close");
        self.lock().incoming.push_back(TransportEvent::Closed { reason });
        self.wake.notify_one();
    }

    /// Make the next `count` open attempts fail.
    pub fn refuse_opens(&self, count: usize) {
        self.lock().refuse_opens = count;
    }

    /// Make the next `count` open attempts hang forever.
    pub fn stall_opens(&self, count: usize) {
        self.lock().stall_opens = count;
    }

    /// Take all captured outgoing frames.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Addresses of every open attempt so far, successful or not.
    pub fn open_attempts(&self) -> Vec<String> {
        self.lock().opened.clone()
    }

    /// Number of deliberate closes requested by the runtime.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// True while the simulated socket is open.
    pub fn is_open(&self) -> bool {
        self.lock().open
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;

    async fn open(&mut self, url: &str) -> Result<(), Self::Error> {
        let stalled = {
            let mut state = self.lock();
            state.opened.push(url.to_string());
            state.incoming.clear();
            state.open = false;

            if state.refuse_opens > 0 {
                state.refuse_opens -= 1;
                tracing::debug!(%url, remaining = state.refuse_opens, "sim: refusing open");
                return Err(SimDriverError(format!("connection refused: {url}")));
            }

            if state.stall_opens > 0 {
                state.stall_opens -= 1;
                tracing::debug!(%url, remaining = state.stall_opens, "sim: stalling open");
                true
            } else {
                state.open = true;
                false
            }
        };

        if stalled {
            // Handshake never answers.
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn send_frame(&mut self, text: String) -> Result<(), Self::Error> {
        let mut state = self.lock();
        if !state.open {
            return Err(SimDriverError("socket closed".to_string()));
        }
        state.sent.push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        loop {
            {
                let mut state = self.lock();
                if !state.open {
                    return None;
                }
                if let Some(event) = state.incoming.pop_front() {
                    if matches!(event, TransportEvent::Closed { .. }) {
                        state.open = false;
                    }
                    return Some(event);
                }
            }
            self.wake.notified().await;
        }
    }

    async fn close(&mut self) {
        let mut state = self.lock();
        if state.open {
            state.closes += 1;
        }
        state.open = false;
        state.incoming.clear();
    }
}
