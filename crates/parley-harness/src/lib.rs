//! Deterministic simulation harness for the Parley sync engine.
//!
//! Virtual-time and scripted implementations of the runtime's seams, so the
//! production [`parley_client::Runtime`] can be driven through exact event
//! orders: a fetch that resolves late, a socket that drops mid-conversation,
//! a server that refuses connections.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral checks over a
//! [`ControllerSnapshot`]. Use [`InvariantRegistry::standard()`] after every
//! event in property tests.

#![forbid(unsafe_code)]

pub mod frames;
pub mod invariants;
pub mod sim_backend;
pub mod sim_driver;
pub mod sim_env;

pub use invariants::{
    ControllerSnapshot, Invariant, InvariantRegistry, InvariantResult, PresencePartition,
    SelfNotListed, UniqueMessageIds, ViewMatchesSelection, Violation,
};
pub use sim_backend::SimBackend;
pub use sim_driver::{SimDriver, SimDriverError};
pub use sim_env::{SIM_WALL_CLOCK_START_MS, SimEnv, SimInstant};
