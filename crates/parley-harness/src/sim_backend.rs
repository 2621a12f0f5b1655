//! Scripted collaborators.
//!
//! `SimBackend` answers from in-memory tables. History fetches for a peer can
//! be held until the test releases them, which is how tests make a fetch
//! resolve after the user has moved on to another peer.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use parley_client::{Backend, BackendError};
use parley_proto::{Contact, HistoryMessage, PeerId, Profile};
use tokio::sync::Semaphore;

struct BackendState {
    profile: Profile,
    contacts: Vec<Contact>,
    histories: HashMap<PeerId, Vec<HistoryMessage>>,
    held: HashMap<PeerId, Arc<Semaphore>>,
    history_calls: Vec<PeerId>,
    contact_calls: usize,
    logout_error: Option<BackendError>,
    logged_out: bool,
}

/// Scripted [`Backend`] for deterministic tests.
///
/// Clones share state.
#[derive(Clone)]
pub struct SimBackend {
    state: Arc<Mutex<BackendState>>,
}

impl SimBackend {
    /// Backend that identifies the local user as `profile`.
    pub fn new(profile: Profile) -> Self {
        Self {
            state: Arc::new(Mutex::new(BackendState {
                profile,
                contacts: Vec::new(),
                histories: HashMap::new(),
                held: HashMap::new(),
                history_calls: Vec::new(),
                contact_calls: 0,
                logout_error: None,
                logged_out: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Contact directory returned by `fetch_contacts`.
    pub fn set_contacts(&self, contacts: Vec<Contact>) {
        self.lock().contacts = contacts;
    }

    /// Stored conversation returned for `peer`.
    ///
    /// Read when a fetch resolves, not when it is issued.
    pub fn set_history(&self, peer: impl Into<PeerId>, messages: Vec<HistoryMessage>) {
        self.lock().histories.insert(peer.into(), messages);
    }

    /// Hold every history fetch for `peer` until [`release_history`] is called.
    ///
    /// [`release_history`]: Self::release_history
    pub fn hold_history(&self, peer: impl Into<PeerId>) {
        self.lock().held.insert(peer.into(), Arc::new(Semaphore::new(0)));
    }

    /// Let one held fetch for `peer` resolve.
    pub fn release_history(&self, peer: impl Into<PeerId>) {
        if let Some(gate) = self.lock().held.get(&peer.into()) {
            gate.add_permits(1);
        }
    }

    /// Make the next logout fail with `err`.
    pub fn fail_logout(&self, err: BackendError) {
        self.lock().logout_error = Some(err);
    }

    /// Peers whose history was requested, in request order.
    pub fn history_calls(&self) -> Vec<PeerId> {
        self.lock().history_calls.clone()
    }

    /// Number of contact directory fetches.
    pub fn contact_calls(&self) -> usize {
        self.lock().contact_calls
    }

    /// True once a logout succeeded.
    pub fn logged_out(&self) -> bool {
        self.lock().logged_out
    }
}

impl Backend for SimBackend {
    async fn fetch_profile(&self) -> Result<Profile, BackendError> {
        Ok(self.lock().profile.clone())
    }

    async fn fetch_contacts(&self) -> Result<Vec<Contact>, BackendError> {
        let mut state = self.lock();
        state.contact_calls += 1;
        Ok(state.contacts.clone())
    }

    async fn fetch_history(&self, peer: &PeerId) -> Result<Vec<HistoryMessage>, BackendError> {
        let gate = {
            let mut state = self.lock();
            state.history_calls.push(peer.clone());
            state.held.get(peer).cloned()
        };

        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| BackendError::Transport("simulation gate closed".to_string()))?;
            permit.forget();
        }

        Ok(self.lock().histories.get(peer).cloned().unwrap_or_default())
    }

    async fn logout(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        if let Some(err) = state.logout_error.take() {
            return Err(err);
        }
        state.logged_out = true;
        Ok(())
    }
}
