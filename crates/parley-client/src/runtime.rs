//! Generic runtime for the synchronization engine.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`SyncController`]: the sans-IO state machine
//! - [`Driver`]: socket I/O
//! - [`Backend`]: request / response collaborators
//! - [`Environment`]: time
//!
//! Everything runs on one task. Collaborator calls are spawned onto a
//! `JoinSet` and come back as events, so a slow history fetch never blocks
//! inbound frames. Fetches are not cancelled; the controller discards stale
//! results.

use std::{collections::VecDeque, time::Duration};

use parley_core::{
    ConnectionConfig, ConnectionManager, ConnectionState, Environment, Message, MessageLedger,
    Peer, PresenceStore,
};
use parley_proto::{Attachment, Contact, HistoryMessage, PeerId, Profile};
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinSet,
};

use crate::{
    Backend, BackendError, ClientAction, ClientError, ClientEvent, Driver, SyncController,
    TransportEvent,
};

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime task has stopped.
    #[error("runtime stopped")]
    ChannelClosed,

    /// Controller rejected the request.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Collaborator call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Runtime tuning.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How often the reconnect schedule is checked.
    pub tick_interval: Duration,
    /// Capacity of the command channel.
    pub command_buffer: usize,
    /// Capacity of the update broadcast. Slow observers miss old updates.
    pub update_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { tick_interval: Duration::from_millis(100), command_buffer: 64, update_buffer: 256 }
    }
}

/// User commands accepted by the runtime.
#[derive(Debug)]
pub enum Command {
    /// Open the conversation with a peer.
    SelectPeer(PeerId),
    /// Send a message to the active peer.
    Send {
        /// Message text.
        text: String,
        /// Optional encoded attachment.
        attachment: Option<Attachment>,
        /// Outcome of the send.
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    /// End the session and clear all state.
    Logout {
        /// Outcome of the logout call.
        reply: oneshot::Sender<Result<(), BackendError>>,
    },
    /// Close the socket and stop the runtime.
    Shutdown,
}

/// State changes published to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncUpdate {
    /// Connection state changed.
    Connection(ConnectionState),
    /// Online and offline peers, self excluded.
    Roster(Vec<Peer>),
    /// A peer's visible conversation.
    Conversation {
        /// Peer the conversation is with.
        peer: PeerId,
        /// Full visible sequence.
        messages: Vec<Message>,
    },
    /// Session ended and all state was cleared.
    LoggedOut,
}

/// Handle for sending commands to a running [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<Command>,
    updates: broadcast::Sender<SyncUpdate>,
}

impl RuntimeHandle {
    /// Receive every update published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncUpdate> {
        self.updates.subscribe()
    }

    /// Open the conversation with `peer`.
    pub async fn select_peer(&self, peer: PeerId) -> Result<(), RuntimeError> {
        self.command(Command::SelectPeer(peer)).await
    }

    /// Send a message to the active peer.
    ///
    /// Resolves once the frame has been handed to the socket.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Client(ClientError::NotConnected)` if the socket is
    /// down. Nothing is queued; retry later or drop the message.
    pub async fn send(&self, text: String, attachment: Option<Attachment>) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Send { text, attachment, reply }).await?;
        Ok(rx.await.map_err(|_| RuntimeError::ChannelClosed)??)
    }

    /// End the session. On success all in-memory state is gone.
    pub async fn logout(&self) -> Result<(), RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Logout { reply }).await?;
        Ok(rx.await.map_err(|_| RuntimeError::ChannelClosed)??)
    }

    /// Stop the runtime.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.command(Command::Shutdown).await
    }

    async fn command(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands.send(command).await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

/// Result of a spawned collaborator call.
enum Completion {
    History { peer: PeerId, epoch: u64, result: Result<Vec<HistoryMessage>, BackendError> },
    Contacts { session: u64, result: Result<Vec<Contact>, BackendError> },
}

/// Generic runtime that orchestrates controller, driver and backend.
///
/// # Type Parameters
///
/// - `D`: Socket driver
/// - `B`: Request / response collaborators
/// - `E`: Environment for time
pub struct Runtime<D, B, E>
where
    D: Driver,
    B: Backend,
    E: Environment,
{
    driver: D,
    backend: B,
    env: E,
    config: RuntimeConfig,
    controller: SyncController<E::Instant>,
    commands: mpsc::Receiver<Command>,
    updates: broadcast::Sender<SyncUpdate>,
    fetches: JoinSet<Completion>,
    socket_open: bool,
    published_state: ConnectionState,
}

impl<D, B, E> Runtime<D, B, E>
where
    D: Driver,
    B: Backend,
    E: Environment,
{
    /// Fetch the local profile and build a runtime around it.
    ///
    /// Nothing is connected yet; [`run`](Self::run) opens the socket.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Backend` if the profile cannot be fetched.
    pub async fn start(
        driver: D,
        backend: B,
        env: E,
        connection: ConnectionConfig,
        config: RuntimeConfig,
    ) -> Result<(Self, RuntimeHandle), RuntimeError> {
        let profile = backend.fetch_profile().await?;
        tracing::info!(user_id = %profile.user_id, username = %profile.username, "profile loaded");

        Ok(Self::with_profile(driver, backend, env, profile, connection, config))
    }

    /// Build a runtime for an already known profile.
    pub fn with_profile(
        driver: D,
        backend: B,
        env: E,
        profile: Profile,
        connection: ConnectionConfig,
        config: RuntimeConfig,
    ) -> (Self, RuntimeHandle) {
        let (command_tx, commands) = mpsc::channel(config.command_buffer);
        let (updates, _) = broadcast::channel(config.update_buffer);

        let controller = SyncController::new(
            profile,
            ConnectionManager::new(connection),
            PresenceStore::new(),
            MessageLedger::new(),
        );

        let handle = RuntimeHandle { commands: command_tx, updates: updates.clone() };
        let runtime = Self {
            driver,
            backend,
            env,
            config,
            controller,
            commands,
            updates,
            fetches: JoinSet::new(),
            socket_open: false,
            published_state: ConnectionState::Disconnected,
        };

        (runtime, handle)
    }

    /// Controller state, read-only.
    pub fn controller(&self) -> &SyncController<E::Instant> {
        &self.controller
    }

    /// Run the event loop until [`Command::Shutdown`] or every handle is
    /// dropped.
    ///
    /// Protocol errors, transport failures and stale results are logged and
    /// never end the loop.
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        let now = self.env.now();
        self.feed(ClientEvent::Connect { now }).await;

        let env = self.env.clone();
        let interval = self.config.tick_interval;
        let mut tick = Box::pin(env.sleep(interval));

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }

                event = self.driver.recv(), if self.socket_open => {
                    match event {
                        Some(TransportEvent::Frame(text)) => {
                            self.feed(ClientEvent::FrameReceived(text)).await;
                        },
                        Some(TransportEvent::Closed { reason }) => self.socket_closed(reason).await,
                        None => self.socket_closed("transport gone".to_string()).await,
                    }
                }

                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    match joined {
                        Ok(completion) => self.complete(completion).await,
                        Err(err) => tracing::warn!(%err, "collaborator task failed"),
                    }
                }

                () = &mut tick => {
                    tick = Box::pin(env.sleep(interval));
                    let now = self.env.now();
                    self.feed(ClientEvent::Tick { now }).await;
                }
            }
        }

        tracing::info!("runtime stopping");
        self.driver.close().await;
        self.fetches.shutdown().await;
        Ok(())
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::SelectPeer(peer) => {
                tracing::debug!(%peer, "selecting peer");
                self.feed(ClientEvent::SelectPeer { peer }).await;
            },
            Command::Send { text, attachment, reply } => {
                let wall_clock_millis = self.env.wall_clock_millis();
                let event = ClientEvent::SendIntent { text, attachment, wall_clock_millis };
                let result = self.process(event).await;
                if let Err(err) = &result {
                    tracing::warn!(%err, "send rejected");
                }
                // Caller may have given up waiting.
                let _ = reply.send(result);
            },
            Command::Logout { reply } => {
                let result = self.backend.logout().await;
                match &result {
                    Ok(()) => {
                        tracing::info!("logged out");
                        self.feed(ClientEvent::LoggedOut).await;
                        self.publish(SyncUpdate::LoggedOut);
                    },
                    Err(err) => tracing::warn!(%err, "logout failed, session kept"),
                }
                let _ = reply.send(result);
            },
            Command::Shutdown => {},
        }
    }

    async fn socket_closed(&mut self, reason: String) {
        tracing::info!(%reason, "connection closed");
        self.socket_open = false;
        let now = self.env.now();
        self.feed(ClientEvent::Closed { now, reason }).await;
    }

    async fn complete(&mut self, completion: Completion) {
        let event = match completion {
            Completion::History { peer, epoch, result: Ok(messages) } => {
                ClientEvent::HistoryLoaded { peer, epoch, messages }
            },
            Completion::History { peer, epoch, result: Err(err) } => {
                tracing::warn!(%peer, %err, "history fetch failed");
                ClientEvent::HistoryFailed { peer, epoch, reason: err.to_string() }
            },
            Completion::Contacts { session, result: Ok(contacts) } => {
                ClientEvent::ContactsLoaded { session, contacts }
            },
            Completion::Contacts { result: Err(err), .. } => {
                tracing::warn!(%err, "contact fetch failed, offline list unchanged");
                return;
            },
        };
        self.feed(event).await;
    }

    /// Process an event, logging any rejection.
    async fn feed(&mut self, event: ClientEvent<E::Instant>) {
        if let Err(err) = self.process(event).await {
            log_rejection(&err);
        }
    }

    /// Process an event and everything it causes.
    ///
    /// Only the first event's rejection is returned. Follow-up events (socket
    /// opened, send failure turned into a close) are logged instead.
    async fn process(&mut self, event: ClientEvent<E::Instant>) -> Result<(), ClientError> {
        let actions = self.controller.handle(event)?;
        let mut pending = self.execute(actions).await;

        while let Some(event) = pending.pop_front() {
            match self.controller.handle(event) {
                Ok(actions) => pending.extend(self.execute(actions).await),
                Err(err) => log_rejection(&err),
            }
        }

        self.publish_connection_state();
        Ok(())
    }

    /// Execute controller actions, returning the events they produced.
    async fn execute(&mut self, actions: Vec<ClientAction>) -> VecDeque<ClientEvent<E::Instant>> {
        let mut events = VecDeque::new();

        for action in actions {
            match action {
                ClientAction::OpenConnection { url } => {
                    self.publish_connection_state();
                    events.push_back(self.open_socket(&url).await);
                },
                ClientAction::SendFrame(text) => {
                    if let Err(err) = self.driver.send_frame(text).await {
                        tracing::warn!(%err, "send failed, dropping connection");
                        self.driver.close().await;
                        self.socket_open = false;
                        let now = self.env.now();
                        events.push_back(ClientEvent::Closed { now, reason: err.to_string() });
                    }
                },
                ClientAction::CloseConnection { reason } => {
                    tracing::info!(%reason, "closing connection");
                    self.driver.close().await;
                    self.socket_open = false;
                },
                ClientAction::FetchHistory { peer, epoch } => {
                    tracing::debug!(%peer, epoch, "fetching history");
                    let backend = self.backend.clone();
                    self.fetches.spawn(async move {
                        let result = backend.fetch_history(&peer).await;
                        Completion::History { peer, epoch, result }
                    });
                },
                ClientAction::FetchContacts { session } => {
                    let backend = self.backend.clone();
                    self.fetches.spawn(async move {
                        let result = backend.fetch_contacts().await;
                        Completion::Contacts { session, result }
                    });
                },
                ClientAction::ConversationChanged { peer } => {
                    let messages = self.controller.view(&peer).to_vec();
                    self.publish(SyncUpdate::Conversation { peer, messages });
                },
                ClientAction::RosterChanged => {
                    self.publish(SyncUpdate::Roster(self.controller.peers()));
                },
                ClientAction::Log { message } => tracing::debug!("{message}"),
            }
        }

        events
    }

    /// Open the socket, giving up after the configured connect timeout.
    ///
    /// Commands wait while an attempt is in flight, so a handshake that never
    /// answers must not hold the loop longer than the timeout.
    async fn open_socket(&mut self, url: &str) -> ClientEvent<E::Instant> {
        let timeout = self.controller.connection().config().connect_timeout;
        let env = self.env.clone();

        let attempt = tokio::select! {
            result = self.driver.open(url) => Some(result),
            () = env.sleep(timeout) => None,
        };

        let reason = match attempt {
            Some(Ok(())) => {
                tracing::info!(%url, "connection open");
                self.socket_open = true;
                return ClientEvent::Opened;
            },
            Some(Err(err)) => {
                tracing::warn!(%url, %err, "connection failed");
                err.to_string()
            },
            None => {
                tracing::warn!(%url, ?timeout, "connection attempt timed out");
                self.driver.close().await;
                format!("connect timed out after {timeout:?}")
            },
        };

        ClientEvent::OpenFailed { now: self.env.now(), reason }
    }

    fn publish_connection_state(&mut self) {
        let state = self.controller.connection_state();
        if state != self.published_state {
            self.published_state = state;
            self.publish(SyncUpdate::Connection(state));
        }
    }

    fn publish(&self, update: SyncUpdate) {
        // No subscribers is fine.
        let _ = self.updates.send(update);
    }
}

fn log_rejection(err: &ClientError) {
    match err {
        ClientError::Protocol(err) => tracing::warn!(%err, "dropped inbound frame"),
        ClientError::NotConnected { .. } => tracing::debug!(%err, "event rejected"),
        ClientError::Connection(err) => tracing::warn!(%err, "connection event rejected"),
    }
}
