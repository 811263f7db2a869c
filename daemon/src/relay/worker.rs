//! The location relay: one long-lived task owning the sharing socket.
//!
//! Consumers talk to the task through [`LocationRelay`], a cheap cloneable
//! handle. Commands (configure, send, stop) travel over a single queue; the
//! connection state is published on a `watch` channel; decoded location
//! tables leave the task over an `mpsc` channel so they are handled on the
//! consumer's side, never on the socket task.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use super::protocol::{decode_server_message, encode_location, LocationTable, LocationUpdate};
use super::state::{RelayConfig, RelayConnectionState};
use super::transport::{Connector, RelaySocket};

/// Longest a single outbound frame may block the worker.
const SEND_TIMEOUT: Duration = Duration::from_secs(1);
/// Longest the worker waits for a socket to finish closing.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

enum Command {
    Configure(RelayConfig),
    Send(LocationUpdate),
    Stop,
}

/// Why the worker stopped waiting.
enum Interrupt {
    Reconfigured,
    Stop,
}

enum SessionEnd {
    /// The transport closed or failed.
    Lost,
    Interrupted(Interrupt),
}

/// Handle to the relay task.
#[derive(Clone)]
pub struct LocationRelay {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<RelayConnectionState>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl LocationRelay {
    /// Spawn the relay task on the current tokio runtime.
    ///
    /// Returns the handle and the receiver of location tables broadcast by
    /// the server.
    pub fn start<C: Connector>(
        connector: C,
        config: RelayConfig,
    ) -> (Self, mpsc::UnboundedReceiver<LocationTable>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(RelayConnectionState::Disabled);

        let worker = RelayWorker {
            connector: Arc::new(connector),
            config,
            commands: command_rx,
            state: state_tx,
            inbound: inbound_tx,
        };
        let task = tokio::spawn(worker.run());

        let relay = Self {
            commands: command_tx,
            state: state_rx,
            task: Arc::new(Mutex::new(Some(task))),
        };
        (relay, inbound_rx)
    }

    pub fn state(&self) -> RelayConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<RelayConnectionState> {
        self.state.clone()
    }

    /// Replace the relay configuration. A change drops any live socket at
    /// once, without waiting out a pending reconnect delay.
    pub fn configure(&self, config: RelayConfig) {
        if self.commands.send(Command::Configure(config)).is_err() {
            debug!("Relay task gone, configuration ignored");
        }
    }

    /// Forward `update` to the server.
    ///
    /// Dropped unless currently connected; nothing is buffered for later.
    /// Returns whether the update was handed to the socket task.
    pub fn send(&self, update: LocationUpdate) -> bool {
        if self.state() != RelayConnectionState::Connected {
            trace!("Relay not connected, dropping location");
            return false;
        }
        self.commands.send(Command::Send(update)).is_ok()
    }

    /// Close the socket and end the relay task, waiting for it to exit.
    pub async fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Relay task ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for LocationRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationRelay")
            .field("state", &self.state())
            .finish()
    }
}

struct RelayWorker<C> {
    connector: Arc<C>,
    config: RelayConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<RelayConnectionState>,
    inbound: mpsc::UnboundedSender<LocationTable>,
}

impl<C: Connector> RelayWorker<C> {
    async fn run(mut self) {
        debug!("Location relay started");
        loop {
            if !self.config.wants_connection() {
                if self.config.enabled {
                    warn!("Sharing enabled but no host set");
                } else {
                    debug!("Sharing disabled");
                }
                self.set_state(RelayConnectionState::Disabled);
                match self.wait_for_command().await {
                    Interrupt::Reconfigured => continue,
                    Interrupt::Stop => break,
                }
            }

            self.set_state(RelayConnectionState::Connecting);
            let host = self.config.host.clone();
            let connector = Arc::clone(&self.connector);
            info!(host = %host, "Connecting to sharing host");

            let connected = tokio::select! {
                result = connector.connect(&host) => result,
                interrupt = self.wait_for_command() => match interrupt {
                    Interrupt::Reconfigured => {
                        self.set_state(RelayConnectionState::Disabled);
                        continue;
                    }
                    Interrupt::Stop => break,
                },
            };

            match connected {
                Ok(socket) => {
                    self.set_state(RelayConnectionState::Connected);
                    match self.session(socket).await {
                        SessionEnd::Lost => {}
                        SessionEnd::Interrupted(Interrupt::Reconfigured) => {
                            self.set_state(RelayConnectionState::Disabled);
                            continue;
                        }
                        SessionEnd::Interrupted(Interrupt::Stop) => break,
                    }
                }
                Err(e) => warn!(host = %host, error = %e, "Could not connect to sharing host"),
            }

            self.set_state(RelayConnectionState::Disconnected);
            let delay = self.config.reconnect_delay;
            debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                interrupt = self.wait_for_command() => match interrupt {
                    Interrupt::Reconfigured => self.set_state(RelayConnectionState::Disabled),
                    Interrupt::Stop => break,
                },
            }
        }

        self.set_state(RelayConnectionState::Disabled);
        debug!("Location relay stopped");
    }

    fn set_state(&self, state: RelayConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "Relay state changed");
        }
    }

    /// Wait for a command that ends the current wait. Location updates that
    /// arrive meanwhile are dropped.
    async fn wait_for_command(&mut self) -> Interrupt {
        loop {
            match self.commands.recv().await {
                Some(Command::Send(_)) => trace!("Not connected, dropping location"),
                Some(Command::Configure(config)) => {
                    if self.apply(config) {
                        return Interrupt::Reconfigured;
                    }
                }
                Some(Command::Stop) | None => return Interrupt::Stop,
            }
        }
    }

    /// Store `config`; true if it differs from the current one.
    fn apply(&mut self, config: RelayConfig) -> bool {
        if config == self.config {
            return false;
        }
        info!(
            enabled = config.enabled,
            host = %config.host,
            "Sharing configuration changed, resetting connection"
        );
        self.config = config;
        true
    }

    async fn session(&mut self, mut socket: Box<dyn RelaySocket>) -> SessionEnd {
        let end = loop {
            tokio::select! {
                frame = socket.recv_text() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => {
                        warn!(error = %e, "Sharing connection error");
                        break SessionEnd::Lost;
                    }
                    None => {
                        info!("Sharing connection closed");
                        break SessionEnd::Lost;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send(update)) => {
                        match encode_location(&self.config.group_key, &update) {
                            Ok(text) => match timeout(SEND_TIMEOUT, socket.send_text(text)).await {
                                Ok(Ok(())) => {}
                                Ok(Err(e)) => warn!(error = %e, "Unable to send location to server"),
                                Err(_) => warn!("Sending location to server timed out"),
                            },
                            Err(e) => warn!(error = %e, "Unable to encode location"),
                        }
                    }
                    Some(Command::Configure(config)) => {
                        if self.apply(config) {
                            break SessionEnd::Interrupted(Interrupt::Reconfigured);
                        }
                    }
                    Some(Command::Stop) | None => break SessionEnd::Interrupted(Interrupt::Stop),
                },
            }
        };
        if timeout(CLOSE_TIMEOUT, socket.close()).await.is_err() {
            debug!("Closing sharing socket timed out");
        }
        self.discard_stale_sends(end)
    }

    /// Drop location updates queued for the socket that just closed, acting
    /// on any control command found among them.
    fn discard_stale_sends(&mut self, mut end: SessionEnd) -> SessionEnd {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Send(_) => trace!("Dropping location queued for closed socket"),
                Command::Configure(config) => {
                    if self.apply(config) {
                        end = SessionEnd::Interrupted(Interrupt::Reconfigured);
                    }
                }
                Command::Stop => return SessionEnd::Interrupted(Interrupt::Stop),
            }
        }
        end
    }

    fn handle_frame(&self, text: &str) {
        match decode_server_message(text) {
            Ok(Some(table)) => {
                trace!(zones = table.zones().count(), "Received location state");
                if self.inbound.send(table).is_err() {
                    debug!("Location consumer gone, dropping state");
                }
            }
            Ok(None) => trace!("Ignoring relay frame of unhandled type"),
            Err(e) => debug!(error = %e, "Dropping malformed relay frame"),
        }
    }
}
