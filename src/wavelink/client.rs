//! Websocket connection to Wave Link.
//!
//! One task owns the socket. On every open it sends the two bootstrap
//! queries, then feeds incoming frames to a [`Dispatcher`] until the socket
//! closes. Lost connections are retried with exponential backoff.

use futures_util::{Sink, SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::connect_async;

use super::dispatch::{Dispatcher, IdSource, Query, SequentialIds};
use crate::config::SyncConfig;
use crate::mixer::MixerStore;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connection in progress
    Connecting,
    /// Connected and ready
    Connected,
}

/// Requests the owner of a client can make of the live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// Re-query both channel and output configuration.
    Refresh,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid Wave Link url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme {0:?}, expected ws")]
    UnsupportedScheme(String),

    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("client is already running")]
    AlreadyRunning,
}

impl ClientError {
    /// Nothing is listening, which just means Wave Link is not running.
    pub fn is_refused(&self) -> bool {
        match self {
            ClientError::WebSocket(tungstenite::Error::Io(err)) => {
                err.kind() == std::io::ErrorKind::ConnectionRefused
            }
            _ => false,
        }
    }
}

pub struct WaveLinkClient {
    config: SyncConfig,
    store: Arc<MixerStore>,
    ids: Arc<dyn IdSource>,
    state_tx: watch::Sender<ConnectionState>,
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    /// Taken by `run` for its lifetime.
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<ClientCommand>>>,
}

impl WaveLinkClient {
    pub fn new(config: SyncConfig, store: Arc<MixerStore>) -> Self {
        let ids = Arc::new(SequentialIds::starting_at(config.first_request_id));
        Self::with_id_source(config, store, ids)
    }

    pub fn with_id_source(
        config: SyncConfig,
        store: Arc<MixerStore>,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Self {
            config,
            store,
            ids,
            state_tx,
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MixerStore> {
        &self.store
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Asks the live connection to re-query inputs and outputs. Ignored while
    /// disconnected, since the next open queries both anyway.
    pub fn refresh(&self) {
        let _ = self.command_tx.send(ClientCommand::Refresh);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            log::trace!("Wave Link connection {:?} -> {:?}", previous, state);
        }
    }

    /// Runs the connection loop until `shutdown` flips to true or its sender
    /// is dropped, or until a session ends with reconnects disabled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), ClientError> {
        self.config.validate()?;
        let mut commands = self
            .command_rx
            .lock()
            .take()
            .ok_or(ClientError::AlreadyRunning)?;

        let mut attempt = 0u32;
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            let outcome = tokio::select! {
                outcome = self.session(&mut commands, &mut attempt) => outcome,
                _ = shutdown.changed() => break,
            };
            self.set_state(ConnectionState::Disconnected);

            match outcome {
                Ok(()) => log::info!("Wave Link connection closed"),
                Err(err) if err.is_refused() => log::debug!("Wave Link is not reachable: {}", err),
                Err(err) => log::warn!("Wave Link connection failed: {}", err),
            }

            if !self.config.reconnect.enabled {
                break;
            }

            attempt += 1;
            let delay = self.config.reconnect.delay_for(attempt);
            log::debug!("reconnecting to Wave Link in {:?}", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_state(ConnectionState::Disconnected);
        *self.command_rx.lock() = Some(commands);
        Ok(())
    }

    async fn session(
        &self,
        commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
        attempt: &mut u32,
    ) -> Result<(), ClientError> {
        let timeout = self.config.connect_timeout();
        log::debug!("connecting to Wave Link at {}", self.config.url);
        let (socket, _) = tokio::time::timeout(timeout, connect_async(self.config.url.as_str()))
            .await
            .map_err(|_| ClientError::Timeout(timeout))??;

        self.set_state(ConnectionState::Connected);
        *attempt = 0;
        log::info!("connected to Wave Link at {}", self.config.url);

        // The bootstrap below covers anything queued while offline
        while commands.try_recv().is_ok() {}

        let (mut write, mut read) = socket.split();
        let mut dispatcher = Dispatcher::new(Arc::clone(&self.store), Arc::clone(&self.ids));
        for query in dispatcher.bootstrap() {
            send_query(&mut write, &query).await?;
        }

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(query) = dispatcher.handle_text(&text) {
                            send_query(&mut write, &query).await?;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        log::debug!("Wave Link sent close: {:?}", frame);
                        return Ok(());
                    }
                    // Ping/pong is answered by tungstenite; binary is unused
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                    None => return Ok(()),
                },
                command = commands.recv() => match command {
                    Some(ClientCommand::Refresh) => {
                        log::info!("refreshing Wave Link inputs and outputs");
                        for query in dispatcher.bootstrap() {
                            send_query(&mut write, &query).await?;
                        }
                    }
                    // Unreachable while `self` holds the sender
                    None => return Ok(()),
                },
            }
        }
    }
}

async fn send_query<S>(sink: &mut S, query: &Query) -> Result<(), ClientError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = query.encode()?;
    log::trace!("-> {}", text);
    sink.send(Message::Text(text)).await?;
    Ok(())
}
