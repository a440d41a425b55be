//! Server network layer handling TCP sessions and game loop coordination

use crate::broadcast;
use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::game::{GameState, Phase, START_X, START_Y};
use crate::map::GameMap;
use crate::utils::hex_dump;
use bytes::Bytes;
use log::{debug, error, info, log_enabled, warn, Level};
use shared::{read_frame, write_frame, CodecError, EndReason, Frame, FrameError, Message};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// How long shutdown waits for each writer to flush its queue.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
/// Tick statistics are logged this often.
const STATS_INTERVAL: u32 = 20;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    FrameReceived {
        client_id: u8,
        connection: u64,
        frame: Frame,
    },
    ConnectionClosed {
        client_id: u8,
        connection: u64,
        error: FrameError,
    },
}

/// Main server coordinating networking and game simulation
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    clients: ClientManager,
    game_state: GameState,
    next_connection: u64,
    /// Frozen snapshots still to send once the round has ended
    linger_remaining: u32,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: ServerConfig, map: GameMap) -> io::Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        info!(
            "Server listening on {} (waiting for {} players)",
            listener.local_addr()?,
            config.max_clients
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            clients: ClientManager::new(config.max_clients),
            game_state: GameState::new(map),
            next_connection: 0,
            linger_remaining: config.linger_ticks,
            config,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Main server loop. Returns once the round has ended and every client
    /// has been sent its final frames, or with an error if accepting fails.
    pub async fn run(&mut self) -> io::Result<()> {
        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.handle_accept(stream, addr),
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            self.shutdown().await;
                            return Err(e);
                        }
                    }
                },

                Some(message) = self.server_rx.recv() => {
                    self.handle_message(message);
                },

                _ = tick_interval.tick() => {
                    if self.on_tick() {
                        break;
                    }
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }

    fn handle_accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        if self.game_state.phase() != Phase::Waiting {
            info!("Refusing connection from {}: round already started", addr);
            return;
        }
        if self.clients.is_full() {
            info!("Refusing connection from {}: server full", addr);
            return;
        }
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let connection = self.next_connection;
        self.next_connection += 1;

        let capacity = self.config.outbound_capacity(self.game_state.map().cols());
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let Some(client_id) = self.clients.add_client(addr, connection, outbound_tx) else {
            info!("Refusing connection from {}: no free slot", addr);
            return;
        };

        let (read_half, write_half) = stream.into_split();
        let reader = tokio::spawn(read_loop(
            client_id,
            connection,
            read_half,
            self.server_tx.clone(),
        ));
        let writer = tokio::spawn(write_loop(
            client_id,
            connection,
            write_half,
            outbound_rx,
            self.server_tx.clone(),
        ));
        self.clients.attach_tasks(client_id, reader, writer);
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::FrameReceived {
                client_id,
                connection,
                frame,
            } => {
                if self.is_current(client_id, connection) {
                    self.handle_frame(client_id, frame);
                }
            }
            ServerMessage::ConnectionClosed {
                client_id,
                connection,
                error,
            } => {
                if !self.is_current(client_id, connection) {
                    return;
                }
                match error {
                    FrameError::Closed => self.disconnect(client_id, "connection closed"),
                    other => {
                        warn!("Connection error for client {}: {}", client_id, other);
                        self.disconnect(client_id, "connection error");
                    }
                }
            }
        }
    }

    /// False for events of a connection whose slot has since been freed.
    fn is_current(&self, client_id: u8, connection: u64) -> bool {
        let current = self.clients.connection_of(client_id) == Some(connection);
        if !current {
            debug!(
                "Dropping event from stale connection {} (slot {})",
                connection, client_id
            );
        }
        current
    }

    fn handle_frame(&mut self, client_id: u8, frame: Frame) {
        if log_enabled!(Level::Debug) {
            let kind = frame
                .kind()
                .map(|kind| kind.name().to_string())
                .unwrap_or_else(|_| format!("type {:#04x}", frame.message_type()));
            debug!(
                "<- client {}: {} ({} bytes) {}",
                client_id,
                kind,
                frame.len(),
                hex_dump(frame.payload())
            );
        }

        let message = match Message::from_frame(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed message from client {}: {}", client_id, e);
                return;
            }
        };

        match message {
            Message::Connect => self.handle_connect(client_id),
            Message::Input { player_id, flags } => self.handle_input(client_id, player_id, flags),
            Message::Disconnect => self.disconnect(client_id, "client requested disconnect"),
            Message::DebugInfo { text } => info!("Client {} debug: {}", client_id, text),
            other => warn!(
                "Ignoring unexpected {} from client {}",
                other.message_type(),
                client_id
            ),
        }
    }

    fn handle_connect(&mut self, client_id: u8) {
        let Some(client) = self.clients.get_mut(client_id) else {
            return;
        };
        if client.welcomed {
            warn!("Client {} sent CONNECT twice, ignoring", client_id);
            return;
        }
        client.welcomed = true;
        let addr = client.addr;

        match broadcast::welcome(client_id) {
            Ok(frame) => {
                if !self.clients.send(client_id, frame) {
                    self.disconnect(client_id, "outbound queue unavailable");
                    return;
                }
            }
            Err(e) => {
                error!("Failed to encode welcome for client {}: {}", client_id, e);
                return;
            }
        }
        info!(
            "Welcomed client {} from {} ({}/{})",
            client_id,
            addr,
            self.clients.len(),
            self.clients.capacity()
        );

        if self.clients.is_full() && self.clients.all_welcomed() {
            self.launch_round();
        }
    }

    fn handle_input(&mut self, client_id: u8, player_id: u8, flags: u8) {
        if self.game_state.phase() != Phase::Running {
            debug!("Ignoring input from client {} outside of a round", client_id);
            return;
        }
        if player_id != client_id {
            warn!(
                "Client {} sent input for player {}, ignoring",
                client_id, player_id
            );
            return;
        }
        let Some(input) = self.config.input_scheme.decode(flags) else {
            warn!(
                "Client {} sent undefined input flags {:#04x}",
                client_id, flags
            );
            return;
        };
        if let Some(client) = self.clients.get_mut(client_id) {
            if client.player.alive {
                client.player.input = input;
            }
        }
    }

    /// Sends the map and `GAME_START` to everyone and starts simulating.
    fn launch_round(&mut self) {
        let count = self.game_state.start(self.clients.players_mut());
        let frames = broadcast::map_chunks(self.game_state.map()).and_then(|mut frames| {
            frames.push(broadcast::game_start(count, START_X, START_Y)?);
            Ok(frames)
        });

        match frames {
            Ok(frames) => {
                for frame in &frames {
                    self.broadcast(frame);
                }
            }
            Err(e) => {
                error!("Failed to encode round start: {}", e);
                self.game_state.abort(EndReason::Disconnect);
            }
        }
    }

    /// Runs one tick. Returns true when the server should stop.
    fn on_tick(&mut self) -> bool {
        match self.game_state.phase() {
            Phase::Waiting => false,
            Phase::Running => {
                self.simulate();
                false
            }
            Phase::Ended => self.linger(),
        }
    }

    fn simulate(&mut self) {
        if self.clients.is_empty() {
            self.game_state.abort(EndReason::Disconnect);
            return;
        }

        let report = self.game_state.step(self.clients.players_mut());
        for event in &report.events {
            info!("Tick {}: {}", self.game_state.tick, event);
            if self.config.debug {
                self.broadcast_encoded(broadcast::debug_info(&event.to_string()));
            }
        }

        self.broadcast_encoded(broadcast::snapshot(self.game_state.tick, &self.clients));
        if let Some(outcome) = report.outcome {
            self.broadcast_encoded(broadcast::game_end(outcome));
            self.linger_remaining = self.config.linger_ticks;
        }

        if self.game_state.tick % STATS_INTERVAL == 0 {
            debug!(
                "Tick {}: {} clients, {} alive, {} coins left",
                self.game_state.tick,
                self.clients.len(),
                self.clients.alive_count(),
                self.game_state.map().coin_count()
            );
        }
        self.game_state.advance_tick();
    }

    /// Keeps sending the final snapshot so it reaches every client.
    fn linger(&mut self) -> bool {
        if self.linger_remaining == 0 || self.clients.is_empty() {
            return true;
        }
        // Not running, so this only clears per-tick flags
        self.game_state.step(self.clients.players_mut());
        self.broadcast_encoded(broadcast::snapshot(self.game_state.tick, &self.clients));
        self.game_state.advance_tick();
        self.linger_remaining -= 1;
        false
    }

    fn broadcast_encoded(&mut self, frame: Result<Bytes, CodecError>) {
        match frame {
            Ok(frame) => self.broadcast(&frame),
            Err(e) => error!("Failed to encode broadcast: {}", e),
        }
    }

    fn broadcast(&mut self, frame: &Bytes) {
        for client_id in self.clients.broadcast(frame) {
            self.disconnect(client_id, "client not keeping up");
        }
    }

    fn disconnect(&mut self, client_id: u8, reason: &str) {
        if let Some(client) = self.clients.remove_client(client_id) {
            info!(
                "Client {} ({}) disconnected: {}",
                client_id, client.addr, reason
            );
            self.game_state.player_left(client_id);
        }
    }

    /// Closes every connection after its queued frames are written.
    async fn shutdown(&mut self) {
        let writers: Vec<_> = self
            .clients
            .drain()
            .into_iter()
            .filter_map(|mut client| client.take_writer())
            .collect();

        for writer in writers {
            if timeout(SHUTDOWN_GRACE, writer).await.is_err() {
                warn!("Client writer did not finish in time");
            }
        }
        info!("Server shut down");
    }
}

/// Decodes frames from one connection until it fails.
async fn read_loop(
    client_id: u8,
    connection: u64,
    mut reader: OwnedReadHalf,
    events: mpsc::UnboundedSender<ServerMessage>,
) {
    loop {
        match read_frame(&mut reader).await {
            Ok(frame) => {
                let message = ServerMessage::FrameReceived {
                    client_id,
                    connection,
                    frame,
                };
                if events.send(message).is_err() {
                    break;
                }
            }
            Err(error) => {
                let _ = events.send(ServerMessage::ConnectionClosed {
                    client_id,
                    connection,
                    error,
                });
                break;
            }
        }
    }
}

/// Writes queued frames in order. Closes the write side once the queue does.
async fn write_loop(
    client_id: u8,
    connection: u64,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Bytes>,
    events: mpsc::UnboundedSender<ServerMessage>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            let _ = events.send(ServerMessage::ConnectionClosed {
                client_id,
                connection,
                error: FrameError::Io(e),
            });
            return;
        }
    }
    let _ = writer.shutdown().await;
}
