//! Session coordination: command handling and the state broadcast loop.
//!
//! All session-mutating work funnels through one task that owns the
//! [`ConnectionRegistry`], the player map and the session flags. Network
//! tasks never touch this state directly; they send [`SessionCommand`]s over
//! a channel and the session loop applies them one at a time, so a
//! disconnect can never race a broadcast tick.

use crate::registry::ConnectionRegistry;
use log::{debug, error, info};
use shared::maze::{Maze, RngMazeRand};
use shared::{
    default_world, ClearRelay, Handshake, Player, PlayerId, PlayerUpdate, ScreenRelay,
    StartBroadcast, StartCommand, StateBroadcast, Vec3,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::tungstenite::Message;

/// Commands applied by the session task, one at a time.
#[derive(Debug)]
pub enum SessionCommand {
    /// A WebSocket finished its handshake; register it and reply with the
    /// assigned identity.
    Connect {
        outbound: mpsc::UnboundedSender<Message>,
        ack: oneshot::Sender<PlayerId>,
    },
    /// The connection closed or errored. Idempotent.
    Disconnect { id: PlayerId },
    /// Inbound `player` report; replaces the stored record wholesale.
    PlayerUpdate { id: PlayerId, update: PlayerUpdate },
    /// Inbound `start` command; honored only from the lead while idle.
    Start { id: PlayerId, command: StartCommand },
    /// Inbound `screenData` payload to relay verbatim. Lead only.
    ScreenData { id: PlayerId, data: serde_json::Value },
    /// Inbound `clearWorld` signal to relay verbatim. Lead only.
    ClearWorld { id: PlayerId, data: serde_json::Value },
}

/// The singleton session: connection roster, player state store, and the
/// running flag plus world/maze/screen selection.
pub struct Session {
    clients: ConnectionRegistry,
    players: HashMap<PlayerId, Player>,
    running: bool,
    interval: Duration,
    world: String,
    lead: Option<PlayerId>,
    maze: Maze,
    screen_pos: Option<Vec3>,
    screen_dimensions: Option<Vec3>,
    /// Deadline of the next broadcast tick; None while the loop is idle.
    next_tick: Option<Instant>,
}

impl Session {
    pub fn new(interval: Duration) -> Self {
        Self {
            clients: ConnectionRegistry::new(),
            players: HashMap::new(),
            running: false,
            interval,
            world: default_world(),
            lead: None,
            maze: Maze::placeholder(),
            screen_pos: None,
            screen_dimensions: None,
            next_tick: None,
        }
    }

    /// Runs the session until the command channel closes. While the
    /// broadcast loop is armed, commands and tick deadlines are raced in a
    /// single select, keeping every mutation on this task.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        loop {
            match self.next_tick {
                Some(deadline) => tokio::select! {
                    command = commands.recv() => match command {
                        Some(command) => self.handle(command),
                        None => break,
                    },
                    _ = sleep_until(deadline) => self.tick(),
                },
                None => match commands.recv().await {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }
        info!("session loop terminated");
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { outbound, ack } => self.handle_connect(outbound, ack),
            SessionCommand::Disconnect { id } => self.handle_disconnect(id),
            SessionCommand::PlayerUpdate { id, update } => self.handle_player_update(id, update),
            SessionCommand::Start { id, command } => self.handle_start(id, command),
            SessionCommand::ScreenData { id, data } => self.handle_screen_data(id, data),
            SessionCommand::ClearWorld { id, data } => self.handle_clear_world(id, data),
        }
    }

    /// Registers the connection, elects it lead if the roster was empty,
    /// and sends the handshake. Maze and screen placement ride along only
    /// while a session is running.
    fn handle_connect(
        &mut self,
        outbound: mpsc::UnboundedSender<Message>,
        ack: oneshot::Sender<PlayerId>,
    ) {
        let (id, is_lead) = self.clients.add(outbound);
        if is_lead {
            self.lead = Some(id);
        }

        let handshake = Handshake {
            connected: id,
            world: self.world.clone(),
            is_lead,
            interval: self.interval.as_millis() as u64,
            started: self.running,
            maze: self.running.then(|| self.maze.clone()),
            screen_pos: if self.running { self.screen_pos } else { None },
            screen_dimensions: if self.running {
                self.screen_dimensions
            } else {
                None
            },
        };
        match serde_json::to_string(&handshake) {
            Ok(json) => {
                self.clients.send(&id, Message::Text(json));
            }
            Err(e) => error!("could not serialize handshake for {}: {}", id, e),
        }

        // The network task only needs the identity for routing and logging.
        let _ = ack.send(id);
    }

    /// Tears the connection down. When the roster empties this is the one
    /// place the running flag is cleared; maze and world selection persist
    /// so a reconnect before the next start still sees them.
    fn handle_disconnect(&mut self, id: PlayerId) {
        self.clients.remove(&id);
        self.players.remove(&id);
        if self.clients.is_empty() && self.running {
            info!("last client left, session stopped");
            self.running = false;
        }
    }

    /// Last write wins: the stored record is replaced field for field with
    /// the reported state. No validation, no smoothing.
    fn handle_player_update(&mut self, id: PlayerId, update: PlayerUpdate) {
        if !self.clients.contains(&id) {
            debug!("dropping player update from unknown identity {}", id);
            return;
        }
        self.players.insert(id, Player::from_update(id, update));
    }

    fn handle_start(&mut self, id: PlayerId, command: StartCommand) {
        if self.lead != Some(id) {
            debug!("ignoring start from non-lead {}", id);
            return;
        }
        if self.running {
            debug!("ignoring start while session is running");
            return;
        }

        self.world = command.world;
        if let Some(config) = &command.maze {
            self.maze = Maze::generate(config, &mut RngMazeRand(rand::thread_rng()));
        }
        self.screen_pos = command.screen_pos;
        self.screen_dimensions = command.screen_dimensions;
        self.running = true;
        info!(
            "session started: world '{}', {} connected",
            self.world,
            self.clients.len()
        );

        let message = StartBroadcast {
            started: true,
            world: self.world.clone(),
            maze: self.maze.clone(),
            screen_pos: self.screen_pos,
            screen_dimensions: self.screen_dimensions,
        };
        if let Ok(json) = serde_json::to_string(&message) {
            self.clients.broadcast(&json);
        }

        self.next_tick = Some(Instant::now() + self.interval);
    }

    /// Relays the lead's screen content to every connection, the lead
    /// included. The payload is opaque to the server.
    fn handle_screen_data(&mut self, id: PlayerId, data: serde_json::Value) {
        if self.lead != Some(id) {
            debug!("ignoring screen data from non-lead {}", id);
            return;
        }
        if let Ok(json) = serde_json::to_string(&ScreenRelay { screen_data: data }) {
            self.clients.broadcast(&json);
        }
    }

    /// Relays the clear signal verbatim. Session state is untouched; the
    /// next start command drives any actual world change.
    fn handle_clear_world(&mut self, id: PlayerId, data: serde_json::Value) {
        if self.lead != Some(id) {
            debug!("ignoring clear world from non-lead {}", id);
            return;
        }
        if let Ok(json) = serde_json::to_string(&ClearRelay { clear_world: data }) {
            self.clients.broadcast(&json);
        }
    }

    /// One broadcast tick. The deadline is rebased to `now + interval`
    /// before serializing, so a slow tick delays but never drifts the
    /// schedule; a deadline already in the past fires immediately.
    fn tick(&mut self) {
        if !self.running {
            debug!("broadcast loop going idle");
            self.next_tick = None;
            return;
        }

        self.next_tick = Some(Instant::now() + self.interval);

        match serde_json::to_string(&StateBroadcast {
            state: &self.players,
        }) {
            Ok(json) => {
                self.clients.broadcast(&json);
            }
            Err(e) => error!("could not serialize state message: {}", e),
        }
    }
}
