//! Wire protocol types shared between the session server and its clients.
//!
//! Every message crosses the WebSocket as a JSON text frame. Client-to-server
//! messages are single-key envelopes (`player`, `start`, `screenData`,
//! `clearWorld`) and map onto [`ClientMessage`]; server-to-client messages
//! have distinct shapes and are serialized from the structs below. Field
//! names are camelCase on the wire to match the browser client.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub mod maze;

use maze::{Maze, MazeConfig};

/// Identity assigned to a connection for the lifetime of the process.
/// Fresh per connection; never reused, never persisted.
pub type PlayerId = Uuid;

/// A 3-component vector as reported by clients. The server never does math
/// on these, it only relays them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A pending shot event reported by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shot {
    pub origin: Vec3,
    pub direction: Vec3,
    pub color: u32,
}

/// The authoritative per-connection player record. Replaced wholesale on
/// every inbound `player` message; the server does no merging or smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub player_id: PlayerId,
    pub player_name: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Vec3,
    pub direction: Vec3,
    #[serde(default)]
    pub shots: Vec<Shot>,
}

impl Player {
    /// Builds the stored record from an inbound update, stamping the server
    /// assigned identity. An empty name falls back to the identity string.
    pub fn from_update(id: PlayerId, update: PlayerUpdate) -> Self {
        let player_name = if update.player_name.is_empty() {
            id.to_string()
        } else {
            update.player_name
        };
        Self {
            player_id: id,
            player_name,
            position: update.position,
            velocity: update.velocity,
            orientation: update.orientation,
            direction: update.direction,
            shots: update.shots,
        }
    }
}

/// Payload of a client `player` message. The identity is not trusted from
/// the wire; the server keys the update by the connection it arrived on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    #[serde(default)]
    pub player_name: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Vec3,
    pub direction: Vec3,
    #[serde(default)]
    pub shots: Vec<Shot>,
}

/// Payload of the lead's `start` message.
///
/// The browser client sends maze dimensions straight from `<input>` elements,
/// so they may arrive as strings; [`MazeConfig`] accepts both.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCommand {
    #[serde(default = "default_world")]
    pub world: String,
    #[serde(default)]
    pub maze: Option<MazeConfig>,
    #[serde(default)]
    pub screen_pos: Option<Vec3>,
    #[serde(default)]
    pub screen_dimensions: Option<Vec3>,
}

pub fn default_world() -> String {
    "maze".to_string()
}

/// Inbound application messages, tagged by their single top-level key.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Full player state report; accepted from anyone at any time.
    Player(PlayerUpdate),
    /// Session start; honored only from the lead while not running.
    Start(StartCommand),
    /// Opaque screen content curated by the lead; relayed verbatim.
    ScreenData(serde_json::Value),
    /// Clear-world signal; relayed verbatim.
    ClearWorld(serde_json::Value),
}

/// First message a client receives after the WebSocket handshake. The maze
/// and screen fields are attached only while a session is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub connected: PlayerId,
    pub world: String,
    pub is_lead: bool,
    pub interval: u64,
    pub started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maze: Option<Maze>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_pos: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_dimensions: Option<Vec3>,
}

/// Broadcast to every connection when the lead starts the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBroadcast {
    pub started: bool,
    pub world: String,
    pub maze: Maze,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_pos: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_dimensions: Option<Vec3>,
}

/// One broadcast tick: the aggregated player map keyed by identity.
#[derive(Debug, Serialize)]
pub struct StateBroadcast<'a> {
    pub state: &'a HashMap<PlayerId, Player>,
}

/// Owned mirror of [`StateBroadcast`] for receivers.
#[derive(Debug, Clone, Deserialize)]
pub struct StateMessage {
    pub state: HashMap<PlayerId, Player>,
}

/// Verbatim relay of the lead's `screenData` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenRelay {
    pub screen_data: serde_json::Value,
}

/// Verbatim relay of the lead's `clearWorld` signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearRelay {
    pub clear_world: serde_json::Value,
}

/// Accepts a JSON number or a numeric string. The stock client sends
/// `<input type=number>.value`, which is a string.
pub(crate) fn number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
