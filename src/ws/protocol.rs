//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::game::state::{ArenaState, Bullet, FireOrder, Tank, TankPatch, TankSeed};
use crate::game::ConnectionId;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the arena with the given tank
    Join {
        #[serde(default)]
        tank: Option<TankSeed>,
    },

    /// Overlay fields onto the sender's tank
    Move(TankPatch),

    /// Spawn a bullet owned by the sender
    Fire(FireOrder),
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Full arena (on join, and periodically for drift correction)
    ArenaState(ArenaState),

    /// Another tank entered the arena
    TankJoined { sid: ConnectionId, tank: Tank },

    /// Another tank changed
    TankUpdate { sid: ConnectionId, tank: Tank },

    /// A bullet was fired
    BulletAdd(Bullet),

    /// Every live bullet after a tick
    BulletsUpdate(Vec<Bullet>),

    /// A tank lost health
    TankDamaged {
        sid: ConnectionId,
        health: i32,
        #[serde(rename = "maxHealth")]
        max_health: i32,
    },

    /// A tank ran out of health and was relocated
    TankRespawned { sid: ConnectionId, tank: Tank },

    /// A bullet was destroyed at the given position
    BulletExploded { x: f64, y: f64 },

    /// A tank's connection went away
    TankLeft { sid: ConnectionId },
}

impl ServerMsg {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerMsg::ArenaState(_) => "arena_state",
            ServerMsg::TankJoined { .. } => "tank_joined",
            ServerMsg::TankUpdate { .. } => "tank_update",
            ServerMsg::BulletAdd(_) => "bullet_add",
            ServerMsg::BulletsUpdate(_) => "bullets_update",
            ServerMsg::TankDamaged { .. } => "tank_damaged",
            ServerMsg::TankRespawned { .. } => "tank_respawned",
            ServerMsg::BulletExploded { .. } => "bullet_exploded",
            ServerMsg::TankLeft { .. } => "tank_left",
        }
    }
}
