//! Arena simulation modules

pub mod arena;
pub mod handlers;
pub mod physics;
pub mod snapshot;
pub mod state;

pub use arena::{ArenaHandle, GameArena};

use uuid::Uuid;

use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Opaque per-connection identity assigned by the transport
pub type ConnectionId = Uuid;

/// Validation failures raised by event handlers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    #[error("Invalid entity: missing or malformed field `{0}`")]
    InvalidEntity(&'static str),
}

/// Something a connection did, as seen by the arena
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(ClientMsg),
    Disconnect,
}

/// Inbound event tagged with the connection it came from
#[derive(Debug, Clone)]
pub struct ClientEvent {
    pub sid: ConnectionId,
    pub event: InboundEvent,
    pub received_at: u64,
}

/// Which connections an outbound message is delivered to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    AllExcept(ConnectionId),
    Only(ConnectionId),
}

impl Target {
    pub fn includes(&self, sid: ConnectionId) -> bool {
        match *self {
            Target::All => true,
            Target::AllExcept(excluded) => excluded != sid,
            Target::Only(only) => only == sid,
        }
    }
}

/// Outbound message with its delivery target
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Target,
    pub msg: ServerMsg,
}

impl Outbound {
    pub fn all(msg: ServerMsg) -> Self {
        Self {
            target: Target::All,
            msg,
        }
    }

    pub fn all_except(sid: ConnectionId, msg: ServerMsg) -> Self {
        Self {
            target: Target::AllExcept(sid),
            msg,
        }
    }

    pub fn only(sid: ConnectionId, msg: ServerMsg) -> Self {
        Self {
            target: Target::Only(sid),
            msg,
        }
    }
}
