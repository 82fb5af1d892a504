// Packets exchanged between the simulation and connected participants.

use super::position::Position;
use std::fmt;
use std::sync::Arc;

/// Session-local entity identity, assigned on join and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Move,
    Hello,
    Bulk,
    // Anything a client sent that we do not recognize.
    Unknown(String),
}

impl Command {
    pub fn as_str(&self) -> &str {
        match self {
            Command::Move => "MOVE",
            Command::Hello => "HELLO",
            Command::Bulk => "BULK",
            Command::Unknown(name) => name,
        }
    }
}

impl From<&str> for Command {
    fn from(name: &str) -> Self {
        match name {
            "MOVE" => Command::Move,
            "HELLO" => Command::Hello,
            "BULK" => Command::Bulk,
            other => Command::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Token(String),
    // Shared so one tick's batch fans out without copying the body chains.
    Bulk(Arc<BulkPayload>),
    // A payload shape no command accepts; keeps the raw text for logging.
    Opaque(String),
}

/// One entity's body chain as of the tick that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveEntry {
    pub id: EntityId,
    pub positions: Vec<Position>,
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BulkPayload {
    pub moves: Vec<MoveEntry>,
    pub kills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub command: Command,
    pub payload: Payload,
}

impl Packet {
    pub fn hello() -> Self {
        Self {
            command: Command::Hello,
            payload: Payload::Empty,
        }
    }

    pub fn movement(direction: &str) -> Self {
        Self {
            command: Command::Move,
            payload: Payload::Token(direction.to_string()),
        }
    }

    pub fn bulk(payload: BulkPayload) -> Self {
        Self {
            command: Command::Bulk,
            payload: Payload::Bulk(Arc::new(payload)),
        }
    }

    /// The batch carried by a `BULK` packet, if this is one.
    pub fn as_bulk(&self) -> Option<&BulkPayload> {
        match (&self.command, &self.payload) {
            (Command::Bulk, Payload::Bulk(bulk)) => Some(bulk),
            _ => None,
        }
    }
}
