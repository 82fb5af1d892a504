// Domain layer: core simulation types and rules.

pub mod entity;
pub mod errors;
pub mod packet;
pub mod position;
pub mod tuning;
pub mod worm;

pub use entity::{Mover, Outbound, Outbox, Terminable};
pub use errors::InputError;
pub use packet::{BulkPayload, Command, EntityId, MoveEntry, Packet, Payload};
pub use position::{Direction, Position};
pub use tuning::WormTuning;
pub use worm::Worm;
