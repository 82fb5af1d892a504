// Capabilities the playfield loop relies on when driving a participant.
//
// Only `Mover` is mandatory. The optional capabilities are discovered through
// the `as_*` queries so new entity kinds can opt in piecemeal.

use super::packet::Packet;
use super::position::{Direction, Position};
use tokio::sync::mpsc;

/// Send side of a participant's outbound packet queue.
pub type Outbox = mpsc::Sender<Packet>;

pub trait Mover: Send + Sync + 'static {
    /// Current facing. Entities pick one themselves when none has been set.
    fn direction(&self) -> Direction;

    /// Faces `direction` and advances one step.
    fn step(&self, direction: Direction);

    /// Full body chain, head first.
    fn positions(&self) -> Vec<Position>;

    fn as_outbound(&self) -> Option<&dyn Outbound> {
        None
    }

    fn as_terminable(&self) -> Option<&dyn Terminable> {
        None
    }
}

/// Entities that want to receive broadcasts.
pub trait Outbound {
    /// The queue broadcasts go to, or `None` once it has been closed.
    fn outbox(&self) -> Option<Outbox>;
}

/// Entities that are soft-deleted before being removed from a playfield.
pub trait Terminable {
    /// Closes the entity's outbox. Calling it again is a no-op.
    fn kill(&self);

    fn killed(&self) -> bool;
}
