// Use cases layer: the session simulation and its fan-out.

pub mod broadcast;
pub mod lobby;
pub mod playfield;
pub mod ticker;

pub use broadcast::Broadcast;
pub use lobby::{Lobby, LobbySettings};
pub use playfield::{Playfield, PlayfieldError, PlayfieldSettings, RunningStatus};
pub use ticker::{IntervalTicker, ManualTicker, TickSource, TickTrigger, TickerStopped};
