// Lobby: creates and hands out one playfield per session id.

use super::playfield::{Playfield, PlayfieldSettings};
use super::ticker::IntervalTicker;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Shared configuration for spawning session playfields.
#[derive(Debug, Clone)]
pub struct LobbySettings {
    /// Fixed tick interval for every playfield.
    pub tick_interval: Duration,
    /// Channel capacities handed to each playfield.
    pub playfield: PlayfieldSettings,
}

/// Thread-safe registry of running playfields keyed by session id.
pub struct Lobby {
    /// Settings applied to newly created playfields.
    settings: LobbySettings,
    /// Map of session id to its playfield handle.
    playfields: RwLock<HashMap<String, Playfield>>,
}

impl Lobby {
    pub fn new(settings: LobbySettings) -> Self {
        Self {
            settings,
            playfields: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the playfield for `session_id`, starting one on first reference.
    pub async fn playfield(&self, session_id: &str) -> Playfield {
        if let Some(playfield) = self.playfields.read().await.get(session_id) {
            return playfield.clone();
        }

        let mut playfields = self.playfields.write().await;
        // Another connection may have created it while we waited for the write lock.
        if let Some(playfield) = playfields.get(session_id) {
            return playfield.clone();
        }

        let playfield = Playfield::start(
            IntervalTicker::new(self.settings.tick_interval),
            self.settings.playfield,
        );
        playfields.insert(session_id.to_string(), playfield.clone());
        info!(session_id, "new playfield");
        playfield
    }

    pub async fn session_count(&self) -> usize {
        self.playfields.read().await.len()
    }
}
