use crate::domain::WormTuning;
use crate::use_cases::Lobby;
use std::{path::PathBuf, sync::Arc};

// Shared state for the HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    // Session playfields, created on first reference.
    pub lobby: Arc<Lobby>,
    // Session joined when a client does not name one.
    pub default_session_id: Arc<str>,
    // Tuning applied to every worm a connection creates.
    pub worm_tuning: WormTuning,
    // Packets buffered per connection before broadcasts to it are dropped.
    pub outbox_capacity: usize,
    // Static files served for any path no route claims.
    pub www_root: PathBuf,
}
