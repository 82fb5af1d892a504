use std::{env, path::PathBuf, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("FLOW_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5000)
}

pub fn tick_interval() -> Duration {
    let millis = env::var("TICK_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .unwrap_or(200);
    Duration::from_millis(millis)
}

pub fn default_session_id() -> String {
    env::var("DEFAULT_SESSION_ID")
        .ok()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| "1337".to_string())
}

// Directory the browser client is served from.
pub fn www_root() -> PathBuf {
    env::var("WWW_ROOT")
        .ok()
        .filter(|root| !root.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("html"))
}

pub const MAILBOX_CAPACITY: usize = 64;
pub const BROADCAST_INBOX_CAPACITY: usize = 1024;
pub const OUTBOX_CAPACITY: usize = 5;
