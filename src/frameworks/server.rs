// Framework bootstrap for the flow server runtime.

use crate::domain::WormTuning;
use crate::frameworks::config;
use crate::interface_adapters::routes;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{Lobby, LobbySettings, PlayfieldSettings};

use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let app = routes::app(build_state());

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([0, 0, 0, 0], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> Arc<AppState> {
    let tick_interval = config::tick_interval();
    let default_session_id = config::default_session_id();
    let www_root = config::www_root();
    tracing::debug!(
        tick_interval_ms = tick_interval.as_millis(),
        %default_session_id,
        www_root = %www_root.display(),
        "lobby configured"
    );

    // The lobby owns every session playfield for the lifetime of the server.
    let lobby = Arc::new(Lobby::new(LobbySettings {
        tick_interval,
        playfield: PlayfieldSettings {
            mailbox_capacity: config::MAILBOX_CAPACITY,
            broadcast_capacity: config::BROADCAST_INBOX_CAPACITY,
        },
    }));

    Arc::new(AppState {
        lobby,
        default_session_id: Arc::from(default_session_id.as_str()),
        worm_tuning: WormTuning::default(),
        outbox_capacity: config::OUTBOX_CAPACITY,
        www_root,
    })
}
