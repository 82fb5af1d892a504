// WebSocket transport: one worm per connection, pumped in both directions.

use crate::domain::{InputError, Packet, Worm};
use crate::interface_adapters::protocol::{decode_packet, encode_packet};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::conn_id;

use axum::{
    Error,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Transport failures end the connection; the owning worm is parted either way.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

impl From<serde_json::Error> for NetError {
    fn from(e: serde_json::Error) -> Self {
        NetError::Serialization(e)
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct SessionQuery {
    // The session the client wants to play in.
    #[serde(default)]
    session: Option<String>,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_FRAMES: u32 = 10;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> impl IntoResponse {
    let session_id = query
        .session
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.default_session_id.to_string());

    ws.on_upgrade(move |socket| {
        // Separate connection id for correlating logs before an entity id exists.
        let span = info_span!(
            "conn",
            conn_id = conn_id(),
            entity_id = tracing::field::Empty
        );
        handle_socket(socket, state, session_id).instrument(span)
    })
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, session_id: String) {
    let (worm, mut outbox_rx) = Worm::new(&state.worm_tuning, state.outbox_capacity);
    let worm = Arc::new(worm);

    let playfield = state.lobby.playfield(&session_id).await;
    let entity_id = match playfield.join(worm.clone()).await {
        Ok(id) => id,
        Err(e) => {
            error!(%session_id, error = %e, "failed to join playfield");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::ERROR,
                    reason: "session unavailable".into(),
                })))
                .await;
            let _ = socket.close().await;
            return;
        }
    };

    Span::current().record("entity_id", entity_id.0);
    info!(%session_id, "client connected");

    let mut ctx = ConnCtx::new(worm.clone());
    if let Err(e) = run_client_loop(&mut socket, &mut outbox_rx, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }

    // Transport is gone in one direction or the other; the worm leaves the session.
    if let Err(e) = playfield.part(worm).await {
        warn!(error = %e, "failed to part worm");
    }

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_frames = ctx.invalid_frames,
        "connection stats"
    );
    info!("client disconnected");
}

struct ConnCtx {
    worm: Arc<Worm>,

    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,

    // Consecutive frames that could not be decoded.
    invalid_frames: u32,
    last_invalid_log: Instant,

    close_frame: Option<CloseFrame>,
}

impl ConnCtx {
    fn new(worm: Arc<Worm>) -> Self {
        Self {
            worm,
            msgs_in: 0,
            msgs_out: 0,
            bytes_in: 0,
            bytes_out: 0,
            invalid_frames: 0,
            last_invalid_log: Instant::now() - LOG_THROTTLE,
            close_frame: None,
        }
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(
    socket: &mut WebSocket,
    outbox_rx: &mut mpsc::Receiver<Packet>,
    ctx: &mut ConnCtx,
) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        let control = tokio::select! {
            // Incoming packet from the client.
            incoming = socket.recv() => match handle_incoming_ws(incoming, ctx) {
                Ok(control) => control,
                Err(e) => {
                    fatal = Some(e);
                    LoopControl::Disconnect
                }
            },

            // Outgoing packet from the playfield.
            outgoing = outbox_rx.recv() => match outgoing {
                Some(packet) => match forward_packet(&packet, socket, ctx).await {
                    Ok(control) => control,
                    Err(e) => {
                        fatal = Some(e);
                        LoopControl::Disconnect
                    }
                },
                None => {
                    // The worm was killed and the playfield released its outbox.
                    info!("outbox closed; disconnecting");
                    LoopControl::Disconnect
                }
            },
        };

        if let LoopControl::Disconnect = control {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match decode_packet(text.as_str()) {
                    Ok(packet) => {
                        ctx.invalid_frames = 0;
                        if let Err(e) = ctx.worm.communicate(&packet) {
                            log_input_error(&e, ctx);
                        }
                        Ok(LoopControl::Continue)
                    }
                    Err(parse_err) => {
                        ctx.invalid_frames += 1;
                        if should_log(&mut ctx.last_invalid_log) {
                            warn!(
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client packet"
                            );
                        }

                        if ctx.invalid_frames > MAX_INVALID_FRAMES {
                            ctx.close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }
                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Err(NetError::Ws(e))
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

fn log_input_error(error: &InputError, ctx: &mut ConnCtx) {
    if should_log(&mut ctx.last_invalid_log) {
        warn!(%error, "input rejected");
    }
}

async fn forward_packet(
    packet: &Packet,
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    let txt = encode_outgoing(packet)?;

    let bytes = txt.len();
    socket.send(Message::Text(txt.into())).await.inspect_err(|e| {
        warn!(error = %e, "failed to send packet");
    })?;
    ctx.msgs_out += 1;
    ctx.bytes_out += bytes as u64;
    Ok(LoopControl::Continue)
}

fn encode_outgoing(packet: &Packet) -> Result<String, NetError> {
    encode_packet(packet).map_err(|e| {
        error!(error = ?e, command = %packet.command, "failed to serialize packet");
        NetError::from(e)
    })
}
