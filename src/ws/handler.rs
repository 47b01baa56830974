//! WebSocket upgrade handlers and per-connection tasks

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::config::ServerConfig;
use crate::session::{
    CommandSender, Liveness, LivenessAction, OutgoingReceiver, Role, SessionGuard, SessionId,
    SessionLink,
};
use crate::util::rate_limit::MessageRateLimiter;
use crate::ws::protocol::{Command, ProtocolError, ServerMsg};

/// How long the writer gets to flush a fatal notice before it is aborted
const CLOSE_GRACE: Duration = Duration::from_secs(1);

const INVALID_PATH: &str = "Invalid API path - Please update your fork of the player client";

/// WebSocket upgrade handler for player clients
pub async fn player_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    connect(ws, state, Role::Player)
}

/// WebSocket upgrade handler for observer clients
pub async fn observer_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    connect(ws, state, Role::Observer)
}

/// Any other path: WebSocket clients get a fatal notice, plain HTTP a 404
pub async fn invalid_path_handler(ws: Option<WebSocketUpgrade>, uri: Uri) -> Response {
    match ws {
        Some(ws) => {
            warn!(path = %uri.path(), "Connection on an invalid API path refused");
            ws.on_upgrade(|socket| refuse(socket, INVALID_PATH.to_string()))
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Register the connection before upgrading so a full arena is refused up front
fn connect(ws: WebSocketUpgrade, state: AppState, role: Role) -> Response {
    match state.registry.admit(role) {
        Ok(guard) => ws.on_upgrade(move |socket| handle_socket(socket, guard, state)),
        Err(e) => {
            warn!(role = %role, reason = %e, "Connection refused");
            ws.on_upgrade(move |socket| refuse(socket, e.to_string()))
        }
    }
}

/// Send a single fatal notice and close
async fn refuse(socket: WebSocket, reason: String) {
    let (mut sink, _stream) = socket.split();
    let notice = ServerMsg::Fatal(reason);
    if let Some(text) = notice.to_text() {
        if sink.send(Message::Text(text)).await.is_ok() {
            let _ = sink.send(Message::Close(None)).await;
        }
    }
}

/// Why the reader stopped
#[derive(Debug)]
enum ReadOutcome {
    /// The client closed the socket or the transport failed
    Closed,
    /// A keepalive probe went unanswered
    TimedOut,
    /// The client broke the protocol; it gets a fatal notice first
    Refused(ProtocolError),
    /// The tick loop already dropped the session
    Detached,
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, guard: SessionGuard, state: AppState) {
    let (ws_sink, ws_stream) = socket.split();
    run_session(ws_stream, ws_sink, guard, &state.config.server).await;
}

/// Drive one admitted session until it closes, then release it
async fn run_session<S, E, K>(
    mut ws_stream: S,
    ws_sink: K,
    mut guard: SessionGuard,
    config: &ServerConfig,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    K: Sink<Message> + Unpin + Send + 'static,
    K::Error: Display + Send,
{
    let id = guard.id();
    let role = guard.role();
    let Some(SessionLink { commands, outgoing }) = guard.take_link() else {
        return;
    };
    info!(session_id = id, role = %role, "New WebSocket connection");

    let mut writer = tokio::spawn(write_loop(id, ws_sink, outgoing));

    let outcome = read_loop(id, role, &mut ws_stream, &commands, config).await;

    match outcome {
        ReadOutcome::Refused(reason) => {
            warn!(session_id = id, reason = %reason, "Disconnecting client after protocol error");
            commands.enqueue_outgoing(ServerMsg::Fatal(reason.to_string()));
            if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
                writer.abort();
            }
        }
        ReadOutcome::TimedOut => {
            info!(session_id = id, "Connection timed out");
            writer.abort();
        }
        ReadOutcome::Closed | ReadOutcome::Detached => writer.abort(),
    }

    // Releases the id and removes the session from the arena
    drop(guard);
    info!(session_id = id, role = %role, "WebSocket connection closed");
}

/// Reader: WebSocket -> command queue, plus keepalive bookkeeping
async fn read_loop<S, E>(
    id: SessionId,
    role: Role,
    ws_stream: &mut S,
    commands: &CommandSender,
    config: &ServerConfig,
) -> ReadOutcome
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let rate_limiter = MessageRateLimiter::new(config.commands_per_second);
    let mut liveness = Liveness::new(config.client_timeout, Instant::now());

    loop {
        let wait = match liveness.poll(Instant::now()) {
            LivenessAction::Wait(wait) => wait,
            LivenessAction::Probe => {
                debug!(session_id = id, "Sending keep-alive probe");
                commands.enqueue_outgoing(ServerMsg::Probe);
                continue;
            }
            LivenessAction::Expired => return ReadOutcome::TimedOut,
        };

        let message = match tokio::time::timeout(wait, ws_stream.next()).await {
            Err(_) => continue,
            Ok(None) => return ReadOutcome::Closed,
            Ok(Some(Err(e))) => {
                debug!(session_id = id, error = %e, "WebSocket error");
                return ReadOutcome::Closed;
            }
            Ok(Some(Ok(message))) => message,
        };
        liveness.touch(Instant::now());

        match message {
            Message::Text(text) => {
                if role == Role::Observer {
                    debug!(session_id = id, "Ignoring message from observer");
                    continue;
                }
                if !rate_limiter.check() {
                    warn!(session_id = id, "Rate limited input message");
                    commands.enqueue_outgoing(ServerMsg::Warning(
                        "Too many messages; message dropped".to_string(),
                    ));
                    continue;
                }

                match Command::parse(&text, config.info_max_len) {
                    Ok(command) => {
                        if !commands.push_incoming_command(command).await {
                            debug!(session_id = id, "Command queue closed");
                            return ReadOutcome::Detached;
                        }
                    }
                    Err(e) => return ReadOutcome::Refused(e),
                }
            }
            Message::Binary(_) if role == Role::Player => {
                return ReadOutcome::Refused(ProtocolError::NotText);
            }
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                debug!(session_id = id, "Client initiated close");
                return ReadOutcome::Closed;
            }
        }
    }
}

/// Writer: outbound queue -> WebSocket
///
/// Probes go out as pings. A fatal notice is the last frame before Close.
async fn write_loop<K>(id: SessionId, mut ws_sink: K, mut outgoing: OutgoingReceiver)
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    while let Some(msg) = outgoing.pop_outgoing().await {
        let fatal = matches!(msg, ServerMsg::Fatal(_));
        let frame = match msg.to_text() {
            Some(text) => Message::Text(text),
            None => Message::Ping(Vec::new()),
        };

        if let Err(e) = ws_sink.send(frame).await {
            debug!(session_id = id, error = %e, "WebSocket send failed");
            return;
        }
        if fatal {
            let _ = ws_sink.send(Message::Close(None)).await;
            return;
        }
    }
}
