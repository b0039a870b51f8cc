//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::CombatantId;
use crate::room::{JoinError, LeaveReason, RoomHandle};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

type WsSink = SplitSink<WebSocket, Message>;

/// Attempts at finding a room before giving up on a join
const JOIN_ATTEMPTS: usize = 2;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// A connection that has been admitted to a room
struct Session {
    room: RoomHandle,
    combatant_id: CombatantId,
    outbox: mpsc::Receiver<ServerMsg>,
}

enum Flow {
    Continue,
    Close,
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "New WebSocket connection");

    let (mut sink, mut stream) = socket.split();
    let limiter = ConnectionRateLimiter::new(state.game.tick.tick_rate);
    let mut session: Option<Session> = None;

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                        break;
                    }
                    None => break,
                };

                match message {
                    Message::Text(text) => {
                        if !limiter.check_message() {
                            debug!(connection_id = %connection_id, "Rate limited client message");
                            continue;
                        }
                        match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(msg) => {
                                let flow = handle_client_msg(msg, &state, &limiter, &mut session, &mut sink, connection_id).await;
                                if let Flow::Close = flow {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(connection_id = %connection_id, error = %e, "Failed to parse client message");
                            }
                        }
                    }
                    Message::Binary(_) => {
                        debug!(connection_id = %connection_id, "Received binary message, ignoring");
                    }
                    Message::Close(_) => {
                        info!(connection_id = %connection_id, "Client initiated close");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }

            outgoing = next_outgoing(&mut session) => {
                match outgoing {
                    Some(msg) => {
                        if let Err(e) = send_msg(&mut sink, &msg).await {
                            debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                            break;
                        }
                    }
                    None => {
                        // The room dropped our outbox: kicked or room closed
                        debug!(connection_id = %connection_id, "Room ended the session");
                        session = None;
                        break;
                    }
                }
            }
        }
    }

    if let Some(session) = session.take() {
        session.room.leave(session.combatant_id, LeaveReason::Disconnected).await;
    }
    let _ = sink.close().await;
    info!(connection_id = %connection_id, "WebSocket connection closed");
}

async fn handle_client_msg(
    msg: ClientMsg,
    state: &AppState,
    limiter: &ConnectionRateLimiter,
    session: &mut Option<Session>,
    sink: &mut WsSink,
    connection_id: Uuid,
) -> Flow {
    match msg {
        ClientMsg::Join { name, client_id } => {
            if session.is_some() {
                warn!(connection_id = %connection_id, "Join while already in a room");
                return reply(sink, error_msg("already_joined", "Leave the current room first")).await;
            }
            if !limiter.check_join() {
                return reply(sink, error_msg("rate_limited", "Too many join attempts")).await;
            }

            match join_any_room(state, name, client_id).await {
                Ok(joined) => {
                    info!(
                        connection_id = %connection_id,
                        room_id = %joined.room.id,
                        combatant_id = %joined.combatant_id,
                        "Connection joined room"
                    );
                    *session = Some(joined);
                    Flow::Continue
                }
                Err(e) => {
                    reply(
                        sink,
                        ServerMsg::Rejected {
                            reason: e.to_string(),
                        },
                    )
                    .await
                }
            }
        }

        ClientMsg::Input { .. } => {
            let (Some(active), Some(command)) = (session.as_ref(), msg.to_command()) else {
                debug!(connection_id = %connection_id, "Input before join, ignoring");
                return Flow::Continue;
            };
            if !active.room.send_input(active.combatant_id, command) {
                debug!(connection_id = %connection_id, "Room request queue full, input dropped");
            }
            Flow::Continue
        }

        ClientMsg::Ping { t } => {
            reply(
                sink,
                ServerMsg::Pong {
                    t,
                    server_time: unix_millis(),
                },
            )
            .await
        }

        ClientMsg::Leave => {
            if let Some(active) = session.take() {
                active.room.leave(active.combatant_id, LeaveReason::Left).await;
            }
            Flow::Continue
        }
    }
}

/// Join the best available room, retrying once if it closed under us
async fn join_any_room(
    state: &AppState,
    name: String,
    client_id: Option<String>,
) -> Result<Session, JoinError> {
    let mut last_error = JoinError::RoomClosed;
    for _ in 0..JOIN_ATTEMPTS {
        let room = state.rooms.find_or_create();
        let (tx, rx) = mpsc::channel(state.game.room.outbox_capacity.max(1));
        match room.join(name.clone(), client_id.clone(), tx).await {
            Ok(accepted) => {
                return Ok(Session {
                    room,
                    combatant_id: accepted.combatant_id,
                    outbox: rx,
                })
            }
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

/// Next message from the room, or never when not in one
async fn next_outgoing(session: &mut Option<Session>) -> Option<ServerMsg> {
    match session {
        Some(active) => active.outbox.recv().await,
        None => std::future::pending().await,
    }
}

async fn reply(sink: &mut WsSink, msg: ServerMsg) -> Flow {
    match send_msg(sink, &msg).await {
        Ok(()) => Flow::Continue,
        Err(e) => {
            error!(error = %e, "Failed to reply to client");
            Flow::Close
        }
    }
}

fn error_msg(code: &str, message: &str) -> ServerMsg {
    ServerMsg::Error {
        code: code.to_string(),
        message: message.to_string(),
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
