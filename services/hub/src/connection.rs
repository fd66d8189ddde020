// Connection (C3): owns one client's WebSocket. A single task multiplexes
// inbound frames, the participant's outbox, and a keepalive ping, mirroring
// the forwarder socket loop this hub descends from. `session.leave` is
// called exactly once, from the point where the loop breaks.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use tracing::{info, warn};

use lt_protocol::{decode_frame, Command, Envelope, ParticipantId};

use crate::error::SessionError;
use crate::session::Session;
use std::sync::Arc;

const READ_TIMEOUT: Duration = Duration::from_secs(90);
const PING_INTERVAL: Duration = Duration::from_secs(54);
const MAX_FRAME_BYTES: usize = 4096;

pub async fn handle_connection(
    mut socket: WebSocket,
    session: Arc<Session>,
    name: String,
    is_host: bool,
) {
    let (participant_id, mut outbox_rx) = session.join(name, is_host).await;
    info!(session_id = %session.id, participant_id = %participant_id, "connection established");

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await;

    loop {
        tokio::select! {
            frame = tokio::time::timeout(READ_TIMEOUT, socket.recv()) => {
                match frame {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        if text.len() > MAX_FRAME_BYTES {
                            session.report_protocol_error(
                                participant_id,
                                SessionError::FrameTooLarge.code(),
                                SessionError::FrameTooLarge.to_string(),
                            ).await;
                            continue;
                        }
                        handle_frame(&session, participant_id, &text).await;
                    }
                    Ok(Some(Ok(Message::Ping(data)))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(Ok(Message::Pong(_)))) => {}
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                        info!(session_id = %session.id, participant_id = %participant_id, "client closed connection");
                        break;
                    }
                    Ok(Some(Ok(Message::Binary(_)))) => {
                        session.report_protocol_error(
                            participant_id,
                            SessionError::BinaryUnsupported.code(),
                            SessionError::BinaryUnsupported.to_string(),
                        ).await;
                    }
                    Ok(Some(Err(e))) => {
                        warn!(session_id = %session.id, participant_id = %participant_id, error = %e, "websocket error");
                        break;
                    }
                    Err(_) => {
                        warn!(session_id = %session.id, participant_id = %participant_id, "read timeout, closing");
                        break;
                    }
                }
            }
            _ = ping_interval.tick() => {
                if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            outbound = outbox_rx.recv() => {
                match outbound {
                    Some(envelope) => {
                        if socket.send(Message::Text(envelope.to_json().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    session.leave(participant_id).await;
    let _ = socket.send(Message::Close(None)).await;
    info!(session_id = %session.id, participant_id = %participant_id, "connection closed");
}

async fn handle_frame(session: &Arc<Session>, participant_id: ParticipantId, text: &str) {
    let envelope: Envelope = match decode_frame(text) {
        Ok(e) => e,
        Err(e) => {
            session.report_protocol_error(participant_id, e.code(), e.to_string()).await;
            return;
        }
    };

    let command = match Command::decode(&envelope) {
        Ok(c) => c,
        Err(e) => {
            session.report_protocol_error(participant_id, e.code(), e.to_string()).await;
            return;
        }
    };

    session.handle_command(participant_id, command).await;
}
