use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tracing::{error, info, trace, warn};

use bolo_types::events::{ClientCommand, ServerEvent};
use bolo_types::models::UserId;

use crate::error::INVALID_MESSAGE;
use crate::pipeline::Pipeline;
use crate::rooms::ConnectionHandle;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const READ_FAILED: &str = "Failed to mark messages as read";

/// Serve one WebSocket whose bearer token was already verified at the HTTP
/// upgrade, so `user_id` is trusted.
pub async fn handle_connection(socket: WebSocket, pipeline: Pipeline, user_id: UserId) {
    let (mut sender, mut receiver) = socket.split();

    let (handle, mut outbound_rx) = ConnectionHandle::new();
    let rooms = pipeline.rooms().clone();
    rooms.join(&user_id, &handle);
    info!("{} connected to gateway (conn {})", user_id, handle.id());

    handle.send(ServerEvent::Ready {
        user_id: user_id.clone(),
    });

    // Set by the reader on every Pong, cleared by each heartbeat tick
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward queued events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = outbound_rx.recv() => {
                    let Some(event) = event else { break };

                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to serialize {} event: {}", event.name(), e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client, one at a time so a connection's own
    // commands are handled in the order it sent them.
    let recv_handle = handle.clone();
    let recv_user = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(cmd) => handle_command(&pipeline, &recv_user, &recv_handle, cmd).await,
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            recv_user,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                        recv_handle.send(ServerEvent::error(INVALID_MESSAGE));
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish, then for the other to actually stop so
    // no late `join_room` can land after `leave`
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        }
    }

    rooms.leave(&handle);
    info!("{} disconnected from gateway (conn {})", user_id, handle.id());
}

async fn handle_command(
    pipeline: &Pipeline,
    user_id: &str,
    conn: &ConnectionHandle,
    cmd: ClientCommand,
) {
    match cmd {
        ClientCommand::JoinRoom(room) => {
            // Only the caller's own room: joining someone else's would let a
            // client read their traffic.
            if room.trim() == user_id {
                pipeline.rooms().join(user_id, conn);
            } else {
                warn!("{} tried to join room {}, ignoring", user_id, room);
            }
        }

        ClientCommand::Typing { to, typing } => {
            trace!("{} typing={} -> {}", user_id, typing, to);
            pipeline.relay_typing(user_id, to.trim(), typing);
        }

        ClientCommand::SendMessage(payload) => {
            if let Err(e) = pipeline.send(user_id, payload).await {
                warn!("{} send_message rejected: {}", user_id, e);
                conn.send(ServerEvent::error(e.client_message()));
            }
        }

        ClientCommand::MarkRead { from } => {
            if let Err(e) = pipeline.mark_read(user_id, from.trim()).await {
                warn!("{} mark_read failed: {}", user_id, e);
                conn.send(ServerEvent::error(READ_FAILED));
            }
        }
    }
}
