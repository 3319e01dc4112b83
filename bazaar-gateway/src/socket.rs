use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bazaar_core::registry::{Audience, AudienceFilter, OutboundSender};
use bazaar_core::BazaarContext;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing;

use crate::auth::{self, Role};
use crate::frames::{ControlFrame, InboundFrame, OutboundFrame};
use crate::service::ChatService;

#[derive(Deserialize)]
pub struct WsQuery {
    token: String,
    conversation_id: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    Extension(ctx): Extension<BazaarContext>,
) -> Response {
    match authorize(&query, &ctx) {
        Ok(audience) => ws.on_upgrade(move |socket| handle_socket(socket, audience, ctx)),
        Err(status) => status.into_response(),
    }
}

/// Maps the authenticated principal onto the audience this connection serves:
/// admins join the dashboard fan-out, chat roles join one conversation.
fn authorize(query: &WsQuery, ctx: &BazaarContext) -> Result<Audience, StatusCode> {
    let principal = auth::verify_token(&query.token, &ctx.config.server.jwt_secret)?;

    match principal.role {
        Role::Admin => Ok(Audience::Admins),
        role => {
            let conversation_id = query
                .conversation_id
                .clone()
                .ok_or(StatusCode::BAD_REQUEST)?;
            let chat_role = role.sender_type().ok_or(StatusCode::FORBIDDEN)?;

            Ok(Audience::Conversation {
                conversation_id,
                principal_id: principal.principal_id,
                role: chat_role,
            })
        }
    }
}

async fn handle_socket(socket: WebSocket, audience: Audience, ctx: BazaarContext) {
    tracing::info!("WebSocket connection established for {:?}", audience);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Guard-scoped registration: any exit path below, panics included,
    // removes this connection from the registry.
    let guard = ctx.registry.clone().register(audience.clone(), tx.clone());

    // Forward queued outbound frames to the transport
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let service = ChatService::new(ctx.clone());

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_frame(&ctx, &service, &audience, &tx, &text).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("WebSocket transport error: {}", e);
                break;
            }
        }
    }

    drop(guard);
    drop(tx);
    let _ = send_task.await;

    tracing::info!("WebSocket connection closed");
}

async fn handle_frame(
    ctx: &BazaarContext,
    service: &ChatService,
    audience: &Audience,
    reply: &OutboundSender,
    text: &str,
) {
    let frame = match serde_json::from_str::<InboundFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            // Malformed frame: drop it, keep the connection
            tracing::warn!("Dropping malformed frame: {}", e);
            let _ = reply.send(
                OutboundFrame::Error {
                    message: "malformed frame".to_string(),
                }
                .to_json(),
            );
            return;
        }
    };

    let (session_conversation, session_role) = match audience {
        Audience::Conversation {
            conversation_id,
            role,
            ..
        } => (conversation_id, *role),
        Audience::Admins => {
            let _ = reply.send(
                OutboundFrame::Error {
                    message: "dashboard sessions are receive-only".to_string(),
                }
                .to_json(),
            );
            return;
        }
    };

    match frame {
        InboundFrame::Send(send) => {
            if send.conversation_id != *session_conversation || send.sender_type != session_role {
                let _ = reply.send(
                    OutboundFrame::Error {
                        message: "frame does not match this session".to_string(),
                    }
                    .to_json(),
                );
                return;
            }

            match service.send_message(&send).await {
                Ok(outcome) => {
                    let new_message = OutboundFrame::NewMessage(outcome.message.clone()).to_json();
                    ctx.registry.for_each(
                        AudienceFilter::Conversation(&send.conversation_id),
                        |sender| {
                            let _ = sender.send(new_message.clone());
                        },
                    );

                    if let Some(count) = outcome.unseen {
                        let update = OutboundFrame::UnseenCountUpdate {
                            conversation_id: send.conversation_id.clone(),
                            count,
                        }
                        .to_json();
                        ctx.registry.for_each(
                            AudienceFilter::Counterpart {
                                conversation_id: &send.conversation_id,
                                of: send.sender_type,
                            },
                            |sender| {
                                let _ = sender.send(update.clone());
                            },
                        );
                    }
                }
                Err(e) => {
                    // Never announce a message that did not durably save
                    tracing::error!("Failed to persist message: {}", e);
                    let _ = reply.send(
                        OutboundFrame::Error {
                            message: "message not saved".to_string(),
                        }
                        .to_json(),
                    );
                }
            }
        }
        InboundFrame::Control(ControlFrame::MarkAsSeen { conversation_id }) => {
            if conversation_id != *session_conversation {
                let _ = reply.send(
                    OutboundFrame::Error {
                        message: "frame does not match this session".to_string(),
                    }
                    .to_json(),
                );
                return;
            }

            match service.mark_seen(&conversation_id, session_role).await {
                Ok(()) => {
                    let update = OutboundFrame::UnseenCountUpdate {
                        conversation_id: conversation_id.clone(),
                        count: 0,
                    }
                    .to_json();
                    // The caller's other open sessions learn the count is gone
                    ctx.registry.for_each(
                        AudienceFilter::Principal {
                            conversation_id: &conversation_id,
                            role: session_role,
                        },
                        |sender| {
                            let _ = sender.send(update.clone());
                        },
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to mark conversation {} as seen: {}",
                        conversation_id,
                        e
                    );
                    let _ = reply.send(
                        OutboundFrame::Error {
                            message: "could not mark as seen".to_string(),
                        }
                        .to_json(),
                    );
                }
            }
        }
    }
}
