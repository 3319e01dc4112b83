use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::Json,
};
use bazaar_core::schema::{conversations, messages};
use bazaar_core::{BazaarContext, CoreError, SenderType};
use bazaar_logstream::LogEmitter;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use crate::auth::{generate_token, Role};

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "bazaar-gateway"
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub principal_id: String,
    pub role: Role,
}

pub async fn mint_token(
    Extension(ctx): Extension<BazaarContext>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let token = generate_token(
        &req.principal_id,
        req.role,
        &ctx.config.server.jwt_secret,
        30,
    )
    .map_err(|e| {
        tracing::error!("Failed to generate token: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(serde_json::json!({ "token": token })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    pub participant_id: String,
    pub role: SenderType,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn get_conversations(
    Extension(ctx): Extension<BazaarContext>,
    Query(params): Query<ConversationQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let limit = params.limit.unwrap_or(50).min(100);
    let offset = params.offset.unwrap_or(0);

    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut query = conversations::table
        .select((
            conversations::id,
            conversations::conversation_id,
            conversations::user_id,
            conversations::seller_id,
            conversations::last_message,
            conversations::last_message_at,
            conversations::created_at,
        ))
        .order(conversations::updated_at.desc())
        .limit(limit)
        .offset(offset)
        .into_boxed();

    query = match params.role {
        SenderType::User => query.filter(conversations::user_id.eq(&params.participant_id)),
        SenderType::Seller => query.filter(conversations::seller_id.eq(&params.participant_id)),
    };

    type ConversationRow = (
        i64,
        String,
        String,
        String,
        Option<String>,
        Option<DateTime<Utc>>,
        DateTime<Utc>,
    );

    let rows: Vec<ConversationRow> = query
        .load(&mut conn)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let result: Vec<serde_json::Value> = rows
        .into_iter()
        .map(
            |(id, conversation_id, user_id, seller_id, last_message, last_message_at, created_at)| {
                serde_json::json!({
                    "id": id,
                    "conversationId": conversation_id,
                    "userId": user_id,
                    "sellerId": seller_id,
                    "lastMessage": last_message,
                    "lastMessageAt": last_message_at,
                    "createdAt": created_at,
                })
            },
        )
        .collect();

    Ok(Json(serde_json::json!(result)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    pub conversation_id: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn get_messages(
    Extension(ctx): Extension<BazaarContext>,
    Query(params): Query<MessageQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let limit = params.limit.unwrap_or(50).min(100);
    let offset = params.offset.unwrap_or(0);

    let mut conn = ctx
        .db_pool
        .get()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let rows: Vec<(i64, String, String, bool, DateTime<Utc>)> = messages::table
        .filter(messages::conversation_id.eq(&params.conversation_id))
        .order(messages::created_at.asc())
        .limit(limit)
        .offset(offset)
        .select((
            messages::id,
            messages::sender_type,
            messages::content,
            messages::seen,
            messages::created_at,
        ))
        .load(&mut conn)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let result: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|(id, sender_type, content, seen, created_at)| {
            serde_json::json!({
                "id": id,
                "conversationId": params.conversation_id,
                "senderType": sender_type,
                "content": content,
                "seen": seen,
                "createdAt": created_at,
            })
        })
        .collect();

    Ok(Json(serde_json::json!(result)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnseenQuery {
    pub receiver_type: SenderType,
    pub conversation_id: String,
}

/// Counter read. A store outage is reported as 503, never as a zero count,
/// so the client can tell "no unread" from "couldn't check".
pub async fn get_unseen_count(
    Extension(ctx): Extension<BazaarContext>,
    Query(params): Query<UnseenQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let count = ctx
        .unseen_counters()
        .get(params.receiver_type, &params.conversation_id)
        .await
        .map_err(|e| match e {
            CoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })?;

    Ok(Json(serde_json::json!({
        "conversationId": params.conversation_id,
        "receiverType": params.receiver_type,
        "count": count,
    })))
}

#[derive(Deserialize)]
pub struct IngestLogRequest {
    pub source: Option<String>,
    pub line: String,
}

/// Producer endpoint for the log pipeline: appends the line to the durable
/// topic and returns once the broker acknowledges it. Dashboards see it on
/// the next dispatch tick.
pub async fn ingest_log(
    Extension(emitter): Extension<LogEmitter>,
    Json(req): Json<IngestLogRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    emitter
        .emit(req.source.as_deref(), &req.line)
        .await
        .map_err(|e| {
            tracing::error!("Failed to publish log line: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    Ok(Json(serde_json::json!({ "status": "queued" })))
}
