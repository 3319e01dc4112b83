use bazaar_core::schema::{conversations, messages};
use bazaar_core::{BazaarContext, CoreError, SenderType, UnseenCounters};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing;

use crate::frames::{NewMessagePayload, SendFrame};

/// Result of a durably persisted send: what to push, and to whom.
pub struct SendOutcome {
    pub message: NewMessagePayload,
    /// Counterpart's unseen count after this message, when the counter store
    /// was reachable. `None` means the count update is skipped this round;
    /// the counter self-heals because it is recomputable from the rows.
    pub unseen: Option<i64>,
    pub counterpart: SenderType,
}

/// Persists chat traffic and keeps the unseen projection in step with it.
///
/// Ordering inside `send_message` is the contract: the message row is durable
/// before the counter moves, and the counter moves before any event about the
/// message is announced.
pub struct ChatService {
    ctx: BazaarContext,
    counters: UnseenCounters,
}

impl ChatService {
    pub fn new(ctx: BazaarContext) -> Self {
        let counters = ctx.unseen_counters();
        Self { ctx, counters }
    }

    pub async fn send_message(&self, frame: &SendFrame) -> Result<SendOutcome, CoreError> {
        let mut conn = self.ctx.db_pool.get().await.map_err(CoreError::transient)?;

        self.ensure_conversation(&mut conn, frame).await?;

        let created_at: DateTime<Utc> = diesel::insert_into(messages::table)
            .values((
                messages::conversation_id.eq(&frame.conversation_id),
                messages::sender_type.eq(frame.sender_type.as_str()),
                messages::content.eq(&frame.message_body),
                messages::seen.eq(false),
            ))
            .returning(messages::created_at)
            .get_result(&mut conn)
            .await
            .map_err(CoreError::persistence)?;

        // Denormalized inbox preview
        diesel::update(
            conversations::table.filter(conversations::conversation_id.eq(&frame.conversation_id)),
        )
        .set((
            conversations::last_message.eq(Some(frame.message_body.as_str())),
            conversations::last_message_at.eq(Some(created_at)),
            conversations::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await
        .map_err(CoreError::persistence)?;

        // The row is durable from here on: counter or delivery trouble must
        // not un-announce the message.
        let counterpart = frame.sender_type.counterpart();
        let unseen = match self
            .counters
            .increment(counterpart, &frame.conversation_id)
            .await
        {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(
                    "Unseen counter increment failed for conversation {}: {}",
                    frame.conversation_id,
                    e
                );
                None
            }
        };

        Ok(SendOutcome {
            message: NewMessagePayload {
                conversation_id: frame.conversation_id.clone(),
                content: frame.message_body.clone(),
                sender_type: frame.sender_type,
                created_at,
            },
            unseen,
            counterpart,
        })
    }

    /// Clears the caller's unseen state: counter key removed, counterpart
    /// messages flipped to seen.
    pub async fn mark_seen(
        &self,
        conversation_id: &str,
        receiver: SenderType,
    ) -> Result<(), CoreError> {
        self.counters.clear(receiver, conversation_id).await?;

        let mut conn = self.ctx.db_pool.get().await.map_err(CoreError::transient)?;

        diesel::update(
            messages::table
                .filter(messages::conversation_id.eq(conversation_id))
                .filter(messages::sender_type.eq(receiver.counterpart().as_str()))
                .filter(messages::seen.eq(false)),
        )
        .set(messages::seen.eq(true))
        .execute(&mut conn)
        .await
        .map_err(CoreError::persistence)?;

        Ok(())
    }

    async fn ensure_conversation(
        &self,
        conn: &mut bazaar_core::db::DbConnection,
        frame: &SendFrame,
    ) -> Result<(), CoreError> {
        let exists: Option<i64> = conversations::table
            .filter(conversations::conversation_id.eq(&frame.conversation_id))
            .select(conversations::id)
            .first(conn)
            .await
            .optional()
            .map_err(CoreError::persistence)?;

        if exists.is_some() {
            return Ok(());
        }

        let (user_id, seller_id) = match frame.sender_type {
            SenderType::User => (&frame.from_user_id, &frame.to_user_id),
            SenderType::Seller => (&frame.to_user_id, &frame.from_user_id),
        };

        diesel::insert_into(conversations::table)
            .values((
                conversations::conversation_id.eq(&frame.conversation_id),
                conversations::user_id.eq(user_id),
                conversations::seller_id.eq(seller_id),
            ))
            .on_conflict(conversations::conversation_id)
            .do_nothing()
            .execute(conn)
            .await
            .map_err(CoreError::persistence)?;

        Ok(())
    }
}
