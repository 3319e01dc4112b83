use crate::error::CoreError;
use crate::redis::{get_connection, RedisPool};
use crate::types::SenderType;

/// Per-(receiver, conversation) unseen-message counters, backed by Redis.
///
/// The counters are a derived projection: the authoritative value is the
/// number of `seen = false` rows in the messages table for that receiver,
/// and a lost counter is recomputable from there. Store unavailability
/// surfaces as `CoreError::Transient`, never as a zero count.
#[derive(Clone)]
pub struct UnseenCounters {
    pool: RedisPool,
}

fn key_for(receiver: SenderType, conversation_id: &str) -> String {
    format!("unseen:{}_{}", receiver.as_str(), conversation_id)
}

impl UnseenCounters {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Atomically adds one, creating the key at 1 if absent. Redis INCR is a
    /// single atomic server-side operation, so concurrent callers never lose
    /// an update.
    pub async fn increment(
        &self,
        receiver: SenderType,
        conversation_id: &str,
    ) -> Result<i64, CoreError> {
        let mut conn = get_connection(&self.pool)
            .await
            .map_err(CoreError::transient)?;

        let count: i64 = redis::cmd("INCR")
            .arg(key_for(receiver, conversation_id))
            .query_async(&mut conn)
            .await
            .map_err(CoreError::transient)?;

        Ok(count)
    }

    /// Current value; an absent key reads as 0.
    pub async fn get(
        &self,
        receiver: SenderType,
        conversation_id: &str,
    ) -> Result<i64, CoreError> {
        let mut conn = get_connection(&self.pool)
            .await
            .map_err(CoreError::transient)?;

        let count: Option<i64> = redis::cmd("GET")
            .arg(key_for(receiver, conversation_id))
            .query_async(&mut conn)
            .await
            .map_err(CoreError::transient)?;

        Ok(count.unwrap_or(0))
    }

    /// Removes the key entirely. Idempotent: clearing an absent key is a no-op.
    pub async fn clear(
        &self,
        receiver: SenderType,
        conversation_id: &str,
    ) -> Result<(), CoreError> {
        let mut conn = get_connection(&self.pool)
            .await
            .map_err(CoreError::transient)?;

        redis::cmd("DEL")
            .arg(key_for(receiver, conversation_id))
            .query_async::<i64>(&mut conn)
            .await
            .map_err(CoreError::transient)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_matches_wire_contract() {
        assert_eq!(key_for(SenderType::Seller, "conv-42"), "unseen:seller_conv-42");
        assert_eq!(key_for(SenderType::User, "abc"), "unseen:user_abc");
    }
}
