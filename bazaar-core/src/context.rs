use std::sync::Arc;

use crate::config::Config;
use crate::db::{create_pool as create_db_pool, DbPool};
use crate::kafka::{create_consumer, create_producer, KafkaConsumer, KafkaProducer};
use crate::redis::{create_pool as create_redis_pool, RedisPool};
use crate::registry::ConnectionRegistry;
use crate::unseen::UnseenCounters;

/// Shared handles for every service task: constructed once at startup and
/// cloned into the gateway, the log consumer, and the dispatcher.
#[derive(Clone)]
pub struct BazaarContext {
    pub config: Arc<Config>,
    pub db_pool: Arc<DbPool>,
    pub redis_pool: RedisPool,
    pub producer: KafkaProducer,
    pub registry: Arc<ConnectionRegistry>,
}

impl BazaarContext {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = create_db_pool(&config.database).await?;
        let redis_pool = create_redis_pool(&config.redis).await?;
        let producer = create_producer(&config.kafka)?;

        Ok(BazaarContext {
            config: Arc::new(config),
            db_pool,
            redis_pool,
            producer,
            registry: Arc::new(ConnectionRegistry::new()),
        })
    }

    pub fn create_consumer(&self, group_id: Option<&str>) -> anyhow::Result<KafkaConsumer> {
        create_consumer(&self.config.kafka, group_id)
    }

    pub fn unseen_counters(&self) -> UnseenCounters {
        UnseenCounters::new(self.redis_pool.clone())
    }
}
