pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod kafka;
pub mod redis;
pub mod registry;
pub mod schema;
pub mod types;
pub mod unseen;

pub use config::Config;
pub use context::BazaarContext;
pub use db::DbPool;
pub use error::CoreError;
pub use kafka::{KafkaConsumer, KafkaProducer};
pub use redis::RedisPool;
pub use registry::{Audience, AudienceFilter, ConnectionRegistry};
pub use types::SenderType;
pub use unseen::UnseenCounters;
