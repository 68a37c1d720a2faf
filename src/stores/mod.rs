//! Production adapter implementations.

pub mod lock_redis;
pub mod postgres;

pub use lock_redis::RedisLockStore;
pub use postgres::PgStore;
