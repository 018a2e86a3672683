pub mod app_config;
pub mod database;
pub mod ledger_repo;
pub mod redis_repo;

pub use database::DbClient;
pub use ledger_repo::PgBookingLedger;
pub use redis_repo::RedisClient;
