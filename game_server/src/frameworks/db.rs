//! Postgres, Redis, and AMQP connection setup, run once at startup.

use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::frameworks::config::Settings;

/// Small pool, same shape as `auth_server`'s — neither service expects to
/// hold more than a handful of connections open per instance.
pub async fn connect_postgres(settings: &Settings) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(settings.db.pool_size)
        .connect(&settings.db.dsn())
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
    MIGRATOR.run(pool).await
}

pub async fn connect_redis(settings: &Settings) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(settings.redis.url())?;
    client.get_connection_manager().await
}

pub async fn connect_amqp(settings: &Settings) -> Result<lapin::Connection, lapin::Error> {
    crate::interface_adapters::repos::amqp::connect(settings).await
}
