use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::config::StoreConfig;

/// Name of the partial unique index allowing one open session per user.
pub const ONE_OPEN_SESSION_INDEX: &str = "clock_sessions_one_open_per_user";
/// Name of the unique constraint on `users.email`.
pub const UNIQUE_EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user already has an open session")]
    OpenSessionExists,

    #[error("session {0} is not open")]
    SessionNotOpen(Uuid),

    #[error("email already registered")]
    EmailTaken,

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub async fn connect(cfg: &StoreConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.timeout)
        .connect(&cfg.database_url)
        .await
        .context("connect to database")?;
    Ok(pool)
}

/// Applies pending migrations, then checks the one-open-session index is
/// in place. Either failure aborts startup.
pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    ensure_open_session_guard(db).await
}

async fn ensure_open_session_guard(db: &PgPool) -> anyhow::Result<()> {
    let present: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_indexes WHERE indexname = $1)")
            .bind(ONE_OPEN_SESSION_INDEX)
            .fetch_one(db)
            .await
            .context("look up open-session index")?;
    anyhow::ensure!(present, "index {ONE_OPEN_SESSION_INDEX} is missing");
    tracing::debug!(index = ONE_OPEN_SESSION_INDEX, "open-session guard present");
    Ok(())
}

/// Runs a store call under the adapter's timeout.
pub async fn bounded<T, F>(timeout: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => res.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

/// Name of the violated constraint when `err` is a unique violation.
pub fn unique_violation(err: &StoreError) -> Option<String> {
    let StoreError::Database(sqlx::Error::Database(db_err)) = err else {
        return None;
    };
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    Some(db_err.constraint().unwrap_or_default().to_string())
}
