use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::db::{bounded, unique_violation, StoreError, StoreResult, UNIQUE_EMAIL_CONSTRAINT};

/// Persistence boundary for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// Fails with [`StoreError::EmailTaken`] when the email is registered.
    async fn create(&self, name: &str, email: &str, password_hash: &str) -> StoreResult<User>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        bounded(
            self.timeout,
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, name, email, password_hash, created_at, updated_at
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email)
            .fetch_optional(&self.db),
        )
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        bounded(
            self.timeout,
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, name, email, password_hash, created_at, updated_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.db),
        )
        .await
    }

    async fn create(&self, name: &str, email: &str, password_hash: &str) -> StoreResult<User> {
        let res = bounded(
            self.timeout,
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (name, email, password_hash)
                VALUES ($1, $2, $3)
                RETURNING id, name, email, password_hash, created_at, updated_at
                "#,
            )
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.db),
        )
        .await;

        match res {
            Err(e) if unique_violation(&e).as_deref() == Some(UNIQUE_EMAIL_CONSTRAINT) => {
                Err(StoreError::EmailTaken)
            }
            other => other,
        }
    }
}
