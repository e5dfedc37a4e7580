use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::clock::repo_types::{DateFilter, Page, Session, SessionClose, SessionRow, SessionStatus};
use crate::db::{bounded, unique_violation, StoreError, StoreResult, ONE_OPEN_SESSION_INDEX};
use crate::time_utils::Window;

/// Persistence boundary for clock sessions.
///
/// Implementations own the one-open-session-per-user rule: `create` must
/// fail with [`StoreError::OpenSessionExists`] instead of inserting a second
/// open session, and `close_by_id` must fail with
/// [`StoreError::SessionNotOpen`] when the session was already closed, even
/// when racing with other processes.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_open(&self, user_id: Uuid) -> StoreResult<Option<Session>>;

    /// Sessions whose `clock_in` lies in the half-open window, newest first.
    async fn find_by_range(&self, user_id: Uuid, window: Window) -> StoreResult<Vec<Session>>;

    /// One page of sessions matching `filter`, newest first.
    async fn find_paginated(
        &self,
        user_id: Uuid,
        page: Page,
        filter: DateFilter,
    ) -> StoreResult<Vec<Session>>;

    async fn create(
        &self,
        user_id: Uuid,
        description: Option<&str>,
        clock_in: OffsetDateTime,
    ) -> StoreResult<Session>;

    async fn close_by_id(&self, session_id: Uuid, close: SessionClose) -> StoreResult<Session>;
}

#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
    timeout: Duration,
}

impl PgSessionStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

fn into_sessions(rows: Vec<SessionRow>) -> Vec<Session> {
    rows.into_iter().map(Session::from).collect()
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find_open(&self, user_id: Uuid) -> StoreResult<Option<Session>> {
        let row = bounded(
            self.timeout,
            sqlx::query_as::<_, SessionRow>(
                r#"
                SELECT id, user_id, clock_in, clock_out, description, status,
                       total_hours, created_at, updated_at
                  FROM clock_sessions
                 WHERE user_id = $1 AND status = $2
                 LIMIT 1
                "#,
            )
            .bind(user_id)
            .bind(SessionStatus::Open.as_str())
            .fetch_optional(&self.db),
        )
        .await?;
        Ok(row.map(Session::from))
    }

    async fn find_by_range(&self, user_id: Uuid, window: Window) -> StoreResult<Vec<Session>> {
        let rows = bounded(
            self.timeout,
            sqlx::query_as::<_, SessionRow>(
                r#"
                SELECT id, user_id, clock_in, clock_out, description, status,
                       total_hours, created_at, updated_at
                  FROM clock_sessions
                 WHERE user_id = $1 AND clock_in >= $2 AND clock_in < $3
                 ORDER BY clock_in DESC
                "#,
            )
            .bind(user_id)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.db),
        )
        .await?;
        Ok(into_sessions(rows))
    }

    async fn find_paginated(
        &self,
        user_id: Uuid,
        page: Page,
        filter: DateFilter,
    ) -> StoreResult<Vec<Session>> {
        let rows = bounded(
            self.timeout,
            sqlx::query_as::<_, SessionRow>(
                r#"
                SELECT id, user_id, clock_in, clock_out, description, status,
                       total_hours, created_at, updated_at
                  FROM clock_sessions
                 WHERE user_id = $1
                   AND ($2::timestamptz IS NULL OR clock_in >= $2)
                   AND ($3::timestamptz IS NULL OR clock_in <= $3)
                 ORDER BY clock_in DESC
                 LIMIT $4 OFFSET $5
                "#,
            )
            .bind(user_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(i64::from(page.limit))
            .bind(page.skip())
            .fetch_all(&self.db),
        )
        .await?;
        Ok(into_sessions(rows))
    }

    async fn create(
        &self,
        user_id: Uuid,
        description: Option<&str>,
        clock_in: OffsetDateTime,
    ) -> StoreResult<Session> {
        let res = bounded(
            self.timeout,
            sqlx::query_as::<_, SessionRow>(
                r#"
                INSERT INTO clock_sessions (user_id, clock_in, description, status)
                VALUES ($1, $2, $3, $4)
                RETURNING id, user_id, clock_in, clock_out, description, status,
                          total_hours, created_at, updated_at
                "#,
            )
            .bind(user_id)
            .bind(clock_in)
            .bind(description)
            .bind(SessionStatus::Open.as_str())
            .fetch_one(&self.db),
        )
        .await;

        match res {
            Ok(row) => Ok(row.into()),
            Err(e) if unique_violation(&e).as_deref() == Some(ONE_OPEN_SESSION_INDEX) => {
                Err(StoreError::OpenSessionExists)
            }
            Err(e) => Err(e),
        }
    }

    async fn close_by_id(&self, session_id: Uuid, close: SessionClose) -> StoreResult<Session> {
        // The status guard makes a lost race come back as zero rows.
        let row = bounded(
            self.timeout,
            sqlx::query_as::<_, SessionRow>(
                r#"
                UPDATE clock_sessions
                   SET clock_out = $2,
                       total_hours = $3,
                       status = $4,
                       description = COALESCE($5, description),
                       updated_at = now()
                 WHERE id = $1 AND status = $6
                RETURNING id, user_id, clock_in, clock_out, description, status,
                          total_hours, created_at, updated_at
                "#,
            )
            .bind(session_id)
            .bind(close.clock_out)
            .bind(close.total_hours)
            .bind(SessionStatus::Closed.as_str())
            .bind(close.description.as_deref())
            .bind(SessionStatus::Open.as_str())
            .fetch_optional(&self.db),
        )
        .await?;

        row.map(Session::from)
            .ok_or(StoreError::SessionNotOpen(session_id))
    }
}
