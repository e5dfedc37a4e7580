//! In-memory stand-ins for the Postgres adapters and the wall clock.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::auth::repo::UserStore;
use crate::auth::repo_types::User;
use crate::clock::repo::SessionStore;
use crate::clock::repo_types::{DateFilter, Page, Session, SessionClose, SessionStatus};
use crate::clock::ClockService;
use crate::config::AppConfig;
use crate::db::{StoreError, StoreResult};
use crate::state::AppState;
use crate::time_utils::{hours_between, Clock, Window};

pub struct ManualClock(Mutex<OffsetDateTime>);

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self(Mutex::new(start))
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.0.lock().unwrap()
    }
}

/// Check-and-insert happens under one lock, which plays the role of the
/// partial unique index.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<Session>>,
}

impl MemorySessionStore {
    pub fn open_count(&self, user_id: Uuid) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id && s.is_open())
            .count()
    }

    pub fn insert_closed(&self, user_id: Uuid, clock_in: OffsetDateTime, worked: Duration) -> Session {
        let clock_out = clock_in + worked;
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            clock_in,
            clock_out: Some(clock_out),
            description: None,
            status: SessionStatus::Closed,
            total_hours: Some(hours_between(clock_in, clock_out)),
            created_at: clock_in,
            updated_at: clock_out,
        };
        self.sessions.lock().unwrap().push(session.clone());
        session
    }

    fn newest_first<F>(&self, keep: F) -> Vec<Session>
    where
        F: Fn(&Session) -> bool,
    {
        let mut out: Vec<Session> = self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| keep(s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.clock_in.cmp(&a.clock_in));
        out
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_open(&self, user_id: Uuid) -> StoreResult<Option<Session>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.user_id == user_id && s.is_open())
            .cloned())
    }

    async fn find_by_range(&self, user_id: Uuid, window: Window) -> StoreResult<Vec<Session>> {
        Ok(self.newest_first(|s| s.user_id == user_id && window.contains(s.clock_in)))
    }

    async fn find_paginated(
        &self,
        user_id: Uuid,
        page: Page,
        filter: DateFilter,
    ) -> StoreResult<Vec<Session>> {
        Ok(self
            .newest_first(|s| s.user_id == user_id && filter.matches(s.clock_in))
            .into_iter()
            .skip(usize::try_from(page.skip()).unwrap_or(usize::MAX))
            .take(page.limit as usize)
            .collect())
    }

    async fn create(
        &self,
        user_id: Uuid,
        description: Option<&str>,
        clock_in: OffsetDateTime,
    ) -> StoreResult<Session> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.iter().any(|s| s.user_id == user_id && s.is_open()) {
            return Err(StoreError::OpenSessionExists);
        }
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            clock_in,
            clock_out: None,
            description: description.map(str::to_string),
            status: SessionStatus::Open,
            total_hours: None,
            created_at: clock_in,
            updated_at: clock_in,
        };
        sessions.push(session.clone());
        Ok(session)
    }

    async fn close_by_id(&self, session_id: Uuid, close: SessionClose) -> StoreResult<Session> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.is_open())
            .ok_or(StoreError::SessionNotOpen(session_id))?;
        session.clock_out = Some(close.clock_out);
        session.total_hours = Some(close.total_hours);
        session.status = SessionStatus::Closed;
        if let Some(d) = close.description {
            session.description = Some(d);
        }
        session.updated_at = close.clock_out;
        Ok(session.clone())
    }
}

/// Every call fails as if the database stopped answering.
pub struct FailingSessionStore;

fn timed_out<T>() -> StoreResult<T> {
    Err(StoreError::Timeout(StdDuration::from_secs(1)))
}

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn find_open(&self, _user_id: Uuid) -> StoreResult<Option<Session>> {
        timed_out()
    }
    async fn find_by_range(&self, _user_id: Uuid, _window: Window) -> StoreResult<Vec<Session>> {
        timed_out()
    }
    async fn find_paginated(
        &self,
        _user_id: Uuid,
        _page: Page,
        _filter: DateFilter,
    ) -> StoreResult<Vec<Session>> {
        timed_out()
    }
    async fn create(
        &self,
        _user_id: Uuid,
        _description: Option<&str>,
        _clock_in: OffsetDateTime,
    ) -> StoreResult<Session> {
        timed_out()
    }
    async fn close_by_id(&self, _session_id: Uuid, _close: SessionClose) -> StoreResult<Session> {
        timed_out()
    }
}

/// Reports an open session on lookup, but the close finds it already
/// closed, as when another request clocked out in between.
pub struct ClosedUnderfootStore(pub Session);

#[async_trait]
impl SessionStore for ClosedUnderfootStore {
    async fn find_open(&self, _user_id: Uuid) -> StoreResult<Option<Session>> {
        Ok(Some(self.0.clone()))
    }
    async fn find_by_range(&self, _user_id: Uuid, _window: Window) -> StoreResult<Vec<Session>> {
        Ok(Vec::new())
    }
    async fn find_paginated(
        &self,
        _user_id: Uuid,
        _page: Page,
        _filter: DateFilter,
    ) -> StoreResult<Vec<Session>> {
        Ok(Vec::new())
    }
    async fn create(
        &self,
        _user_id: Uuid,
        _description: Option<&str>,
        _clock_in: OffsetDateTime,
    ) -> StoreResult<Session> {
        Err(StoreError::OpenSessionExists)
    }
    async fn close_by_id(&self, session_id: Uuid, _close: SessionClose) -> StoreResult<Session> {
        Err(StoreError::SessionNotOpen(session_id))
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, name: &str, email: &str, password_hash: &str) -> StoreResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == email) {
            return Err(StoreError::EmailTaken);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }
}

/// App state over in-memory stores, plus the clock driving it.
pub fn memory_state(start: OffsetDateTime) -> (AppState, Arc<ManualClock>) {
    let config = Arc::new(AppConfig::for_tests());
    let clock = Arc::new(ManualClock::new(start));
    let sessions = ClockService::new(
        Arc::new(MemorySessionStore::default()),
        clock.clone(),
        config.clock.utc_offset,
    );
    let state = AppState::from_parts(config, Arc::new(MemoryUserStore::default()), sessions);
    (state, clock)
}
