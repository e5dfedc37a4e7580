use std::sync::Arc;

use time::UtcOffset;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::dto::{ClockStatus, History, Period, PeriodStats};
use crate::clock::repo::SessionStore;
use crate::clock::repo_types::{DateFilter, Page, Session, SessionClose};
use crate::db::StoreError;
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::time_utils::{
    day_window, hours_between, month_window, sum_hours, week_window, Clock, Window,
};

fn clock_internal(message: &str, e: StoreError) -> ApiError {
    ApiError::internal(ErrorCode::ClockUnknown, e).with_message(message)
}

/// Clock-session lifecycle: opening, closing and aggregating sessions for
/// one user at a time.
///
/// The store is explicitly injected; nothing here holds process-wide state.
#[derive(Clone)]
pub struct ClockService {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    utc_offset: UtcOffset,
}

impl ClockService {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, utc_offset: UtcOffset) -> Self {
        Self {
            store,
            clock,
            utc_offset,
        }
    }

    pub fn utc_offset(&self) -> UtcOffset {
        self.utc_offset
    }

    /// Opens a session at the current instant.
    ///
    /// The early `find_open` gives the common case a clean error; the store's
    /// own uniqueness guard decides concurrent attempts.
    pub async fn open_session(
        &self,
        user_id: Uuid,
        description: Option<String>,
    ) -> ApiResult<Session> {
        const FAILED: &str = "Erro ao registrar entrada";

        let open = self
            .store
            .find_open(user_id)
            .await
            .map_err(|e| clock_internal(FAILED, e))?;
        if let Some(open) = open {
            warn!(%user_id, session_id = %open.id, "clock in rejected: session already open");
            return Err(ErrorCode::AlreadyOpen.into());
        }

        let now = self.clock.now();
        match self.store.create(user_id, description.as_deref(), now).await {
            Ok(session) => {
                info!(%user_id, session_id = %session.id, "clocked in");
                Ok(session)
            }
            Err(StoreError::OpenSessionExists) => {
                warn!(%user_id, "clock in lost race to a concurrent request");
                Err(ErrorCode::AlreadyOpen.into())
            }
            Err(e) => Err(clock_internal(FAILED, e)),
        }
    }

    /// Closes the user's open session, freezing `clock_out` and
    /// `total_hours`. A missing `description` keeps the stored one.
    pub async fn close_session(
        &self,
        user_id: Uuid,
        description: Option<String>,
    ) -> ApiResult<Session> {
        const FAILED: &str = "Erro ao registrar saída";

        let Some(open) = self
            .store
            .find_open(user_id)
            .await
            .map_err(|e| clock_internal(FAILED, e))?
        else {
            warn!(%user_id, "clock out rejected: no open session");
            return Err(ErrorCode::NoOpenEntry.into());
        };

        // clock_out never precedes clock_in, even if the wall clock stepped back
        let clock_out = self.clock.now().max(open.clock_in);
        let close = SessionClose {
            clock_out,
            total_hours: hours_between(open.clock_in, clock_out),
            description,
        };

        match self.store.close_by_id(open.id, close).await {
            Ok(session) => {
                info!(
                    %user_id,
                    session_id = %session.id,
                    total_hours = ?session.total_hours,
                    "clocked out"
                );
                Ok(session)
            }
            Err(StoreError::SessionNotOpen(id)) => {
                warn!(%user_id, session_id = %id, "clock out lost race to a concurrent request");
                Err(ErrorCode::NoOpenEntry.into())
            }
            Err(e) => Err(clock_internal(FAILED, e)),
        }
    }

    /// Whether the user is clocked in, and hours from sessions that started
    /// today and are already closed.
    pub async fn status(&self, user_id: Uuid) -> ApiResult<ClockStatus> {
        const FAILED: &str = "Erro ao buscar status do ponto";

        let today = day_window(self.clock.now(), self.utc_offset);
        let (current, today_sessions) = tokio::try_join!(
            self.store.find_open(user_id),
            self.store.find_by_range(user_id, today),
        )
        .map_err(|e| clock_internal(FAILED, e))?;

        Ok(ClockStatus {
            is_clocked_in: current.is_some(),
            today_hours: closed_hours(&today_sessions),
            current_entry: current,
        })
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        page: Page,
        filter: DateFilter,
    ) -> ApiResult<History> {
        let entries = self
            .store
            .find_paginated(user_id, page, filter)
            .await
            .map_err(|e| clock_internal("Erro ao buscar histórico de ponto", e))?;

        let total_hours = sum_hours(entries.iter().map(|s| s.total_hours));
        Ok(History {
            entries,
            total_hours,
        })
    }

    pub async fn period_stats(&self, user_id: Uuid, period: Period) -> ApiResult<PeriodStats> {
        let window = self.window(period);
        let sessions = self
            .store
            .find_by_range(user_id, window)
            .await
            .map_err(|e| clock_internal("Erro ao buscar total de horas", e))?;

        Ok(PeriodStats {
            total_hours: closed_hours(&sessions),
        })
    }

    fn window(&self, period: Period) -> Window {
        let now = self.clock.now();
        match period {
            Period::Today => day_window(now, self.utc_offset),
            Period::Week => week_window(now, self.utc_offset),
            Period::Month => month_window(now, self.utc_offset),
        }
    }
}

fn closed_hours(sessions: &[Session]) -> f64 {
    sum_hours(
        sessions
            .iter()
            .filter(|s| !s.is_open())
            .map(|s| s.total_hours),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::repo_types::SessionStatus;
    use crate::testing::{ClosedUnderfootStore, FailingSessionStore, ManualClock, MemorySessionStore};
    use time::macros::{datetime, offset};
    use time::Duration;

    fn service(start: time::OffsetDateTime) -> (ClockService, Arc<ManualClock>, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::default());
        let clock = Arc::new(ManualClock::new(start));
        let svc = ClockService::new(store.clone(), clock.clone(), UtcOffset::UTC);
        (svc, clock, store)
    }

    #[tokio::test]
    async fn open_then_close_lifecycle() {
        let t0 = datetime!(2025-03-12 09:00:00 UTC);
        let (svc, clock, _) = service(t0);
        let user = Uuid::new_v4();

        let opened = svc.open_session(user, Some("deploy".into())).await.unwrap();
        assert_eq!(opened.status, SessionStatus::Open);
        assert_eq!(opened.clock_in, t0);
        assert!(opened.clock_out.is_none());
        assert!(opened.total_hours.is_none());

        let err = svc.open_session(user, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyOpen);

        clock.advance(Duration::minutes(150));
        let closed = svc.close_session(user, None).await.unwrap();
        assert_eq!(closed.id, opened.id);
        assert_eq!(closed.status, SessionStatus::Closed);
        assert_eq!(closed.clock_out, Some(t0 + Duration::minutes(150)));
        assert_eq!(closed.total_hours, Some(2.5));
        assert_eq!(closed.description.as_deref(), Some("deploy"));

        let err = svc.close_session(user, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NoOpenEntry);
    }

    #[tokio::test]
    async fn close_rounds_hours_and_overwrites_description() {
        let t0 = datetime!(2025-03-12 09:00:00 UTC);
        let (svc, clock, _) = service(t0);
        let user = Uuid::new_v4();

        svc.open_session(user, Some("first".into())).await.unwrap();
        clock.advance(Duration::seconds(4000));
        let closed = svc.close_session(user, Some("second".into())).await.unwrap();
        // 4000 / 3600 = 1.1111...
        assert_eq!(closed.total_hours, Some(1.1111));
        assert_eq!(closed.description.as_deref(), Some("second"));
        assert!(closed.clock_out.unwrap() >= closed.clock_in);
    }

    #[tokio::test]
    async fn close_never_goes_before_clock_in() {
        let t0 = datetime!(2025-03-12 09:00:00 UTC);
        let (svc, clock, _) = service(t0);
        let user = Uuid::new_v4();

        svc.open_session(user, None).await.unwrap();
        clock.set(t0 - Duration::minutes(5));
        let closed = svc.close_session(user, None).await.unwrap();
        assert_eq!(closed.clock_out, Some(t0));
        assert_eq!(closed.total_hours, Some(0.0));
    }

    #[tokio::test]
    async fn users_do_not_share_sessions() {
        let (svc, _, _) = service(datetime!(2025-03-12 09:00:00 UTC));
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        svc.open_session(alice, None).await.unwrap();
        svc.open_session(bob, None).await.unwrap();
        let closed = svc.close_session(bob, None).await.unwrap();
        assert_eq!(closed.user_id, bob);
        assert!(svc.status(alice).await.unwrap().is_clocked_in);
        assert!(!svc.status(bob).await.unwrap().is_clocked_in);
    }

    #[tokio::test]
    async fn concurrent_opens_leave_one_open_session() {
        let (svc, _, store) = service(datetime!(2025-03-12 09:00:00 UTC));
        let user = Uuid::new_v4();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.open_session(user, None).await })
            })
            .collect();

        let mut opened = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => opened += 1,
                Err(e) => assert_eq!(e.code, ErrorCode::AlreadyOpen),
            }
        }
        assert_eq!(opened, 1);
        assert_eq!(store.open_count(user), 1);
    }

    #[tokio::test]
    async fn close_after_concurrent_close_is_no_open_entry() {
        let t0 = datetime!(2025-03-12 09:00:00 UTC);
        let user = Uuid::new_v4();
        let open = Session {
            id: Uuid::new_v4(),
            user_id: user,
            clock_in: t0,
            clock_out: None,
            description: None,
            status: SessionStatus::Open,
            total_hours: None,
            created_at: t0,
            updated_at: t0,
        };
        let svc = ClockService::new(
            Arc::new(ClosedUnderfootStore(open)),
            Arc::new(ManualClock::new(t0 + Duration::hours(1))),
            UtcOffset::UTC,
        );

        let err = svc.close_session(user, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NoOpenEntry);
        assert!(err.cause().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_closes_close_once() {
        let t0 = datetime!(2025-03-12 09:00:00 UTC);
        let (svc, clock, store) = service(t0);
        let user = Uuid::new_v4();
        let opened = svc.open_session(user, None).await.unwrap();
        clock.advance(Duration::hours(2));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.close_session(user, None).await })
            })
            .collect();

        let mut closed = Vec::new();
        for h in handles {
            match h.await.unwrap() {
                Ok(s) => closed.push(s),
                Err(e) => assert_eq!(e.code, ErrorCode::NoOpenEntry),
            }
        }
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].id, opened.id);
        assert_eq!(closed[0].total_hours, Some(2.0));
        assert_eq!(store.open_count(user), 0);
    }

    #[tokio::test]
    async fn status_excludes_open_session_time() {
        let t0 = datetime!(2025-03-12 08:00:00 UTC);
        let (svc, clock, _) = service(t0);
        let user = Uuid::new_v4();

        svc.open_session(user, None).await.unwrap();
        clock.advance(Duration::hours(2));
        svc.close_session(user, None).await.unwrap();
        clock.advance(Duration::minutes(30));
        let current = svc.open_session(user, None).await.unwrap();
        clock.advance(Duration::hours(1));

        let status = svc.status(user).await.unwrap();
        assert!(status.is_clocked_in);
        assert_eq!(status.today_hours, 2.0);
        assert_eq!(status.current_entry.as_ref().map(|s| s.id), Some(current.id));

        let again = svc.status(user).await.unwrap();
        assert_eq!(again.today_hours, status.today_hours);
        assert_eq!(again.is_clocked_in, status.is_clocked_in);
        assert_eq!(again.current_entry, status.current_entry);
    }

    #[tokio::test]
    async fn status_only_counts_sessions_started_today() {
        let (svc, clock, store) = service(datetime!(2025-03-12 12:00:00 UTC));
        let user = Uuid::new_v4();
        store.insert_closed(user, datetime!(2025-03-11 22:00:00 UTC), Duration::hours(3));
        store.insert_closed(user, datetime!(2025-03-12 07:00:00 UTC), Duration::hours(4));
        clock.set(datetime!(2025-03-12 18:00:00 UTC));

        let status = svc.status(user).await.unwrap();
        assert!(!status.is_clocked_in);
        assert!(status.current_entry.is_none());
        assert_eq!(status.today_hours, 4.0);
    }

    #[tokio::test]
    async fn today_uses_configured_offset() {
        let store = Arc::new(MemorySessionStore::default());
        let clock = Arc::new(ManualClock::new(datetime!(2025-03-12 02:00:00 UTC)));
        let svc = ClockService::new(store.clone(), clock, offset!(-3));
        let user = Uuid::new_v4();
        // 01:00 UTC on the 12th is 22:00 on the 11th locally, same day as "now"
        store.insert_closed(user, datetime!(2025-03-12 01:00:00 UTC), Duration::minutes(30));

        let today = svc.period_stats(user, Period::Today).await.unwrap();
        assert_eq!(today.total_hours, 0.5);
    }

    #[tokio::test]
    async fn history_orders_paginates_and_sums_returned_page() {
        let (svc, _, store) = service(datetime!(2025-03-31 12:00:00 UTC));
        let user = Uuid::new_v4();
        let base = datetime!(2025-03-01 09:00:00 UTC);
        for day in 0..25 {
            store.insert_closed(user, base + Duration::days(day), Duration::hours(1));
        }

        let all = svc
            .history(user, Page { page: 1, limit: 100 }, DateFilter::default())
            .await
            .unwrap();
        assert_eq!(all.entries.len(), 25);
        assert!(all
            .entries
            .windows(2)
            .all(|w| w[0].clock_in >= w[1].clock_in));

        let second = svc
            .history(user, Page { page: 2, limit: 10 }, DateFilter::default())
            .await
            .unwrap();
        let ids: Vec<_> = second.entries.iter().map(|s| s.id).collect();
        let expected: Vec<_> = all.entries[10..20].iter().map(|s| s.id).collect();
        assert_eq!(ids, expected);
        assert_eq!(second.total_hours, 10.0);

        let default_page = svc
            .history(user, Page::default(), DateFilter::default())
            .await
            .unwrap();
        assert_eq!(default_page.entries.len(), 10);
    }

    #[tokio::test]
    async fn history_filters_by_inclusive_dates_and_skips_open_hours() {
        let t = datetime!(2025-03-10 09:00:00 UTC);
        let (svc, _, store) = service(t);
        let user = Uuid::new_v4();
        store.insert_closed(user, datetime!(2025-03-09 23:59:59 UTC), Duration::hours(1));
        store.insert_closed(user, datetime!(2025-03-10 00:00:00 UTC), Duration::hours(2));
        svc.open_session(user, None).await.unwrap();

        let filter = DateFilter {
            from: Some(datetime!(2025-03-10 00:00:00 UTC)),
            to: Some(datetime!(2025-03-10 23:59:59.999 UTC)),
        };
        let h = svc.history(user, Page::default(), filter).await.unwrap();
        assert_eq!(h.entries.len(), 2);
        assert!(h.entries[0].is_open());
        assert_eq!(h.total_hours, 2.0);
    }

    #[tokio::test]
    async fn period_stats_windows() {
        // Wednesday 2025-03-12
        let (svc, _, store) = service(datetime!(2025-03-12 15:00:00 UTC));
        let user = Uuid::new_v4();
        store.insert_closed(user, datetime!(2025-02-28 10:00:00 UTC), Duration::hours(8));
        store.insert_closed(user, datetime!(2025-03-03 10:00:00 UTC), Duration::hours(1));
        store.insert_closed(user, datetime!(2025-03-09 10:00:00 UTC), Duration::hours(2));
        store.insert_closed(user, datetime!(2025-03-12 08:00:00 UTC), Duration::hours(3));
        svc.open_session(user, None).await.unwrap();

        let today = svc.period_stats(user, Period::Today).await.unwrap();
        let week = svc.period_stats(user, Period::Week).await.unwrap();
        let month = svc.period_stats(user, Period::Month).await.unwrap();
        assert_eq!(today.total_hours, 3.0);
        assert_eq!(week.total_hours, 5.0);
        assert_eq!(month.total_hours, 6.0);
    }

    #[tokio::test]
    async fn store_failures_become_internal_errors() {
        let svc = ClockService::new(
            Arc::new(FailingSessionStore),
            Arc::new(ManualClock::new(datetime!(2025-03-12 09:00:00 UTC))),
            UtcOffset::UTC,
        );
        let user = Uuid::new_v4();

        let err = svc.open_session(user, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ClockUnknown);
        assert_eq!(err.message, "Erro ao registrar entrada");
        assert!(err.cause().is_some());

        assert_eq!(svc.status(user).await.unwrap_err().code, ErrorCode::ClockUnknown);
        assert_eq!(
            svc.history(user, Page::default(), DateFilter::default())
                .await
                .unwrap_err()
                .code,
            ErrorCode::ClockUnknown
        );
        assert_eq!(
            svc.period_stats(user, Period::Month).await.unwrap_err().code,
            ErrorCode::ClockUnknown
        );
    }
}
