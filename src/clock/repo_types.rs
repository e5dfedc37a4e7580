use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// One work interval. `clock_out` and `total_hours` are set together,
/// exactly once, when the session closes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub clock_in: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub clock_out: Option<OffsetDateTime>,
    pub description: Option<String>,
    pub status: SessionStatus,
    pub total_hours: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}

/// Row as stored; `status` is kept as text in the table.
#[derive(Debug, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub clock_in: OffsetDateTime,
    pub clock_out: Option<OffsetDateTime>,
    pub description: Option<String>,
    pub status: String,
    pub total_hours: Option<f64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<SessionRow> for Session {
    fn from(r: SessionRow) -> Self {
        let status = match r.status.as_str() {
            "open" => SessionStatus::Open,
            "closed" => SessionStatus::Closed,
            // status mirrors clock_out; fall back to it for unknown text
            _ if r.clock_out.is_some() => SessionStatus::Closed,
            _ => SessionStatus::Open,
        };
        Self {
            id: r.id,
            user_id: r.user_id,
            clock_in: r.clock_in,
            clock_out: r.clock_out,
            description: r.description,
            status,
            total_hours: r.total_hours,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Values frozen onto a session when it closes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionClose {
    pub clock_out: OffsetDateTime,
    pub total_hours: f64,
    /// Replaces the stored description when present.
    pub description: Option<String>,
}

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    /// Rows before this page; saturates instead of wrapping.
    pub fn skip(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)).saturating_mul(i64::from(self.limit))
    }
}

/// Inclusive bounds on `clock_in`; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilter {
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
}

impl DateFilter {
    #[cfg(test)]
    pub fn matches(&self, instant: OffsetDateTime) -> bool {
        self.from.map_or(true, |f| instant >= f) && self.to.map_or(true, |t| instant <= t)
    }
}
