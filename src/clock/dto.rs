use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::clock::repo_types::{DateFilter, Page, Session, DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT};
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::time_utils::{date_bounds, parse_date};
use crate::validation::{FieldRule, RequestSchema, Schema};

pub const DESCRIPTION_MAX: usize = 500;

/// Body of `POST /clock/in` and `POST /clock/out`.
#[derive(Debug, Default, Deserialize)]
pub struct ClockEntryRequest {
    pub description: Option<String>,
}

impl RequestSchema for ClockEntryRequest {
    const SCHEMA: Schema = Schema {
        fields: &[FieldRule::string("description").max_len(DESCRIPTION_MAX)],
        additional_properties: false,
    };
}

impl ClockEntryRequest {
    /// Blank descriptions count as not supplied.
    pub fn into_description(self) -> Option<String> {
        self.description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct ClockStatus {
    pub is_clocked_in: bool,
    pub today_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_entry: Option<Session>,
}

#[derive(Debug, Serialize)]
pub struct History {
    pub entries: Vec<Session>,
    pub total_hours: f64,
}

#[derive(Debug, Serialize)]
pub struct PeriodStats {
    #[serde(rename = "totalHours")]
    pub total_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    Week,
    Month,
}

/// Raw `GET /clock/history` query; every value arrives as text.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn positive(field: &str, raw: Option<&str>, default: u32, max: u32) -> ApiResult<u32> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<u32>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n),
        _ if max == u32::MAX => Err(ApiError::new(ErrorCode::Validation)
            .with_message(format!("{field} deve ser um inteiro maior ou igual a 1"))
            .on_field(field)),
        _ => Err(ApiError::new(ErrorCode::Validation)
            .with_message(format!("{field} deve ser um inteiro entre 1 e {max}"))
            .on_field(field)),
    }
}

fn date(field: &str, raw: Option<&str>) -> ApiResult<Option<time::Date>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    parse_date(raw).map(Some).ok_or_else(|| {
        ApiError::new(ErrorCode::InvalidDate)
            .with_message(format!("{field} deve estar no formato AAAA-MM-DD"))
            .on_field(field)
    })
}

impl HistoryQuery {
    pub fn parse(&self, offset: UtcOffset) -> ApiResult<(Page, DateFilter)> {
        let page = Page {
            page: positive("page", self.page.as_deref(), DEFAULT_PAGE, u32::MAX)?,
            limit: positive("limit", self.limit.as_deref(), DEFAULT_LIMIT, MAX_LIMIT)?,
        };
        let start = date("start_date", self.start_date.as_deref())?;
        let end = date("end_date", self.end_date.as_deref())?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ApiError::new(ErrorCode::InvalidDate)
                    .with_message("start_date deve ser anterior ou igual a end_date")
                    .on_field("start_date"));
            }
        }
        let (from, to) = date_bounds(start, end, offset);
        Ok((page, DateFilter { from, to }))
    }
}
