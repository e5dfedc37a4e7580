use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    clock::{
        dto::{ClockEntryRequest, ClockStatus, History, HistoryQuery, Period, PeriodStats},
        repo_types::Session,
    },
    error::{ApiError, ApiResult, ErrorCode},
    response::Envelope,
    state::AppState,
    validation::ValidatedJson,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/clock/status", get(status))
        .route("/clock/history", get(history))
        .route("/clock/today", get(today))
        .route("/clock/week", get(week))
        .route("/clock/month", get(month))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/clock/in", post(clock_in))
        .route("/clock/out", post(clock_out))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn status(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Envelope<ClockStatus>>> {
    let status = state.clock.status(auth.user_id).await?;
    Ok(Json(Envelope::ok(status)))
}

#[instrument(skip(state, auth, query), fields(user_id = %auth.user_id))]
pub async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Envelope<History>>> {
    let Query(query) = query.map_err(|e| {
        ApiError::new(ErrorCode::Validation)
            .with_message(e.body_text())
            .on_field("query")
    })?;
    let (page, filter) = query.parse(state.clock.utc_offset())?;
    let history = state.clock.history(auth.user_id, page, filter).await?;
    Ok(Json(Envelope::ok(history)))
}

#[instrument(skip(state, auth, body), fields(user_id = %auth.user_id))]
pub async fn clock_in(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<ClockEntryRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Session>>)> {
    let session = state
        .clock
        .open_session(auth.user_id, body.into_description())
        .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(session))))
}

#[instrument(skip(state, auth, body), fields(user_id = %auth.user_id))]
pub async fn clock_out(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<ClockEntryRequest>,
) -> ApiResult<Json<Envelope<Session>>> {
    let session = state
        .clock
        .close_session(auth.user_id, body.into_description())
        .await?;
    Ok(Json(Envelope::ok(session)))
}

async fn period(
    state: &AppState,
    auth: &AuthUser,
    period: Period,
) -> ApiResult<Json<Envelope<PeriodStats>>> {
    let stats = state.clock.period_stats(auth.user_id, period).await?;
    Ok(Json(Envelope::ok(stats)))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn today(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Envelope<PeriodStats>>> {
    period(&state, &auth, Period::Today).await
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn week(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Envelope<PeriodStats>>> {
    period(&state, &auth, Period::Week).await
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn month(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Envelope<PeriodStats>>> {
    period(&state, &auth, Period::Month).await
}
