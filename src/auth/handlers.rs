use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{normalize_email, AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
    },
    db::StoreError,
    error::{ApiError, ApiResult, ErrorCode},
    response::Envelope,
    state::AppState,
    validation::ValidatedJson,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn auth_internal(e: impl Into<anyhow::Error>) -> ApiError {
    ApiError::internal(ErrorCode::AuthUnknown, e)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let email = normalize_email(&payload.email);
    let name = payload.name.trim();

    if state
        .users
        .find_by_email(&email)
        .await
        .map_err(auth_internal)?
        .is_some()
    {
        warn!(email = %email, "email already registered");
        return Err(ErrorCode::EmailInUse.into());
    }

    let hash = hash_password(&payload.password)
        .map_err(|e| auth_internal(e.context("hash password")))?;

    let user = match state.users.create(name, &email, &hash).await {
        Ok(u) => u,
        Err(StoreError::EmailTaken) => {
            warn!(email = %email, "email registered concurrently");
            return Err(ErrorCode::EmailInUse.into());
        }
        Err(e) => return Err(auth_internal(e)),
    };

    let token = JwtKeys::from_ref(&state)
        .sign(user.id, &user.email)
        .map_err(|e| auth_internal(e.context("sign token")))?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = normalize_email(&payload.email);

    let Some(user) = state
        .users
        .find_by_email(&email)
        .await
        .map_err(auth_internal)?
    else {
        warn!(email = %email, "login unknown email");
        return Err(ErrorCode::InvalidCredentials.into());
    };

    let ok = verify_password(&payload.password, &user.password_hash)
        .map_err(|e| auth_internal(e.context("verify password")))?;
    if !ok {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(ErrorCode::InvalidCredentials.into());
    }

    let token = JwtKeys::from_ref(&state)
        .sign(user.id, &user.email)
        .map_err(|e| auth_internal(e.context("sign token")))?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        success: true,
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user_id))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Envelope<PublicUser>>> {
    let user = state
        .users
        .find_by_id(auth.user_id)
        .await
        .map_err(auth_internal)?
        .ok_or_else(|| {
            warn!(user_id = %auth.user_id, "token subject no longer exists");
            ApiError::new(ErrorCode::Unauthorized)
        })?;

    Ok(Json(Envelope::ok(user.into())))
}
