//! Account endpoints
//!
//! Passwords arrive hashed by the client and are stored as given.

use crate::{ApiResult, AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Body of `/sign_up` and `/login`
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub hashed_password: String,
}

#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UsernameValidity {
    /// True when the username is still available
    pub validity: bool,
}

/// Unknown credentials answer `success: false` with null identity
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user_id: Option<i64>,
    pub username: Option<String>,
}

/// POST /sign_up
///
/// **Errors:**
/// - 400 Bad Request: empty username or password hash
/// - 409 Conflict: username taken
pub async fn sign_up(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<(StatusCode, Json<SignUpResponse>)> {
    let account = state
        .accounts
        .create_account(&credentials.username, &credentials.hashed_password)
        .await?;

    info!(user_id = account.user_id, "Sign-up completed");
    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            user_id: account.user_id,
            username: account.username,
        }),
    ))
}

/// POST /check_username?username=
pub async fn check_username(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> ApiResult<Json<UsernameValidity>> {
    let validity = state.accounts.is_username_available(&query.username).await?;
    Ok(Json(UsernameValidity { validity }))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<Json<LoginResponse>> {
    let account = state
        .accounts
        .authenticate(&credentials.username, &credentials.hashed_password)
        .await?;

    Ok(Json(match account {
        Some(account) => LoginResponse {
            success: true,
            user_id: Some(account.user_id),
            username: Some(account.username),
        },
        None => LoginResponse {
            success: false,
            user_id: None,
            username: None,
        },
    }))
}

/// Build account routes
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/sign_up", post(sign_up))
        .route("/check_username", post(check_username))
        .route("/login", post(login))
}
