use crate::auth::{AuthService, AuthState, CurrentUser};
use crate::web::api::{ApiError, ErrorResponse};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// JSON request payload for registration
#[derive(Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub identity: String,
    pub display_name: String,
    pub secret: String,
}

/// JSON request payload for login
#[derive(Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub identity: String,
    pub secret: String,
}

/// JSON response carrying a freshly issued session token
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// JSON response for the authenticated user's profile
#[derive(Serialize, Deserialize, Debug, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub identity: String,
    pub display_name: String,
}

/// Creates the public authentication router (register and login).
pub fn create_api_router(state: Arc<AuthState>) -> Router<()> {
    Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .with_state(state)
}

/// Creates the profile router. It must sit behind the access guard.
pub fn create_profile_router(state: Arc<AuthState>) -> Router<()> {
    Router::new()
        .route("/auth/profile", get(profile_handler))
        .with_state(state)
}

/// Registers a user and returns their first session token.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = TokenResponse),
        (status = 400, description = "Duplicate identity or invalid input", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register_handler(
    State(state): State<Arc<AuthState>>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<Json<TokenResponse>, ApiError> {
    let service = AuthService::new(&state.db, &state.tokens);
    let (_, token) = service
        .register(&payload.identity, &payload.display_name, &payload.secret)
        .await?;
    Ok(Json(TokenResponse { token }))
}

/// Handles JSON login requests and returns a session token.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login_handler(
    State(state): State<Arc<AuthState>>,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<Json<TokenResponse>, ApiError> {
    let service = AuthService::new(&state.db, &state.tokens);
    let token = service.login(&payload.identity, &payload.secret).await?;
    Ok(Json(TokenResponse { token }))
}

/// Returns the profile of the user the session token belongs to.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/auth/profile",
    responses(
        (status = 200, description = "Profile of the caller", body = ProfileResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("auth_token" = [])),
    tag = "Auth"
)]
pub async fn profile_handler(
    State(state): State<Arc<AuthState>>,
    user: CurrentUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let service = AuthService::new(&state.db, &state.tokens);
    let profile = service.profile(&user.identity).await?;
    Ok(Json(ProfileResponse {
        identity: profile.identity().to_string(),
        display_name: profile.display_name().to_string(),
    }))
}
