use std::sync::Arc;

use crate::{
    auth::{self, AuthServiceError, AuthState},
    task::{self, TaskServiceError, api::TaskState},
    user::UserServiceError,
};

use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// Name of the OpenAPI security scheme for the session token header.
pub const SECURITY_SCHEME: &str = "auth_token";

/// JSON body returned for every API error.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Machine readable error code
    pub error: String,
    /// Human readable description
    pub message: String,
}

/// Errors as the API client sees them. Internal causes are logged where they are
/// converted and never reach the response body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("This identity is already registered")]
    DuplicateIdentity,
    #[error("Invalid identity or secret")]
    InvalidCredentials,
    #[error("Authentication required to access this resource")]
    Unauthenticated,
    #[error("Task not found")]
    NotFound,
    #[error("The service is temporarily unavailable. Please try again later.")]
    Unavailable,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateIdentity => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::DuplicateIdentity => "DUPLICATE_IDENTITY",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::Unauthenticated => "UNAUTHORIZED",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Unavailable => "UNAVAILABLE",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_response = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status_code(), Json(error_response)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::DuplicateIdentity(_) => ApiError::DuplicateIdentity,
            UserServiceError::Validation(message) => ApiError::Validation(message),
            other => {
                tracing::error!("User service failure: {}", other);
                ApiError::Unavailable
            }
        }
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthServiceError::UnknownUser(identity) => {
                tracing::warn!("Valid token for unknown user {}", identity);
                ApiError::Unauthenticated
            }
            AuthServiceError::User(err) => ApiError::from(err),
            AuthServiceError::Token(err) => {
                tracing::error!("Token failure: {}", err);
                ApiError::Unavailable
            }
        }
    }
}

impl From<TaskServiceError> for ApiError {
    fn from(err: TaskServiceError) -> Self {
        match err {
            TaskServiceError::Validation(message) => ApiError::Validation(message),
            TaskServiceError::NotFound(_) => ApiError::NotFound,
            // Reported like a missing task so other users' ids are not confirmed.
            TaskServiceError::Forbidden(id) => {
                tracing::warn!("Refused access to task {} owned by another user", id);
                ApiError::NotFound
            }
            TaskServiceError::UnknownOwner(identity) => {
                tracing::warn!("Valid token for unknown user {}", identity);
                ApiError::Unauthenticated
            }
            TaskServiceError::Database(err) => {
                tracing::error!("Task service failure: {}", err);
                ApiError::Unavailable
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::NotFound
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                SECURITY_SCHEME,
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    auth::AUTH_TOKEN_HEADER,
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::api::register_handler,
        auth::api::login_handler,
        auth::api::profile_handler,
        task::api::create_task_handler,
        task::api::list_tasks_handler,
        task::api::delete_task_handler,
    ),
    components(schemas(
        ErrorResponse,
        auth::api::RegisterRequest,
        auth::api::LoginRequest,
        auth::api::TokenResponse,
        auth::api::ProfileResponse,
        task::api::CreateTaskRequest,
        task::api::TaskJson,
        task::api::DeleteTaskResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and profile"),
        (name = "Tasks", description = "Tasks owned by the authenticated user")
    )
)]
pub struct ApiDoc;

/// Creates the API routes for JSON API endpoints, mounted under `/api`.
pub fn create_api_router(auth_state: Arc<AuthState>, task_state: Arc<TaskState>) -> Router {
    let public_routes = auth::api::create_api_router(auth_state.clone());
    let protected_routes = auth::api::create_profile_router(auth_state.clone())
        .merge(task::api::create_api_router(task_state))
        .layer(ServiceBuilder::new().layer(from_fn(auth::require_auth_middleware)));
    let api_routes = public_routes.merge(protected_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(from_fn_with_state(
            auth_state,
            auth::auth_user_middleware,
        )))
}

/// Creates the Swagger UI router serving the OpenAPI document.
pub fn create_docs_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn can_hide_internal_errors() {
        let err = ApiError::from(TaskServiceError::Database(sea_orm::DbErr::Custom(
            "relation \"tasks\" does not exist".to_string(),
        )));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "UNAVAILABLE");
        assert!(!error.message.contains("relation"));
    }

    #[test]
    fn forbidden_is_reported_as_not_found() {
        let forbidden = ApiError::from(TaskServiceError::Forbidden(7));
        let missing = ApiError::from(TaskServiceError::NotFound(7));

        assert_eq!(forbidden.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(forbidden.code(), missing.code());
        assert_eq!(forbidden.to_string(), missing.to_string());
    }

    #[test]
    fn can_map_error_taxonomy_to_status_codes() {
        assert_eq!(
            ApiError::from(UserServiceError::DuplicateIdentity("alice".to_string())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthServiceError::InvalidCredentials).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthServiceError::UnknownUser("ghost".to_string())).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(TaskServiceError::Validation("title".to_string())).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn openapi_document_lists_all_routes() {
        let doc = ApiDoc::openapi();

        for path in [
            "/api/auth/register",
            "/api/auth/login",
            "/api/auth/profile",
            "/api/tasks",
            "/api/tasks/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key(SECURITY_SCHEME));
    }
}
