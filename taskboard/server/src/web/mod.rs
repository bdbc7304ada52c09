use askama::Template;
use axum::Router;
use axum::extract::Extension;
use axum::http::{HeaderName, Method, StatusCode, header};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{Html, IntoResponse, Redirect, Response};
use migration::MigratorTrait;
use sea_orm::Database;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{
    AUTH_TOKEN_HEADER, AuthState, CurrentUser, FilteredMakeSpan, TOKEN_COOKIE,
    login_redirect_middleware, page_user_middleware,
};
use crate::config::{self, Config};
use crate::task::api::TaskState;

pub mod api;

/// Custom error type for web handler operations.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Represents an error during template rendering.
    /// The specific `askama::Error` is captured as the source of this error.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        tracing::error!("Page rendering failed: {}", self);
        let user_facing_error_message =
            "An unexpected error occurred while processing your request. Please try again later.";
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!(
                "<h1>Internal Server Error</h1><p>{}</p>",
                user_facing_error_message
            )),
        )
            .into_response()
    }
}

/// Builds the complete application: JSON API, API docs and web pages.
pub fn create_app(config: &Config, db: sea_orm::DatabaseConnection) -> Router {
    let db = Arc::new(db);
    let auth_state = Arc::new(AuthState::from_config(config, db.clone()));
    let task_state = Arc::new(TaskState { db });

    let protected_pages = Router::new()
        .route("/dashboard", axum::routing::get(dashboard_handler))
        .layer(from_fn(login_redirect_middleware));

    let pages = Router::new()
        .route("/", axum::routing::get(entry_page_handler))
        .merge(protected_pages)
        .layer(from_fn_with_state(auth_state.clone(), page_user_middleware));

    let public_routes =
        Router::new().route("/health", axum::routing::get(health_check_handler));

    Router::new()
        .merge(api::create_api_router(auth_state, task_state))
        .merge(api::create_docs_router())
        .merge(pages)
        .merge(public_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveRequestHeadersLayer::new([
                    HeaderName::from_static(AUTH_TOKEN_HEADER),
                    header::AUTHORIZATION,
                    header::COOKIE,
                ]))
                .layer(TraceLayer::new_for_http().make_span_with(FilteredMakeSpan))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::DELETE])
                        .allow_headers([
                            header::CONTENT_TYPE,
                            HeaderName::from_static(AUTH_TOKEN_HEADER),
                        ]),
                ),
        )
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: config::Config) -> anyhow::Result<()> {
    let db = Database::connect(&config.db_url).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let app = create_app(&config, db);

    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!("Failed to listen for SIGTERM: {}", err),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

/// Entry page with the login/registration form. Signed-in visitors go straight
/// to the dashboard.
#[tracing::instrument]
pub async fn entry_page_handler(
    current_user: Option<Extension<CurrentUser>>,
) -> Result<Response, WebError> {
    if current_user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let template = EntryTemplate::new();
    let html = template.render()?;
    Ok(Html(html).into_response())
}

#[tracing::instrument]
pub async fn dashboard_handler(
    Extension(user): Extension<CurrentUser>,
) -> Result<Html<String>, WebError> {
    let template = DashboardTemplate::new(user.identity);
    template.render().map(Html).map_err(WebError::from)
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct EntryTemplate {
    token_cookie: &'static str,
}

impl EntryTemplate {
    pub fn new() -> Self {
        Self {
            token_cookie: TOKEN_COOKIE,
        }
    }
}

impl Default for EntryTemplate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    identity: String,
    token_cookie: &'static str,
    token_header: &'static str,
}

impl DashboardTemplate {
    pub fn new(identity: String) -> Self {
        Self {
            identity,
            token_cookie: TOKEN_COOKIE,
            token_header: AUTH_TOKEN_HEADER,
        }
    }
}
