use axum::extract::{FromRequestParts, MatchedPath, Request, State};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use tower_http::trace::MakeSpan;
use tracing::Span;

use crate::config::Config;
use crate::user::password::{self, DUMMY_HASH};
use crate::user::{User, UserService, UserServiceError};
use crate::web::api::ApiError;

pub mod api;

/// Request header carrying the session token.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";
/// Cookie in which the web pages keep the session token.
pub const TOKEN_COOKIE: &str = "token";

/// Represents the currently authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub identity: String,
}

impl CurrentUser {
    pub fn new(identity: String) -> Self {
        Self { identity }
    }
}

/// Resolves the identity injected by [`auth_user_middleware`]. Rejects with
/// `Unauthenticated` when the guard did not run or found no valid token.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // Identity of the authenticated user
    pub iat: usize,  // Issued at time of the token
    pub exp: usize,  // Expiry time of the token
    pub jti: String, // Unique token id
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Malformed token, bad signature, wrong algorithm or missing claims.
    #[error("Token is invalid")]
    Invalid,
    /// Correctly signed, but past its expiry.
    #[error("Token has expired")]
    Expired,
    /// Issue time plus lifetime does not fit in a timestamp.
    #[error("Token expiry is out of range")]
    ExpiryOutOfRange,
    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Issues and verifies HS256-signed session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Issues a token for `identity` valid from now until now + ttl.
    pub fn issue(&self, identity: &str) -> Result<String, TokenError> {
        self.issue_at(identity, Utc::now())
    }

    /// Issues a token as if it had been issued at `issued_at`.
    pub fn issue_at(&self, identity: &str, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let claims = Claims {
            sub: identity.to_string(),
            iat: issued_at.timestamp().max(0) as usize,
            exp: expires_at.timestamp().max(0) as usize,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Verifies the signature and then the expiry of `token`.
    ///
    /// A token that fails the signature check is `Invalid` whatever its expiry says,
    /// so only tokens we actually issued can be reported as `Expired`.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

/// Authentication state shared by the auth routes and the access guard.
#[derive(Clone)]
pub struct AuthState {
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub tokens: TokenIssuer,
}

impl AuthState {
    /// Creates a new AuthState from the application config.
    pub fn from_config(config: &Config, db: Arc<sea_orm::DatabaseConnection>) -> Self {
        Self {
            db,
            tokens: TokenIssuer::new(&config.jwt_secret, config.token_ttl()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    /// Unknown identity or wrong secret; deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// A valid token names a user that is not in the credential store.
    #[error("User '{0}' does not exist")]
    UnknownUser(String),
    #[error("User service error: {0}")]
    User(#[from] UserServiceError),
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

/// Login and registration flows on top of the credential store and the token issuer.
pub struct AuthService<'a> {
    users: UserService<'a>,
    tokens: &'a TokenIssuer,
}

impl<'a> AuthService<'a> {
    pub fn new(db: &'a sea_orm::DatabaseConnection, tokens: &'a TokenIssuer) -> Self {
        Self {
            users: UserService::new(db),
            tokens,
        }
    }

    /// Registers a user and issues their first session token.
    #[tracing::instrument(skip(self, secret))]
    pub async fn register(
        &self,
        identity: &str,
        display_name: &str,
        secret: &str,
    ) -> Result<(User, String), AuthServiceError> {
        let user = self.users.register(identity, display_name, secret).await?;
        let token = self.tokens.issue(user.identity())?;
        Ok((user, token))
    }

    /// Checks the credentials and issues a session token.
    ///
    /// Unknown identities still pay for one hash verification, so neither the
    /// error nor the response time tells a caller whether the identity exists.
    #[tracing::instrument(skip(self, secret))]
    pub async fn login(&self, identity: &str, secret: &str) -> Result<String, AuthServiceError> {
        let Some(user) = self.users.find_by_identity(identity).await? else {
            password::verify_secret(secret.to_string(), DUMMY_HASH.to_string())
                .await
                .map_err(UserServiceError::from)?;
            tracing::info!("Login rejected");
            return Err(AuthServiceError::InvalidCredentials);
        };

        if !self.users.verify_secret(&user, secret).await? {
            tracing::info!("Login rejected");
            return Err(AuthServiceError::InvalidCredentials);
        }

        Ok(self.tokens.issue(user.identity())?)
    }

    /// Looks up the profile of an authenticated identity.
    #[tracing::instrument(skip(self))]
    pub async fn profile(&self, identity: &str) -> Result<User, AuthServiceError> {
        self.users
            .find_by_identity(identity)
            .await?
            .ok_or_else(|| AuthServiceError::UnknownUser(identity.to_string()))
    }
}

/// Extracts the session token from `x-auth-token`, falling back to
/// `Authorization: Bearer`.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        return Some(token);
    }

    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// API authentication middleware that checks the token header and sets the
/// CurrentUser extension. It never rejects; see [`require_auth_middleware`].
pub async fn auth_user_middleware(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(&headers) {
        match state.tokens.verify(token) {
            Ok(claims) => {
                request
                    .extensions_mut()
                    .insert(CurrentUser::new(claims.sub));
            }
            Err(err) => tracing::debug!("Ignoring session token: {}", err),
        }
    }

    next.run(request).await
}

/// Middleware that rejects requests without an authenticated CurrentUser.
/// This middleware should be applied after auth_user_middleware.
pub async fn require_auth_middleware(request: Request, next: Next) -> Response {
    let is_authenticated = request.extensions().get::<CurrentUser>().is_some();

    if !is_authenticated {
        return ApiError::Unauthenticated.into_response();
    }

    next.run(request).await
}

/// Page authentication middleware that reads the token cookie set by the web UI.
pub async fn page_user_middleware(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token_cookie) = jar.get(TOKEN_COOKIE) {
        if let Ok(claims) = state.tokens.verify(token_cookie.value()) {
            request
                .extensions_mut()
                .insert(CurrentUser::new(claims.sub));
        }
    }

    next.run(request).await
}

/// Redirects unauthenticated page requests to the entry page.
/// This middleware should be applied after page_user_middleware.
pub async fn login_redirect_middleware(request: Request, next: Next) -> Response {
    let is_authenticated = request.extensions().get::<CurrentUser>().is_some();

    if !is_authenticated {
        return Redirect::to("/").into_response();
    }

    next.run(request).await
}

/// Custom span maker that keeps credential-bearing auth routes out of the logs.
#[derive(Clone, Debug)]
pub struct FilteredMakeSpan;

impl<B> MakeSpan<B> for FilteredMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let uri = request.uri();
        let method = request.method();
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        if uri.path().starts_with("/api/auth/") {
            tracing::info_span!(
                "request",
                method = %method,
                path = %uri.path(),
                matched_path,
                sensitive_route = true,
            )
        } else {
            tracing::info_span!(
                "request",
                method = %method,
                uri = %uri,
                matched_path,
            )
        }
    }
}
