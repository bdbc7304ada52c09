//! Typed HTTP client for the taskboard API.
//!
//! The client keeps the session token in a [`TokenStore`], attaches it to every
//! protected request and forgets it as soon as the server rejects it.

use std::sync::{PoisonError, RwLock};

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;

use crate::auth::AUTH_TOKEN_HEADER;
use crate::auth::api::{LoginRequest, ProfileResponse, RegisterRequest, TokenResponse};
use crate::task::api::{CreateTaskRequest, TaskJson};
use crate::web::api::ErrorResponse;

/// Where the client keeps its session token between requests.
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str);
    fn clear(&self);
}

/// Keeps the token in memory for the lifetime of the client.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn save(&self, token: &str) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No token is stored, or the server no longer accepts it.
    #[error("Not signed in")]
    SignedOut,
    /// The server answered with an error body.
    #[error("Request rejected with {status}: {message}")]
    Rejected {
        status: StatusCode,
        error: String,
        message: String,
    },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub struct TaskboardClient<S: TokenStore> {
    http: reqwest::Client,
    base_url: String,
    store: S,
}

impl<S: TokenStore> TaskboardClient<S> {
    /// Creates a client for the server at `base_url`, e.g. `http://localhost:5001`.
    pub fn new(base_url: impl Into<String>, store: S) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.store.load().is_some()
    }

    #[tracing::instrument(skip(self, secret))]
    pub async fn register(
        &self,
        identity: &str,
        display_name: &str,
        secret: &str,
    ) -> Result<(), ClientError> {
        let payload = RegisterRequest {
            identity: identity.to_string(),
            display_name: display_name.to_string(),
            secret: secret.to_string(),
        };
        self.obtain_token("/api/auth/register", &payload).await
    }

    #[tracing::instrument(skip(self, secret))]
    pub async fn login(&self, identity: &str, secret: &str) -> Result<(), ClientError> {
        let payload = LoginRequest {
            identity: identity.to_string(),
            secret: secret.to_string(),
        };
        self.obtain_token("/api/auth/login", &payload).await
    }

    /// Forgets the session token. The server keeps no session, so there is
    /// nothing to tell it.
    pub fn logout(&self) {
        self.store.clear();
    }

    pub async fn profile(&self) -> Result<ProfileResponse, ClientError> {
        let request = self.http.get(self.url("/api/auth/profile"));
        let response = self.send_authenticated(request).await?;
        Ok(response.json().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_task(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<TaskJson, ClientError> {
        let payload = CreateTaskRequest {
            title: title.to_string(),
            description: description.map(str::to_string),
        };
        let request = self.http.post(self.url("/api/tasks")).json(&payload);
        let response = self.send_authenticated(request).await?;
        Ok(response.json().await?)
    }

    /// Lists the caller's tasks, optionally narrowed by a title search.
    pub async fn list_tasks(&self, search: Option<&str>) -> Result<Vec<TaskJson>, ClientError> {
        let mut request = self.http.get(self.url("/api/tasks"));
        if let Some(search) = search {
            request = request.query(&[("search", search)]);
        }
        let response = self.send_authenticated(request).await?;
        Ok(response.json().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, id: u32) -> Result<(), ClientError> {
        let request = self.http.delete(self.url(&format!("/api/tasks/{}", id)));
        self.send_authenticated(request).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn obtain_token<T: Serialize>(&self, path: &str, payload: &T) -> Result<(), ClientError> {
        let response = self.http.post(self.url(path)).json(payload).send().await?;
        let response = check_status(response).await?;
        let TokenResponse { token } = response.json().await?;
        self.store.save(&token);
        Ok(())
    }

    async fn send_authenticated(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let Some(token) = self.store.load() else {
            return Err(ClientError::SignedOut);
        };

        let response = request.header(AUTH_TOKEN_HEADER, token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!("Session token rejected, signing out");
            self.store.clear();
            return Err(ClientError::SignedOut);
        }
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match response.json::<ErrorResponse>().await {
        Ok(body) => Err(ClientError::Rejected {
            status,
            error: body.error,
            message: body.message,
        }),
        Err(_) => Err(ClientError::Rejected {
            status,
            error: "UNKNOWN".to_string(),
            message: status.to_string(),
        }),
    }
}
