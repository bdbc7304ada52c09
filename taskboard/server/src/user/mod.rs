use crate::entities::*;
use chrono::{DateTime, Utc};
use sea_orm::*;

pub mod password;

use password::PasswordError;

const IDENTITY_MIN_LEN: usize = 3;
const IDENTITY_MAX_LEN: usize = 64;
const DISPLAY_NAME_MAX_LEN: usize = 100;
const SECRET_MIN_LEN: usize = 6;
const SECRET_MAX_LEN: usize = 128;

#[derive(PartialEq, Clone, Eq)]
pub struct User {
    id: u32,
    identity: String,
    display_name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: u32,
        identity: String,
        display_name: String,
        password_hash: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            identity,
            display_name,
            password_hash,
            created_at,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the unique identity (login name) of the user.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the PHC-format Argon2 hash of the user's secret.
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("display_name", &self.display_name)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        User::new(
            model.id as u32,
            model.identity,
            model.display_name,
            model.password_hash,
            model.created_at,
        )
    }
}

/// Error type for UserService operations.
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// The identity is already taken by another user.
    #[error("User with identity '{0}' already exists")]
    DuplicateIdentity(String),
    /// The registration input is malformed.
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
}

/// Normalizes and validates an identity, returning the trimmed form.
pub fn validate_identity(identity: &str) -> Result<String, UserServiceError> {
    let identity = identity.trim();
    let length = identity.chars().count();
    if !(IDENTITY_MIN_LEN..=IDENTITY_MAX_LEN).contains(&length) {
        return Err(UserServiceError::Validation(format!(
            "identity must be between {} and {} characters",
            IDENTITY_MIN_LEN, IDENTITY_MAX_LEN
        )));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-');
    if !identity.chars().all(allowed) {
        return Err(UserServiceError::Validation(
            "identity may only contain letters, digits, '.', '_', '@' and '-'".to_string(),
        ));
    }
    Ok(identity.to_string())
}

pub fn validate_display_name(display_name: &str) -> Result<String, UserServiceError> {
    let display_name = display_name.trim();
    let length = display_name.chars().count();
    if length == 0 || length > DISPLAY_NAME_MAX_LEN {
        return Err(UserServiceError::Validation(format!(
            "display name must be between 1 and {} characters",
            DISPLAY_NAME_MAX_LEN
        )));
    }
    Ok(display_name.to_string())
}

pub fn validate_secret(secret: &str) -> Result<(), UserServiceError> {
    let length = secret.chars().count();
    if !(SECRET_MIN_LEN..=SECRET_MAX_LEN).contains(&length) {
        return Err(UserServiceError::Validation(format!(
            "secret must be between {} and {} characters",
            SECRET_MIN_LEN, SECRET_MAX_LEN
        )));
    }
    Ok(())
}

/// The credential store: persists users and their hashed secrets.
pub struct UserService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl UserService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> UserService<'_> {
        UserService { db }
    }

    /// Registers a new user.
    ///
    /// # Arguments
    ///
    /// * `identity` - The unique login name of the user.
    /// * `display_name` - The name shown in the UI.
    /// * `secret` - The plaintext secret. Only its Argon2 hash is persisted.
    ///
    /// # Returns
    ///
    /// The created `User`, or `DuplicateIdentity` if the identity is taken.
    #[tracing::instrument(skip(self, secret))]
    pub async fn register(
        &self,
        identity: &str,
        display_name: &str,
        secret: &str,
    ) -> Result<User, UserServiceError> {
        let identity = validate_identity(identity)?;
        let display_name = validate_display_name(display_name)?;
        validate_secret(secret)?;

        if self.identity_exists(&identity).await? {
            return Err(UserServiceError::DuplicateIdentity(identity));
        }

        let password_hash = password::hash_secret(secret.to_string()).await?;
        let active_model = user::ActiveModel {
            identity: ActiveValue::Set(identity.clone()),
            display_name: ActiveValue::Set(display_name),
            password_hash: ActiveValue::Set(password_hash),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        };

        // A concurrent registration can win between the check and the insert;
        // the unique index on `identity` settles it.
        let created_model = active_model
            .insert(self.db)
            .await
            .map_err(|err| match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    UserServiceError::DuplicateIdentity(identity.clone())
                }
                _ => UserServiceError::Database(err),
            })?;

        tracing::info!("Registered user {}", created_model.identity);
        Ok(User::from(created_model))
    }

    /// Retrieves a user by identity, or `None` if nobody registered it.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_identity(&self, identity: &str) -> Result<Option<User>, UserServiceError> {
        let user_model = user::Entity::find()
            .filter(user::Column::Identity.eq(identity.trim()))
            .one(self.db)
            .await?;
        Ok(user_model.map(User::from))
    }

    /// Checks a candidate secret against the user's stored hash.
    #[tracing::instrument(skip(self, secret))]
    pub async fn verify_secret(&self, user: &User, secret: &str) -> Result<bool, UserServiceError> {
        let matches =
            password::verify_secret(secret.to_string(), user.password_hash().to_string()).await?;
        Ok(matches)
    }

    #[tracing::instrument(skip(self))]
    async fn identity_exists(&self, identity: &str) -> Result<bool, UserServiceError> {
        let count = user::Entity::find()
            .filter(user::Column::Identity.eq(identity))
            .count(self.db)
            .await?;
        Ok(count > 0)
    }
}
