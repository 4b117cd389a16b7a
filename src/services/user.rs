//! User service
//!
//! Signup, login and profile management. Login issues a bearer token through
//! [`TokenService`]; there is no server-side session state.

use crate::cache::MemoryCache;
use crate::db::repositories::UserRepository;
use crate::metrics::{self, Event};
use crate::models::{validate_password, Email, ListParams, PagedResult, User, UserName, UserRole, ValidationError};
use crate::services::feed::invalidate_feed;
use crate::services::jwt::TokenService;
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Page size of the public user directory
pub const USERS_PER_PAGE: u32 = 18;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Email '{0}' is already registered")]
    EmailExists(String),

    #[error("Name '{0}' is already taken")]
    NameExists(String),

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationError> for UserServiceError {
    fn from(e: ValidationError) -> Self {
        UserServiceError::ValidationError(e.0)
    }
}

/// Input for signing up
#[derive(Debug, Clone, Deserialize)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Profile changes; absent fields stay as they are
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutput {
    pub access_token: String,
    pub token_type: &'static str,
    pub role: UserRole,
}

/// User service for accounts and authentication
///
/// Owner names appear in cached feed pages, so renames and deletions clear
/// the feed cache.
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    tokens: TokenService,
    cache: Arc<MemoryCache>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, tokens: TokenService, cache: Arc<MemoryCache>) -> Self {
        Self {
            user_repo,
            tokens,
            cache,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Register a new `USER`.
    ///
    /// Email uniqueness is checked before name uniqueness, so a request that
    /// collides on both reports `EmailExists`.
    pub async fn signup(&self, input: SignupInput) -> Result<User, UserServiceError> {
        let name = UserName::parse(&input.name)?;
        let email = Email::parse(&input.email)?;
        validate_password(&input.password)?;

        if self.user_repo.get_by_email(email.as_str()).await?.is_some() {
            return Err(UserServiceError::EmailExists(email.into_inner()));
        }
        if self.user_repo.get_by_name(name.as_str()).await?.is_some() {
            return Err(UserServiceError::NameExists(name.into_inner()));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = self
            .user_repo
            .create(&User::new(name, email, password_hash))
            .await?;

        tracing::info!(user_id = %user.id, "User signed up");
        metrics::record(Event::UserRegistration);
        Ok(user)
    }

    /// Check credentials and issue an access token.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutput, UserServiceError> {
        let email = email.trim().to_lowercase();
        let user = self
            .user_repo
            .get_by_email(&email)
            .await?
            .ok_or(UserServiceError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash).context("Failed to verify password")? {
            return Err(UserServiceError::InvalidCredentials);
        }

        let access_token = self
            .tokens
            .create_token(&user.id, user.role)
            .map_err(|e| UserServiceError::InternalError(anyhow::anyhow!(e)))?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(LoginOutput {
            access_token,
            token_type: "bearer",
            role: user.role,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_name(name.trim())
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Change name and/or password of `user_id`
    pub async fn update(&self, user_id: &str, input: UpdateUserInput) -> Result<User, UserServiceError> {
        let mut user = self.get_by_id(user_id).await?;
        let mut renamed = false;

        if let Some(raw) = input.name.as_deref() {
            let name = UserName::parse(raw)?;
            if name.as_str() != user.name {
                if let Some(existing) = self.user_repo.get_by_name(name.as_str()).await? {
                    if existing.id != user.id {
                        return Err(UserServiceError::NameExists(name.into_inner()));
                    }
                }
                user.name = name.into_inner();
                renamed = true;
            }
        }

        if let Some(password) = input.password.as_deref() {
            validate_password(password)?;
            user.password_hash = hash_password(password).context("Failed to hash password")?;
        }

        user.updated_at = Utc::now();
        let user = self.user_repo.update(&user).await?;
        if renamed {
            invalidate_feed(&self.cache).await;
        }
        tracing::info!(user_id = %user.id, "User profile updated");
        Ok(user)
    }

    pub async fn set_role(&self, user_id: &str, role: UserRole) -> Result<User, UserServiceError> {
        let mut user = self.get_by_id(user_id).await?;
        user.role = role;
        user.updated_at = Utc::now();
        let user = self.user_repo.update(&user).await?;
        tracing::info!(user_id = %user.id, role = %role, "User role changed");
        Ok(user)
    }

    /// Delete the account and, through cascading keys, everything it owns
    pub async fn delete(&self, user_id: &str) -> Result<(), UserServiceError> {
        if !self.user_repo.delete(user_id).await? {
            return Err(UserServiceError::NotFound);
        }
        invalidate_feed(&self.cache).await;
        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    pub async fn list(&self, params: &ListParams) -> Result<PagedResult<User>, UserServiceError> {
        let (users, total) = self.user_repo.list(params).await?;
        Ok(PagedResult::new(users, total, params))
    }
}
