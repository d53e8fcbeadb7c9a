// src/auth.rs

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::db::{StoreError, UserStore};
use crate::models::{
    LoginRequest, NewUser, RegisterRequest, UpdateUserRequest, User, UserChanges,
};
use crate::password::{is_hash, Passwords};
use crate::token::TokenKeys;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email already taken")]
    EmailTaken,

    /// Same message for unknown email and wrong password.
    #[error("incorrect credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("You do not have permission to update stripe_customer_id")]
    CustomerIdForbidden,

    #[error("stripe_customer_id already in use")]
    CustomerIdTaken,

    #[error("You do not have permission to set a password hash")]
    PasswordHashForbidden,

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(field) if field == "email" => AuthError::EmailTaken,
            StoreError::Conflict(field) if field == "stripe_customer_id" => {
                AuthError::CustomerIdTaken
            }
            StoreError::NotFound => AuthError::UserNotFound,
            other => AuthError::Store(other),
        }
    }
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    passwords: Passwords,
    tokens: Arc<TokenKeys>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, passwords: Passwords, tokens: Arc<TokenKeys>) -> Self {
        Self {
            users,
            passwords,
            tokens,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<User, AuthError> {
        let email = normalize_email(&req.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.passwords.hash(&req.password)?;
        // a concurrent register can still trip the unique index; From maps it to EmailTaken
        let user = self
            .users
            .insert(NewUser {
                name: req.name.trim().to_string(),
                email,
                password_hash,
            })
            .await?;

        log::info!("user registered user_id={}", user.id);
        Ok(user)
    }

    /// Returns the signed session token with the user.
    pub async fn login(&self, req: LoginRequest) -> Result<(String, User), AuthError> {
        let email = normalize_email(&req.email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            self.passwords.verify_dummy(&req.password);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.passwords.verify(&req.password, &user.password_hash) {
            log::debug!("password mismatch user_id={}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(user.id)?;
        Ok((token, user))
    }

    pub async fn current_user(&self, id: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// `privileged` callers may also set or clear the Stripe customer id and
    /// store a ready-made bcrypt hash as the password. Only the columns named
    /// in the request are written; the plan never is.
    pub async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
        privileged: bool,
    ) -> Result<User, AuthError> {
        if req.stripe_customer_id.is_some() && !privileged {
            return Err(AuthError::CustomerIdForbidden);
        }

        let password_hash = match req.password {
            Some(password) if is_hash(&password) && !privileged => {
                return Err(AuthError::PasswordHashForbidden);
            }
            Some(password) => Some(self.passwords.prepare(&password)?),
            None => None,
        };

        let changes = UserChanges {
            name: req.name.map(|name| name.trim().to_string()),
            password_hash,
            stripe_customer_id: req.stripe_customer_id.map(|customer_id| {
                customer_id
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
            }),
        };

        let user = self.users.update_profile(id, changes).await?;
        log::info!("user updated user_id={} privileged={privileged}", user.id);
        Ok(user)
    }
}
