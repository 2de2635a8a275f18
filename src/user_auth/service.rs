use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::password::{PasswordError, check_password, hash_password};
use crate::models::{CreateUserParams, User};
use crate::store::{Store, TxBackend, TxError};
use crate::token::{TokenAuthenticator, TokenError};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] TxError),
}

/// User registration input, already validated by the caller
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
}

/// Login result: access token plus the user it was issued to
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub user: User,
}

pub struct UserAuthService<B: TxBackend> {
    store: Arc<Store<B>>,
    tokens: Arc<dyn TokenAuthenticator>,
    access_token_duration: Duration,
}

impl<B: TxBackend> UserAuthService<B> {
    pub fn new(
        store: Arc<Store<B>>,
        tokens: Arc<dyn TokenAuthenticator>,
        access_token_duration: Duration,
    ) -> Self {
        Self {
            store,
            tokens,
            access_token_duration,
        }
    }

    /// Register a new user
    pub async fn register(&self, req: RegisterUser) -> Result<User, AuthError> {
        let hashed_password = hash_password(&req.password)?;
        let user = self
            .store
            .create_user(CreateUserParams {
                username: req.username,
                hashed_password,
                full_name: req.full_name,
                email: req.email,
            })
            .await?;

        info!(username = %user.username, "user registered");
        Ok(user)
    }

    /// Login user and issue an access token
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let user = match self.store.get_user(username).await {
            Ok(user) => user,
            Err(TxError::StepFailed(e)) if e.is_not_found() => {
                warn!(username, "login for unknown user");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        match check_password(password, &user.hashed_password) {
            Ok(()) => {}
            Err(PasswordError::Mismatch) => {
                warn!(username, "login with wrong password");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        }

        let (access_token, payload) = self
            .tokens
            .create_token(&user.username, self.access_token_duration)?;

        Ok(LoginResponse {
            access_token,
            access_token_expires_at: payload.expires_at,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBackend, StoreError};
    use crate::token::JwtAuthenticator;

    fn service() -> UserAuthService<MemoryBackend> {
        let tokens = JwtAuthenticator::new("0123456789abcdef0123456789abcdef").unwrap();
        UserAuthService::new(
            Arc::new(Store::new(MemoryBackend::new())),
            Arc::new(tokens),
            Duration::from_secs(60),
        )
    }

    fn alice() -> RegisterUser {
        RegisterUser {
            username: "alice".into(),
            password: "secret123".into(),
            full_name: "Alice Liddell".into(),
            email: "alice@example.com".into(),
        }
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let svc = service();
        let user = svc.register(alice()).await.unwrap();
        assert_eq!(user.username, "alice");
        assert_ne!(user.hashed_password, "secret123");
        assert!(check_password("secret123", &user.hashed_password).is_ok());
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let svc = service();
        svc.register(alice()).await.unwrap();
        let mut again = alice();
        again.email = "other@example.com".into();

        let err = svc.register(again).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Store(TxError::StepFailed(StoreError::Duplicate { entity: "user", .. }))
        ));
    }

    #[tokio::test]
    async fn test_login_issues_verifiable_token() {
        let svc = service();
        svc.register(alice()).await.unwrap();

        let resp = svc.login("alice", "secret123").await.unwrap();
        assert_eq!(resp.user.username, "alice");
        let payload = svc.tokens.verify(&resp.access_token).unwrap();
        assert_eq!(payload.username, "alice");
        assert_eq!(
            payload.expires_at.timestamp(),
            resp.access_token_expires_at.timestamp()
        );
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let svc = service();
        svc.register(alice()).await.unwrap();

        assert!(matches!(
            svc.login("alice", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.login("nobody", "secret123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
