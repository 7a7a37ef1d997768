//! Session issuance shared by every principal kind.
//!
//! `SessionIssuer` holds no principal state. Each call re-reads the store, and
//! issuing a session overwrites whatever session the principal had before, so
//! every sign-in and every refresh rotates the refresh token.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::config::{AuthConfig, RotationPolicy};
use super::domain::{Principal, Session, Tokens};
use super::error::{AuthError, Result};
use super::hash::PasswordHasher;
use super::store::PrincipalStore;
use super::token::{TokenError, TokenIssuer};

pub struct SessionIssuer<S> {
    store: Arc<S>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenIssuer>,
    config: AuthConfig,
}

impl<S> Clone for SessionIssuer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            hasher: Arc::clone(&self.hasher),
            tokens: Arc::clone(&self.tokens),
            config: self.config.clone(),
        }
    }
}

impl<S: PrincipalStore> SessionIssuer<S> {
    #[must_use]
    pub fn new(
        store: Arc<S>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        Ok(self.hasher.hash(password)?)
    }

    /// Authenticate by email and password, then issue a new session.
    ///
    /// # Errors
    /// `NotFound` for an unknown email, a wrong password or an inactive
    /// principal alike.
    #[instrument(skip_all, fields(kind = %<S::Principal as Principal>::KIND))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Tokens> {
        let password_hash = self.hash_password(password)?;
        let principal = self
            .store
            .get_by_credentials(email, &password_hash)
            .await?
            .ok_or(AuthError::NotFound)?;
        self.create_session(principal.id()).await
    }

    /// Exchange a valid refresh token for a new token pair. The presented
    /// token stops working as soon as the new session is stored.
    ///
    /// # Errors
    /// `NotFound` if the token is unknown, expired, or (under
    /// [`RotationPolicy::CompareAndSwap`]) was rotated concurrently.
    #[instrument(skip_all, fields(kind = %<S::Principal as Principal>::KIND))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        let principal = self
            .store
            .get_by_refresh_token(refresh_token, Utc::now())
            .await?
            .ok_or(AuthError::NotFound)?;

        match self.config.rotation() {
            RotationPolicy::LastWriteWins => self.create_session(principal.id()).await,
            RotationPolicy::CompareAndSwap => {
                self.rotate_session(principal.id(), refresh_token).await
            }
        }
    }

    /// # Errors
    /// `NotFound` if no active principal has this id.
    #[instrument(skip(self), fields(kind = %<S::Principal as Principal>::KIND))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<S::Principal> {
        self.store.get_by_id(id).await?.ok_or(AuthError::NotFound)
    }

    /// Mint a token pair for `id` and overwrite the stored session.
    ///
    /// # Errors
    /// Token or storage failures. The tokens are lost if the write fails.
    #[instrument(skip(self), fields(kind = %<S::Principal as Principal>::KIND))]
    pub async fn create_session(&self, id: Uuid) -> Result<Tokens> {
        let (tokens, session) = self.mint(id)?;
        self.store.set_session(id, &session, Utc::now()).await?;
        debug!("session issued");
        Ok(tokens)
    }

    async fn rotate_session(&self, id: Uuid, previous_token: &str) -> Result<Tokens> {
        let (tokens, session) = self.mint(id)?;
        let swapped = self
            .store
            .replace_session(id, previous_token, &session, Utc::now())
            .await?;
        if !swapped {
            debug!("refresh token rotated concurrently");
            return Err(AuthError::NotFound);
        }
        debug!("session rotated");
        Ok(tokens)
    }

    fn mint(&self, id: Uuid) -> Result<(Tokens, Session)> {
        let access_ttl = self
            .config
            .access_token_ttl()
            .ok_or(TokenError::InvalidTtl)?;
        let expires_at = self
            .config
            .refresh_token_ttl()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or(TokenError::InvalidTtl)?;

        let access_token = self.tokens.signed_token(&id.to_string(), access_ttl)?;
        let refresh_token = self.tokens.opaque_token()?;
        let session = Session {
            refresh_token: refresh_token.clone(),
            expires_at,
        };
        Ok((
            Tokens {
                access_token,
                refresh_token,
            },
            session,
        ))
    }
}
