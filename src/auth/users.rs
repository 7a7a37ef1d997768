//! End-user accounts: sign-up with email verification, then sessions.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::code::CodeGenerator;
use super::domain::{Tokens, User};
use super::error::{AuthError, Result};
use super::notify::Notifier;
use super::session::SessionIssuer;
use super::store::UserStore;
use super::tasks::ListRegistrar;
use super::utils::{normalize_email, valid_email};

pub struct UsersService<S> {
    sessions: SessionIssuer<S>,
    codes: Arc<dyn CodeGenerator>,
    notifier: Arc<dyn Notifier>,
    registrar: ListRegistrar,
}

impl<S: UserStore> UsersService<S> {
    #[must_use]
    pub fn new(
        sessions: SessionIssuer<S>,
        codes: Arc<dyn CodeGenerator>,
        notifier: Arc<dyn Notifier>,
        registrar: ListRegistrar,
    ) -> Self {
        Self {
            sessions,
            codes,
            notifier,
            registrar,
        }
    }

    /// Register an unverified user and send the verification email.
    ///
    /// Mailing-list registration is queued in the background and never
    /// affects the result.
    ///
    /// # Errors
    /// `InvalidEmail`, `AlreadyExists`, or `Notification` when the
    /// verification email cannot be sent. In the last case the account has
    /// already been stored.
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<()> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }

        let password_hash = self.sessions.hash_password(password)?;
        let code = self
            .codes
            .random(self.sessions.config().verification_code_length());
        let user = User::new(
            name.to_string(),
            email.clone(),
            password_hash,
            code.clone(),
            Utc::now(),
        );

        self.sessions.store().create(&user).await?;
        info!(user_id = %user.id, "user registered");

        self.registrar.submit(name, &email);

        self.notifier
            .send_verification_email(&email, name, &code)
            .await
            .map_err(|err| {
                warn!(user_id = %user.id, "verification email failed: {err:#}");
                AuthError::Notification(err)
            })
    }

    /// # Errors
    /// `NotFound` for unknown, unverified or mismatched credentials.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Tokens> {
        self.sessions
            .sign_in(&normalize_email(email), password)
            .await
    }

    /// # Errors
    /// `NotFound` when the refresh token is unknown or expired.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<Tokens> {
        self.sessions.refresh(refresh_token).await
    }

    /// Consume a verification code.
    ///
    /// # Errors
    /// `InvalidCode` when no pending verification carries this code.
    #[instrument(skip_all)]
    pub async fn verify(&self, code: &str) -> Result<()> {
        let modified = self.sessions.store().verify(code).await?;
        if modified == 0 {
            return Err(AuthError::InvalidCode);
        }
        debug!("verification code consumed");
        Ok(())
    }

    /// Verified users only.
    ///
    /// # Errors
    /// `NotFound` for unknown or unverified users.
    pub async fn get_by_id(&self, id: Uuid) -> Result<User> {
        self.sessions.get_by_id(id).await
    }
}
