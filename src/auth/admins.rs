//! Administrator accounts. Admins have no verification workflow and may sign
//! in as soon as they are created.

use tracing::{info, instrument};
use uuid::Uuid;

use super::domain::{Admin, Tokens};
use super::error::{AuthError, Result};
use super::session::SessionIssuer;
use super::store::PrincipalStore;
use super::utils::{normalize_email, valid_email};

pub struct AdminsService<S> {
    sessions: SessionIssuer<S>,
}

impl<S: PrincipalStore<Principal = Admin>> AdminsService<S> {
    #[must_use]
    pub fn new(sessions: SessionIssuer<S>) -> Self {
        Self { sessions }
    }

    /// Provision an admin.
    ///
    /// # Errors
    /// `InvalidEmail` or `AlreadyExists`.
    #[instrument(skip(self, password))]
    pub async fn create(&self, name: &str, email: &str, password: &str) -> Result<Admin> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        let admin = Admin::new(
            name.to_string(),
            email,
            self.sessions.hash_password(password)?,
        );
        self.sessions.store().create(&admin).await?;
        info!(admin_id = %admin.id, "admin created");
        Ok(admin)
    }

    /// # Errors
    /// `NotFound` for unknown or mismatched credentials.
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

    /// # Errors
    /// `NotFound` for an unknown id.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Admin> {
        self.sessions.get_by_id(id).await
    }
}
