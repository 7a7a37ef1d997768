//! Credential store contract.
//!
//! The store exclusively owns principals and their embedded session and
//! verification state. All consistency guarantees (unique emails, single-use
//! codes, session overwrite) are enforced here by conditional operations, never
//! by read-then-write checks in the caller.

mod memory;
mod postgres;

pub use memory::{MemoryAdminStore, MemoryStore, MemoryUserStore};
pub use postgres::{PgAdminStore, PgUserStore, apply_schema};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::domain::{Principal, Session, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate email")]
    Duplicate,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations every principal kind supports.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    type Principal: Principal;

    /// Insert a new principal. Fails with [`StoreError::Duplicate`] when the
    /// email is taken; the check and the insert are one operation.
    async fn create(&self, principal: &Self::Principal) -> StoreResult<()>;

    /// Find an active principal by email and password digest.
    async fn get_by_credentials(
        &self,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Option<Self::Principal>>;

    /// Find the principal whose current session carries `refresh_token` and
    /// is still valid at `now`.
    async fn get_by_refresh_token(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Self::Principal>>;

    /// Find an active principal by id.
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Self::Principal>>;

    /// Unconditionally overwrite the principal's session.
    async fn set_session(
        &self,
        id: Uuid,
        session: &Session,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Overwrite the session only if the stored refresh token equals
    /// `previous_token`. Returns whether the swap happened.
    async fn replace_session(
        &self,
        id: Uuid,
        previous_token: &str,
        session: &Session,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

/// User-only operations.
#[async_trait]
pub trait UserStore: PrincipalStore<Principal = User> {
    /// Consume a pending verification code: mark the owner verified and clear
    /// the code in one conditional update. Returns the number of modified
    /// principals (0 or 1).
    async fn verify(&self, code: &str) -> StoreResult<u64>;
}
