//! Authentication and session lifecycle.
//!
//! The session manager is the only entry point other layers call. It signs
//! principals up and in, rotates refresh tokens and consumes verification
//! codes, delegating every consistency guarantee to the credential store:
//!
//! - **Email uniqueness** comes from the store's insert, never from a prior read.
//! - **Verification codes** are consumed by one conditional update; a second
//!   attempt with the same code modifies nothing and yields `InvalidCode`.
//! - **Sessions** are embedded in the principal, one at a time. Each sign-in or
//!   refresh overwrites the previous session, invalidating its refresh token.
//!
//! Failures to authenticate are reported as `NotFound` regardless of whether
//! the email is unknown, the password wrong, the account unverified or the
//! refresh token expired.

pub mod admins;
pub mod code;
pub mod config;
pub mod domain;
pub mod error;
pub mod hash;
pub mod notify;
pub mod session;
pub mod store;
pub mod tasks;
pub mod token;
pub mod users;

mod utils;

use std::sync::Arc;

pub use admins::AdminsService;
pub use code::{CodeGenerator, RandomCodeGenerator};
pub use config::{AuthConfig, MAX_TOKEN_TTL_SECONDS, RotationPolicy};
pub use domain::{Admin, AdminProfile, Principal, PrincipalKind, Session, Tokens, User, UserProfile};
pub use error::AuthError;
pub use hash::{Argon2Hasher, PasswordHasher};
pub use notify::{HttpNotifier, LogNotifier, Notifier};
pub use session::SessionIssuer;
pub use store::{PrincipalStore, StoreError, UserStore};
pub use tasks::{ListRegistrar, RegistrarConfig};
pub use token::{JwtIssuer, TokenIssuer};
pub use users::UsersService;

/// Collaborators shared by the user and admin services.
#[derive(Clone)]
pub struct Collaborators {
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn TokenIssuer>,
    pub codes: Arc<dyn CodeGenerator>,
    pub notifier: Arc<dyn Notifier>,
    pub registrar: ListRegistrar,
}

pub struct SessionManager<U, A> {
    users: UsersService<U>,
    admins: AdminsService<A>,
}

impl<U, A> SessionManager<U, A>
where
    U: UserStore,
    A: PrincipalStore<Principal = Admin>,
{
    #[must_use]
    pub fn new(users: Arc<U>, admins: Arc<A>, deps: Collaborators, config: &AuthConfig) -> Self {
        let user_sessions = SessionIssuer::new(
            users,
            Arc::clone(&deps.hasher),
            Arc::clone(&deps.tokens),
            config.clone(),
        );
        let admin_sessions =
            SessionIssuer::new(admins, deps.hasher, deps.tokens, config.clone());
        Self {
            users: UsersService::new(user_sessions, deps.codes, deps.notifier, deps.registrar),
            admins: AdminsService::new(admin_sessions),
        }
    }

    pub fn users(&self) -> &UsersService<U> {
        &self.users
    }

    pub fn admins(&self) -> &AdminsService<A> {
        &self.admins
    }
}
