//! Errors returned at the session-manager boundary.
//!
//! `NotFound` deliberately covers wrong passwords, unknown emails, unverified
//! accounts and unknown or expired refresh tokens. Storage details are kept in
//! the source chain for logs and never appear in the message.

use thiserror::Error;

use super::hash::HashError;
use super::store::StoreError;
use super::token::TokenError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not found")]
    NotFound,
    #[error("principal with such email already exists")]
    AlreadyExists,
    #[error("verification code is invalid")]
    InvalidCode,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password hashing failed")]
    Hashing(#[source] HashError),
    #[error("token issuance failed")]
    TokenIssuance(#[source] TokenError),
    #[error("notification delivery failed")]
    Notification(#[source] anyhow::Error),
    #[error("storage failure")]
    Store(#[source] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => Self::AlreadyExists,
            StoreError::Backend(err) => Self::Store(err),
        }
    }
}

impl From<HashError> for AuthError {
    fn from(err: HashError) -> Self {
        Self::Hashing(err)
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        Self::TokenIssuance(err)
    }
}

pub type Result<T, E = AuthError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::error::Error as _;

    #[test]
    fn duplicate_maps_to_already_exists() {
        let err = AuthError::from(StoreError::Duplicate);
        assert!(matches!(err, AuthError::AlreadyExists));
    }

    #[test]
    fn backend_details_stay_out_of_message() {
        let err = AuthError::from(StoreError::Backend(anyhow!(
            "connection refused: postgres://db:5432"
        )));
        assert_eq!(err.to_string(), "storage failure");
        let source = err.source().map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("connection refused: postgres://db:5432")
        );
    }

    #[test]
    fn not_found_message_is_generic() {
        assert_eq!(AuthError::NotFound.to_string(), "not found");
    }
}
