//! # Custodia (user and admin session lifecycle)
//!
//! `custodia` signs end users and administrators up and in, issues short-lived
//! signed access tokens with long-lived rotating refresh tokens, and runs the
//! email verification workflow for users.
//!
//! ## Sessions
//!
//! A principal holds at most one session. Every sign-in and every refresh
//! overwrites it, so a refresh token works exactly once. Refresh tokens are
//! opaque random values; only the credential store can map them back to a
//! principal, and only while `expires_at > now`.
//!
//! ## Verification
//!
//! New users receive a random code by email and cannot sign in until the code
//! is consumed. Consumption is a single conditional store update, so a code
//! verifies at most one account, once.
//!
//! ## Storage
//!
//! [`auth::store::MemoryStore`] keeps everything in-process; the Postgres
//! stores use the schema in `sql/schema.sql` (`custodia migrate`).

pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
