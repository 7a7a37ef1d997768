//! Principals, sessions and the token pair handed back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which kind of principal an operation runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrincipalKind {
    User,
    Admin,
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

/// The currently valid refresh token of a principal.
///
/// At most one exists per principal; issuing a new one replaces the old.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Email ownership state. An empty `code` never validates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub code: String,
    pub verified: bool,
}

impl Verification {
    #[must_use]
    pub fn pending(code: String) -> Self {
        Self {
            code,
            verified: false,
        }
    }

    /// Whether `code` would consume this verification.
    #[must_use]
    pub fn accepts(&self, code: &str) -> bool {
        !self.verified && !self.code.is_empty() && self.code == code
    }

    /// Mark verified and clear the code. There is no way back.
    pub fn complete(&mut self) {
        self.verified = true;
        self.code.clear();
    }
}

/// Capabilities shared by every principal kind.
///
/// Stores and the session routine are written against this trait so users and
/// admins share one rotation algorithm.
pub trait Principal: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: PrincipalKind;

    fn id(&self) -> Uuid;
    fn email(&self) -> &str;
    fn password_hash(&self) -> &str;
    fn session(&self) -> Option<&Session>;

    /// Overwrite the current session, recording the visit where the kind tracks it.
    fn set_session(&mut self, session: Session, now: DateTime<Utc>);

    /// Whether the principal may authenticate (sign in, be fetched by id).
    fn is_active(&self) -> bool;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub registered_at: DateTime<Utc>,
    pub last_visit_at: DateTime<Utc>,
    pub verification: Verification,
    pub session: Option<Session>,
}

impl User {
    /// A freshly registered, unverified user.
    #[must_use]
    pub fn new(
        name: String,
        email: String,
        password_hash: String,
        verification_code: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            name,
            email,
            password_hash,
            registered_at: now,
            last_visit_at: now,
            verification: Verification::pending(verification_code),
            session: None,
        }
    }
}

impl Principal for User {
    const KIND: PrincipalKind = PrincipalKind::User;

    fn id(&self) -> Uuid {
        self.id
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn password_hash(&self) -> &str {
        &self.password_hash
    }

    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn set_session(&mut self, session: Session, now: DateTime<Utc>) {
        self.session = Some(session);
        self.last_visit_at = now;
    }

    fn is_active(&self) -> bool {
        self.verification.verified
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub session: Option<Session>,
}

impl Admin {
    #[must_use]
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            name,
            email,
            password_hash,
            session: None,
        }
    }
}

impl Principal for Admin {
    const KIND: PrincipalKind = PrincipalKind::Admin;

    fn id(&self) -> Uuid {
        self.id
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn password_hash(&self) -> &str {
        &self.password_hash
    }

    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn set_session(&mut self, session: Session, _now: DateTime<Utc>) {
        self.session = Some(session);
    }

    fn is_active(&self) -> bool {
        true
    }
}

/// Token pair returned once per issuance; never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Public view of a user, without credentials or session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub registered_at: DateTime<Utc>,
    pub last_visit_at: DateTime<Utc>,
    pub verified: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            registered_at: user.registered_at,
            last_visit_at: user.last_visit_at,
            verified: user.verification.verified,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&Admin> for AdminProfile {
    fn from(admin: &Admin) -> Self {
        Self {
            id: admin.id,
            name: admin.name.clone(),
            email: admin.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User::new(
            "Alice".to_string(),
            "alice@example.com".to_string(),
            "hash".to_string(),
            "ABC123".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn new_user_is_unverified() {
        let user = user();
        assert!(!user.verification.verified);
        assert!(!user.is_active());
        assert_eq!(user.registered_at, user.last_visit_at);
        assert!(user.session.is_none());
    }

    #[test]
    fn verification_is_single_use() {
        let mut verification = Verification::pending("ABC123".to_string());
        assert!(verification.accepts("ABC123"));
        assert!(!verification.accepts("abc123"));

        verification.complete();
        assert!(verification.verified);
        assert!(verification.code.is_empty());
        assert!(!verification.accepts("ABC123"));
        assert!(!verification.accepts(""));
    }

    #[test]
    fn empty_code_never_validates() {
        let verification = Verification::pending(String::new());
        assert!(!verification.accepts(""));
    }

    #[test]
    fn session_validity_is_strictly_before_expiry() {
        let now = Utc::now();
        let session = Session {
            refresh_token: "token".to_string(),
            expires_at: now,
        };
        assert!(!session.is_valid_at(now));
        assert!(session.is_valid_at(now - Duration::seconds(1)));
    }

    #[test]
    fn user_set_session_records_visit() {
        let mut user = user();
        let later = user.last_visit_at + Duration::minutes(5);
        user.set_session(
            Session {
                refresh_token: "token".to_string(),
                expires_at: later + Duration::days(1),
            },
            later,
        );
        assert_eq!(user.last_visit_at, later);
        assert_eq!(
            user.session().map(|s| s.refresh_token.as_str()),
            Some("token")
        );
    }

    #[test]
    fn admins_are_always_active() {
        let admin = Admin::new(
            "Root".to_string(),
            "root@example.com".to_string(),
            "hash".to_string(),
        );
        assert!(admin.is_active());
        assert_eq!(Admin::KIND.to_string(), "admin");
    }

    #[test]
    fn profile_omits_credentials() -> anyhow::Result<()> {
        let user = user();
        let value = serde_json::to_value(UserProfile::from(&user))?;
        assert!(value.get("password_hash").is_none());
        assert_eq!(
            value.get("verified").and_then(serde_json::Value::as_bool),
            Some(false)
        );
        Ok(())
    }
}
