//! In-process credential store.
//!
//! Every mutation happens under one write lock, which gives the same
//! per-record atomicity the database store gets from conditional statements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

use super::{PrincipalStore, StoreError, StoreResult, UserStore};
use crate::auth::domain::{Admin, Principal, Session, User};

pub type MemoryUserStore = MemoryStore<User>;
pub type MemoryAdminStore = MemoryStore<Admin>;

#[derive(Debug)]
struct Records<P> {
    principals: HashMap<Uuid, P>,
    by_email: HashMap<String, Uuid>,
    by_refresh_token: HashMap<String, Uuid>,
}

impl<P: Principal> Records<P> {
    /// Overwrite the session of `id` and move its refresh-token index entry.
    fn store_session(&mut self, id: Uuid, session: &Session, now: DateTime<Utc>) {
        let Some(principal) = self.principals.get_mut(&id) else {
            return;
        };
        if let Some(previous) = principal.session() {
            self.by_refresh_token.remove(&previous.refresh_token);
        }
        principal.set_session(session.clone(), now);
        self.by_refresh_token.insert(session.refresh_token.clone(), id);
    }
}

#[derive(Debug)]
pub struct MemoryStore<P> {
    records: RwLock<Records<P>>,
}

impl<P: Principal> MemoryStore<P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Records {
                principals: HashMap::new(),
                by_email: HashMap::new(),
                by_refresh_token: HashMap::new(),
            }),
        }
    }

    /// Number of stored principals.
    pub async fn len(&self) -> usize {
        self.records.read().await.principals.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Raw record by email, regardless of whether the principal is active.
    pub async fn snapshot_by_email(&self, email: &str) -> Option<P> {
        let records = self.records.read().await;
        records
            .by_email
            .get(email)
            .and_then(|id| records.principals.get(id))
            .cloned()
    }
}

impl<P: Principal> Default for MemoryStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P: Principal> PrincipalStore for MemoryStore<P> {
    type Principal = P;

    #[instrument(skip_all, fields(kind = %P::KIND))]
    async fn create(&self, principal: &P) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if records.by_email.contains_key(principal.email()) {
            return Err(StoreError::Duplicate);
        }
        records
            .by_email
            .insert(principal.email().to_string(), principal.id());
        records.principals.insert(principal.id(), principal.clone());
        Ok(())
    }

    #[instrument(skip_all, fields(kind = %P::KIND))]
    async fn get_by_credentials(
        &self,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Option<P>> {
        let records = self.records.read().await;
        Ok(records
            .by_email
            .get(email)
            .and_then(|id| records.principals.get(id))
            .filter(|p| p.password_hash() == password_hash && p.is_active())
            .cloned())
    }

    #[instrument(skip_all, fields(kind = %P::KIND))]
    async fn get_by_refresh_token(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<P>> {
        let records = self.records.read().await;
        Ok(records
            .by_refresh_token
            .get(refresh_token)
            .and_then(|id| records.principals.get(id))
            .filter(|p| {
                p.session().is_some_and(|session| {
                    session.refresh_token == refresh_token && session.is_valid_at(now)
                })
            })
            .cloned())
    }

    #[instrument(skip(self), fields(kind = %P::KIND))]
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<P>> {
        let records = self.records.read().await;
        Ok(records
            .principals
            .get(&id)
            .filter(|p| p.is_active())
            .cloned())
    }

    #[instrument(skip(self, session), fields(kind = %P::KIND))]
    async fn set_session(
        &self,
        id: Uuid,
        session: &Session,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.records.write().await.store_session(id, session, now);
        Ok(())
    }

    #[instrument(skip(self, previous_token, session), fields(kind = %P::KIND))]
    async fn replace_session(
        &self,
        id: Uuid,
        previous_token: &str,
        session: &Session,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        let current = records
            .principals
            .get(&id)
            .and_then(|p| p.session())
            .map(|s| s.refresh_token.as_str());
        if current != Some(previous_token) {
            return Ok(false);
        }
        records.store_session(id, session, now);
        Ok(true)
    }
}

#[async_trait]
impl UserStore for MemoryStore<User> {
    #[instrument(skip_all)]
    async fn verify(&self, code: &str) -> StoreResult<u64> {
        let mut records = self.records.write().await;
        let Some(user) = records
            .principals
            .values_mut()
            .find(|user| user.verification.accepts(code))
        else {
            return Ok(0);
        };
        user.verification.complete();
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use chrono::Duration;

    fn user(email: &str, code: &str) -> User {
        User::new(
            "Alice".to_string(),
            email.to_string(),
            "hash".to_string(),
            code.to_string(),
            Utc::now(),
        )
    }

    fn session(token: &str, ttl: Duration) -> Session {
        Session {
            refresh_token: token.to_string(),
            expires_at: Utc::now() + ttl,
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() -> Result<()> {
        let store = MemoryUserStore::new();
        store.create(&user("alice@example.com", "A")).await?;
        let err = store.create(&user("alice@example.com", "B")).await;
        assert!(matches!(err, Err(StoreError::Duplicate)));
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn credentials_require_verified_user() -> Result<()> {
        let store = MemoryUserStore::new();
        store.create(&user("alice@example.com", "CODE")).await?;
        assert!(
            store
                .get_by_credentials("alice@example.com", "hash")
                .await?
                .is_none()
        );

        assert_eq!(store.verify("CODE").await?, 1);
        assert!(
            store
                .get_by_credentials("alice@example.com", "hash")
                .await?
                .is_some()
        );
        assert!(
            store
                .get_by_credentials("alice@example.com", "wrong")
                .await?
                .is_none()
        );
        Ok(())
    }

    #[tokio::test]
    async fn verify_consumes_code_once() -> Result<()> {
        let store = MemoryUserStore::new();
        store.create(&user("alice@example.com", "CODE")).await?;
        assert_eq!(store.verify("CODE").await?, 1);
        assert_eq!(store.verify("CODE").await?, 0);
        assert_eq!(store.verify("").await?, 0);

        let stored = store
            .snapshot_by_email("alice@example.com")
            .await
            .context("missing user")?;
        assert!(stored.verification.verified);
        assert!(stored.verification.code.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn shared_code_consumes_single_record() -> Result<()> {
        let store = MemoryUserStore::new();
        store.create(&user("a@example.com", "SAME")).await?;
        store.create(&user("b@example.com", "SAME")).await?;
        assert_eq!(store.verify("SAME").await?, 1);
        assert_eq!(store.verify("SAME").await?, 1);
        assert_eq!(store.verify("SAME").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn expired_session_is_not_returned() -> Result<()> {
        let store = MemoryAdminStore::new();
        let admin = Admin::new("Root".into(), "root@example.com".into(), "hash".into());
        store.create(&admin).await?;

        store
            .set_session(admin.id, &session("old", Duration::seconds(-1)), Utc::now())
            .await?;
        assert!(
            store
                .get_by_refresh_token("old", Utc::now())
                .await?
                .is_none()
        );

        store
            .set_session(admin.id, &session("fresh", Duration::hours(1)), Utc::now())
            .await?;
        let found = store.get_by_refresh_token("fresh", Utc::now()).await?;
        assert_eq!(found.map(|a| a.id), Some(admin.id));
        Ok(())
    }

    #[tokio::test]
    async fn replace_session_checks_previous_token() -> Result<()> {
        let store = MemoryAdminStore::new();
        let admin = Admin::new("Root".into(), "root@example.com".into(), "hash".into());
        store.create(&admin).await?;
        store
            .set_session(admin.id, &session("first", Duration::hours(1)), Utc::now())
            .await?;

        let swapped = store
            .replace_session(
                admin.id,
                "first",
                &session("second", Duration::hours(1)),
                Utc::now(),
            )
            .await?;
        assert!(swapped);

        let stale = store
            .replace_session(
                admin.id,
                "first",
                &session("third", Duration::hours(1)),
                Utc::now(),
            )
            .await?;
        assert!(!stale);
        assert!(
            store
                .get_by_refresh_token("second", Utc::now())
                .await?
                .is_some()
        );
        Ok(())
    }

    #[tokio::test]
    async fn session_writes_move_refresh_token_index() -> Result<()> {
        let store = MemoryAdminStore::new();
        let admin = Admin::new("Root".into(), "root@example.com".into(), "hash".into());
        store.create(&admin).await?;

        store
            .set_session(admin.id, &session("first", Duration::hours(1)), Utc::now())
            .await?;
        store
            .set_session(admin.id, &session("second", Duration::hours(1)), Utc::now())
            .await?;
        store
            .replace_session(
                admin.id,
                "second",
                &session("third", Duration::hours(1)),
                Utc::now(),
            )
            .await?;

        {
            let records = store.records.read().await;
            assert_eq!(records.by_refresh_token.len(), 1);
            assert_eq!(records.by_refresh_token.get("third"), Some(&admin.id));
        }
        for stale in ["first", "second"] {
            assert!(store.get_by_refresh_token(stale, Utc::now()).await?.is_none());
        }
        assert!(
            store
                .get_by_refresh_token("third", Utc::now())
                .await?
                .is_some()
        );
        Ok(())
    }

    #[tokio::test]
    async fn get_by_id_hides_unverified_users() -> Result<()> {
        let store = MemoryUserStore::new();
        let pending = user("alice@example.com", "CODE");
        store.create(&pending).await?;
        assert!(store.get_by_id(pending.id).await?.is_none());
        store.verify("CODE").await?;
        assert!(store.get_by_id(pending.id).await?.is_some());
        Ok(())
    }
}
