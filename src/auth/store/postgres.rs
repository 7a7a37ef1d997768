//! Postgres-backed credential store.
//!
//! Email uniqueness is a table constraint and verification is a single
//! conditional `UPDATE`, so concurrent requests never race between a check and
//! the write that depends on it.
//!
//! Refresh tokens and verification codes are stored as SHA-256 hex digests.
//! Every lookup digests the presented value first, so principals read back
//! from here carry digests in those fields.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{
    PgPool, Postgres, Row,
    postgres::{PgArguments, PgRow},
    query::Query,
};
use tracing::{Instrument, Span, info_span, instrument};
use uuid::Uuid;

use super::{PrincipalStore, StoreError, StoreResult, UserStore};
use crate::auth::domain::{Admin, Session, User, Verification};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

// The outer predicate is re-checked after a concurrent update releases the row
// lock, so a code is consumed at most once. SKIP LOCKED lets concurrent calls
// sharing a code each claim a different pending row.
const VERIFY_USER_SQL: &str = r"
    UPDATE users
    SET verified = TRUE,
        verification_code = ''
    WHERE id = (
        SELECT id FROM users
        WHERE verification_code = $1 AND NOT verified
        LIMIT 1
        FOR UPDATE SKIP LOCKED
    )
      AND verification_code = $1
      AND NOT verified
";

/// Create tables and indexes if they do not exist yet.
///
/// # Errors
/// Returns an error if any schema statement fails.
pub async fn apply_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .instrument(db_span("DDL", "sql/schema.sql"))
        .await
        .context("failed to apply schema")?;
    Ok(())
}

fn db_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Hex SHA-256 of a token or code as persisted. Empty stays empty, so a
/// consumed verification code never matches.
fn secret_digest(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn session_from_columns(
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
) -> Option<Session> {
    match (refresh_token, expires_at) {
        (Some(refresh_token), Some(expires_at)) => Some(Session {
            refresh_token,
            expires_at,
        }),
        _ => None,
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        registered_at: row.try_get("registered_at")?,
        last_visit_at: row.try_get("last_visit_at")?,
        verification: Verification {
            code: row.try_get("verification_code")?,
            verified: row.try_get("verified")?,
        },
        session: session_from_columns(
            row.try_get("refresh_token")?,
            row.try_get("session_expires_at")?,
        ),
    })
}

fn admin_from_row(row: &PgRow) -> Result<Admin> {
    Ok(Admin {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        session: session_from_columns(
            row.try_get("refresh_token")?,
            row.try_get("session_expires_at")?,
        ),
    })
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_user(
        &self,
        query: PgQuery<'_>,
        statement: &'static str,
    ) -> StoreResult<Option<User>> {
        let row = query
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", statement))
            .await
            .context("failed to lookup user")?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }
}

#[async_trait]
impl PrincipalStore for PgUserStore {
    type Principal = User;

    #[instrument(skip_all)]
    async fn create(&self, user: &User) -> StoreResult<()> {
        let query = r"
            INSERT INTO users
                (id, name, email, password_hash, registered_at, last_visit_at,
                 verification_code, verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ";
        let result = sqlx::query(query)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.registered_at)
            .bind(user.last_visit_at)
            .bind(secret_digest(&user.verification.code))
            .bind(user.verification.verified)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Duplicate),
            Err(err) => Err(anyhow::Error::from(err)
                .context("failed to insert user")
                .into()),
        }
    }

    #[instrument(skip_all)]
    async fn get_by_credentials(
        &self,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Option<User>> {
        let query = r"
            SELECT id, name, email, password_hash, registered_at, last_visit_at,
                   verification_code, verified, refresh_token, session_expires_at
            FROM users
            WHERE email = $1
              AND password_hash = $2
              AND verified
            LIMIT 1
        ";
        self.fetch_one_user(sqlx::query(query).bind(email).bind(password_hash), query)
            .await
    }

    #[instrument(skip_all)]
    async fn get_by_refresh_token(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let query = r"
            SELECT id, name, email, password_hash, registered_at, last_visit_at,
                   verification_code, verified, refresh_token, session_expires_at
            FROM users
            WHERE refresh_token = $1
              AND session_expires_at > $2
            LIMIT 1
        ";
        let statement = sqlx::query(query)
            .bind(secret_digest(refresh_token))
            .bind(now);
        self.fetch_one_user(statement, query).await
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let query = r"
            SELECT id, name, email, password_hash, registered_at, last_visit_at,
                   verification_code, verified, refresh_token, session_expires_at
            FROM users
            WHERE id = $1
              AND verified
        ";
        self.fetch_one_user(sqlx::query(query).bind(id), query).await
    }

    #[instrument(skip(self, session))]
    async fn set_session(
        &self,
        id: Uuid,
        session: &Session,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let query = r"
            UPDATE users
            SET refresh_token = $2,
                session_expires_at = $3,
                last_visit_at = $4
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(secret_digest(&session.refresh_token))
            .bind(session.expires_at)
            .bind(now)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to set user session")?;
        Ok(())
    }

    #[instrument(skip(self, previous_token, session))]
    async fn replace_session(
        &self,
        id: Uuid,
        previous_token: &str,
        session: &Session,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let query = r"
            UPDATE users
            SET refresh_token = $2,
                session_expires_at = $3,
                last_visit_at = $4
            WHERE id = $1
              AND refresh_token = $5
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(secret_digest(&session.refresh_token))
            .bind(session.expires_at)
            .bind(now)
            .bind(secret_digest(previous_token))
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to replace user session")?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip_all)]
    async fn verify(&self, code: &str) -> StoreResult<u64> {
        if code.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(VERIFY_USER_SQL)
            .bind(secret_digest(code))
            .execute(&self.pool)
            .instrument(db_span("UPDATE", VERIFY_USER_SQL))
            .await
            .context("failed to verify user")?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone, Debug)]
pub struct PgAdminStore {
    pool: PgPool,
}

impl PgAdminStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_admin(
        &self,
        query: PgQuery<'_>,
        statement: &'static str,
    ) -> StoreResult<Option<Admin>> {
        let row = query
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", statement))
            .await
            .context("failed to lookup admin")?;
        Ok(row.as_ref().map(admin_from_row).transpose()?)
    }
}

#[async_trait]
impl PrincipalStore for PgAdminStore {
    type Principal = Admin;

    #[instrument(skip_all)]
    async fn create(&self, admin: &Admin) -> StoreResult<()> {
        let query = r"
            INSERT INTO admins (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
        ";
        let result = sqlx::query(query)
            .bind(admin.id)
            .bind(&admin.name)
            .bind(&admin.email)
            .bind(&admin.password_hash)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Duplicate),
            Err(err) => Err(anyhow::Error::from(err)
                .context("failed to insert admin")
                .into()),
        }
    }

    #[instrument(skip_all)]
    async fn get_by_credentials(
        &self,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Option<Admin>> {
        let query = r"
            SELECT id, name, email, password_hash, refresh_token, session_expires_at
            FROM admins
            WHERE email = $1
              AND password_hash = $2
            LIMIT 1
        ";
        self.fetch_one_admin(sqlx::query(query).bind(email).bind(password_hash), query)
            .await
    }

    #[instrument(skip_all)]
    async fn get_by_refresh_token(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Admin>> {
        let query = r"
            SELECT id, name, email, password_hash, refresh_token, session_expires_at
            FROM admins
            WHERE refresh_token = $1
              AND session_expires_at > $2
            LIMIT 1
        ";
        let statement = sqlx::query(query)
            .bind(secret_digest(refresh_token))
            .bind(now);
        self.fetch_one_admin(statement, query).await
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<Admin>> {
        let query = r"
            SELECT id, name, email, password_hash, refresh_token, session_expires_at
            FROM admins
            WHERE id = $1
        ";
        self.fetch_one_admin(sqlx::query(query).bind(id), query).await
    }

    #[instrument(skip(self, session))]
    async fn set_session(
        &self,
        id: Uuid,
        session: &Session,
        _now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let query = r"
            UPDATE admins
            SET refresh_token = $2,
                session_expires_at = $3
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(secret_digest(&session.refresh_token))
            .bind(session.expires_at)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to set admin session")?;
        Ok(())
    }

    #[instrument(skip(self, previous_token, session))]
    async fn replace_session(
        &self,
        id: Uuid,
        previous_token: &str,
        session: &Session,
        _now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let query = r"
            UPDATE admins
            SET refresh_token = $2,
                session_expires_at = $3
            WHERE id = $1
              AND refresh_token = $4
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(secret_digest(&session.refresh_token))
            .bind(session.expires_at)
            .bind(secret_digest(previous_token))
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to replace admin session")?;
        Ok(result.rows_affected() == 1)
    }
}
