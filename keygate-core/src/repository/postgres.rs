//! Postgres-backed store implementations.
//!
//! Queries are runtime-checked (`sqlx::query` + `Row::try_get`) so the
//! crate builds without a live database. `ensure_schema` bootstraps the
//! two tables; anything beyond that (migration tooling) belongs to the
//! embedding application.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::fmt;
use uuid::Uuid;

use keygate_model::Role;

use crate::account::AccountRecord;
use crate::repository::{AccountStore, InsertAccountError, SessionStore};
use crate::session::{RevocationReason, SessionRecord};

/// Create the account and session tables if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id UUID PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            is_verified BOOLEAN NOT NULL DEFAULT FALSE,
            verification_token_hash TEXT,
            reset_token_hash TEXT,
            reset_token_expires_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            last_login TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create accounts table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_accounts_verification_token
         ON accounts (verification_token_hash)",
    )
    .execute(pool)
    .await
    .context("failed to create verification token index")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_accounts_reset_token
         ON accounts (reset_token_hash)",
    )
    .execute(pool)
    .await
    .context("failed to create reset token index")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auth_sessions (
            id UUID PRIMARY KEY,
            account_id UUID NOT NULL REFERENCES accounts(id),
            token_hash TEXT NOT NULL UNIQUE,
            family_id UUID NOT NULL,
            generation INTEGER NOT NULL DEFAULT 1,
            ip_address TEXT,
            user_agent TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            expires_at TIMESTAMPTZ NOT NULL,
            revoked BOOLEAN NOT NULL DEFAULT FALSE,
            revoked_reason TEXT,
            revoked_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create auth_sessions table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_auth_sessions_account
         ON auth_sessions (account_id)",
    )
    .execute(pool)
    .await
    .context("failed to create session account index")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_auth_sessions_family
         ON auth_sessions (family_id)",
    )
    .execute(pool)
    .await
    .context("failed to create session family index")?;

    Ok(())
}

pub struct PostgresAccountStore {
    pool: PgPool,
}

impl fmt::Debug for PostgresAccountStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresAccountStore").finish()
    }
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_account(row: &PgRow) -> Result<AccountRecord> {
    let role: String = row.try_get("role")?;
    let role = Role::parse(&role)
        .with_context(|| format!("unknown role {role:?} in accounts row"))?;

    Ok(AccountRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        password_hash: row.try_get("password_hash")?,
        role,
        is_active: row.try_get("is_active")?,
        is_verified: row.try_get("is_verified")?,
        verification_token_hash: row.try_get("verification_token_hash")?,
        reset_token_hash: row.try_get("reset_token_hash")?,
        reset_token_expires_at: row.try_get("reset_token_expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_login: row.try_get("last_login")?,
    })
}

const SELECT_ACCOUNT: &str = r#"
    SELECT
        id, email, display_name, password_hash, role,
        is_active, is_verified,
        verification_token_hash, reset_token_hash, reset_token_expires_at,
        created_at, updated_at, last_login
    FROM accounts
"#;

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn insert(&self, account: &AccountRecord) -> Result<(), InsertAccountError> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (
                id, email, display_name, password_hash, role,
                is_active, is_verified,
                verification_token_hash, reset_token_hash, reset_token_expires_at,
                created_at, updated_at, last_login
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.is_active)
        .bind(account.is_verified)
        .bind(&account.verification_token_hash)
        .bind(&account.reset_token_hash)
        .bind(account.reset_token_expires_at)
        .bind(account.created_at)
        .bind(account.updated_at)
        .bind(account.last_login)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation()) =>
            {
                Err(InsertAccountError::DuplicateEmail)
            }
            Err(err) => Err(InsertAccountError::Store(
                anyhow::Error::new(err).context("failed to insert account"),
            )),
        }
    }

    async fn find_by_id(&self, account_id: Uuid) -> Result<Option<AccountRecord>> {
        let row = sqlx::query(&format!("{SELECT_ACCOUNT} WHERE id = $1"))
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>> {
        let row = sqlx::query(&format!("{SELECT_ACCOUNT} WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn find_by_verification_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<AccountRecord>> {
        let row = sqlx::query(&format!(
            "{SELECT_ACCOUNT} WHERE verification_token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<AccountRecord>> {
        let row = sqlx::query(&format!("{SELECT_ACCOUNT} WHERE reset_token_hash = $1"))
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn save(&self, account: &AccountRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET email = $2,
                display_name = $3,
                password_hash = $4,
                role = $5,
                is_active = $6,
                is_verified = $7,
                verification_token_hash = $8,
                reset_token_hash = $9,
                reset_token_expires_at = $10,
                updated_at = $11,
                last_login = $12
            WHERE id = $1
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.is_active)
        .bind(account.is_verified)
        .bind(&account.verification_token_hash)
        .bind(&account.reset_token_hash)
        .bind(account.reset_token_expires_at)
        .bind(account.updated_at)
        .bind(account.last_login)
        .execute(&self.pool)
        .await
        .context("failed to save account")?;

        Ok(())
    }
}

pub struct PostgresSessionStore {
    pool: PgPool,
}

impl fmt::Debug for PostgresSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresSessionStore").finish()
    }
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_session(row: &PgRow) -> Result<SessionRecord> {
    let generation: i32 = row.try_get("generation")?;
    let generation: u32 = generation
        .try_into()
        .context("session generation overflow")?;

    let revoked_reason: Option<String> = row.try_get("revoked_reason")?;
    let revoked_reason = revoked_reason
        .as_deref()
        .map(|reason| {
            RevocationReason::parse(reason)
                .with_context(|| format!("unknown revocation reason {reason:?}"))
        })
        .transpose()?;

    Ok(SessionRecord {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        token_hash: row.try_get("token_hash")?,
        family_id: row.try_get("family_id")?,
        generation,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        revoked: row.try_get("revoked")?,
        revoked_reason,
        revoked_at: row.try_get("revoked_at")?,
    })
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn insert(&self, session: &SessionRecord) -> Result<()> {
        let generation =
            i32::try_from(session.generation).context("session generation overflow")?;

        sqlx::query(
            r#"
            INSERT INTO auth_sessions (
                id, account_id, token_hash, family_id, generation,
                ip_address, user_agent,
                created_at, expires_at,
                revoked, revoked_reason, revoked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(session.id)
        .bind(session.account_id)
        .bind(&session.token_hash)
        .bind(session.family_id)
        .bind(generation)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.revoked)
        .bind(session.revoked_reason.map(|r| r.as_str()))
        .bind(session.revoked_at)
        .execute(&self.pool)
        .await
        .context("failed to insert session")?;

        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, account_id, token_hash, family_id, generation,
                ip_address, user_agent,
                created_at, expires_at,
                revoked, revoked_reason, revoked_at
            FROM auth_sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_session).transpose()
    }

    async fn revoke_if_active(
        &self,
        session_id: Uuid,
        reason: RevocationReason,
    ) -> Result<bool> {
        // The WHERE guard is the compare-and-swap: of two concurrent
        // callers, only one update finds revoked = FALSE.
        let result = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE,
                revoked_at = NOW(),
                revoked_reason = $2
            WHERE id = $1
              AND revoked = FALSE
            "#,
        )
        .bind(session_id)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await
        .context("failed to revoke session")?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_family(&self, family_id: Uuid, reason: RevocationReason) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE,
                revoked_at = NOW(),
                revoked_reason = COALESCE(revoked_reason, $2)
            WHERE family_id = $1
              AND revoked = FALSE
            "#,
        )
        .bind(family_id)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await
        .context("failed to revoke session family")?;

        Ok(result.rows_affected())
    }

    async fn revoke_for_account(
        &self,
        account_id: Uuid,
        reason: RevocationReason,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE,
                revoked_at = NOW(),
                revoked_reason = COALESCE(revoked_reason, $2)
            WHERE account_id = $1
              AND revoked = FALSE
            "#,
        )
        .bind(account_id)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await
        .context("failed to revoke account sessions")?;

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .context("failed to purge expired sessions")?;

        Ok(result.rows_affected())
    }
}
