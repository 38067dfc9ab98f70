//! Postgres-backed account store and session registry.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Concurrent insert of the same email |
//! | Database (check violation) | `23514` | `Backend` | Enum or review-field constraint broken |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed | N/A | `Backend` | Connection pool was closed |
//! | Other | N/A | `Backend` | Network errors, connection failures, etc. |
//!
//! ## Concurrency
//!
//! Decisions use `UPDATE ... WHERE id = $1 AND status = 'PENDING'`. Under
//! READ COMMITTED the second of two racing updates blocks on the row lock, then
//! re-evaluates the predicate and affects zero rows.
//!
//! In-transaction lookups are `SELECT ... FOR UPDATE`: a row read by the
//! workflow stays locked until commit, so no concurrent writer can slip in
//! between the read and the dependent write. Activation after an approval is
//! additionally conditional on `status <> 'BLOCKED'`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use accessgate_access::{AccessRequest, AccessRequestStatus, Review, StatusFilter};
use accessgate_auth::{Role, User, UserPatch, UserStatus};
use accessgate_core::{AccessRequestId, Email, SessionId, UserId};

use super::r#trait::{AccountStore, AccountTx, StoreError};
use crate::sessions::{Session, SessionRegistry};

const MIGRATION: &str = include_str!("../../migrations/0001_init.sql");
const MIGRATION_LOCK_KEY: i64 = 0x6163_6365_7373;

const USER_COLUMNS: &str = "id, email, name, role, status, created_at, updated_at";
const REQUEST_COLUMNS: &str =
    "id, email, name, status, created_at, updated_at, reviewed_at, reviewed_by";

#[derive(Debug, Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Idempotent, and serialized across processes
    /// by an advisory lock held for the migration transaction.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;

        sqlx::raw_sql(MIGRATION)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("migrate", e))
    }
}

pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn begin(&self) -> Result<Box<dyn AccountTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx }))
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;

        rows.iter().map(user_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_requests(&self, filter: StatusFilter) -> Result<Vec<AccessRequest>, StoreError> {
        let status = filter.status().map(|s| s.as_str());
        let rows = sqlx::query(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM access_requests
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_requests", e))?;

        rows.iter().map(request_from_row).collect()
    }

    #[instrument(skip_all, fields(user_id = %id), err)]
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;

        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl AccountTx for PostgresTx {
    async fn user_by_id(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("user_by_id", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn user_by_email(&mut self, email: &Email) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 FOR UPDATE"
        ))
        .bind(email.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("user_by_email", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, role, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.name.as_deref())
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET name = $2, role = $3, status = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.name.as_deref())
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %id), err)]
    async fn patch_user(
        &mut self,
        id: UserId,
        patch: &UserPatch,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET role = COALESCE($2, role), status = COALESCE($3, status), updated_at = $4
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(patch.role.map(|r| r.as_str()))
        .bind(patch.status.map(|s| s.as_str()))
        .bind(at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("patch_user", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, name), fields(user_id = %id), err)]
    async fn activate_user(
        &mut self,
        id: UserId,
        name: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET status = 'ACTIVE', name = COALESCE(name, $2), updated_at = $3
            WHERE id = $1 AND status <> 'BLOCKED'
            "#,
        )
        .bind(id.as_uuid())
        .bind(name)
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("activate_user", e))?;

        Ok(result.rows_affected())
    }

    async fn request_by_id(
        &mut self,
        id: AccessRequestId,
    ) -> Result<Option<AccessRequest>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM access_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("request_by_id", e))?;

        row.as_ref().map(request_from_row).transpose()
    }

    async fn request_by_email(
        &mut self,
        email: &Email,
    ) -> Result<Option<AccessRequest>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM access_requests WHERE email = $1 FOR UPDATE"
        ))
        .bind(email.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("request_by_email", e))?;

        row.as_ref().map(request_from_row).transpose()
    }

    #[instrument(skip(self, request), fields(request_id = %request.id), err)]
    async fn insert_request(&mut self, request: &AccessRequest) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO access_requests
                (id, email, name, status, created_at, updated_at, reviewed_at, reviewed_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.email.as_str())
        .bind(request.name.as_deref())
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.updated_at)
        .bind(request.reviewed_at)
        .bind(request.reviewed_by.map(uuid::Uuid::from))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_request", e))?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(request_id = %request.id), err)]
    async fn update_request(&mut self, request: &AccessRequest) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE access_requests
            SET name = $2, status = $3, updated_at = $4, reviewed_at = $5, reviewed_by = $6
            WHERE id = $1
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.name.as_deref())
        .bind(request.status.as_str())
        .bind(request.updated_at)
        .bind(request.reviewed_at)
        .bind(request.reviewed_by.map(uuid::Uuid::from))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_request", e))?;
        Ok(())
    }

    #[instrument(
        skip_all,
        fields(request_id = %id, decision = ?review.decision, reviewed_by = %review.reviewed_by),
        err
    )]
    async fn transition_request(
        &mut self,
        id: AccessRequestId,
        review: &Review,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE access_requests
            SET status = $2, reviewed_at = $3, reviewed_by = $4, updated_at = $3
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id.as_uuid())
        .bind(review.decision.target_status().as_str())
        .bind(review.reviewed_at)
        .bind(review.reviewed_by.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("transition_request", e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip_all, fields(user_id = %user_id), err)]
    async fn revoke_sessions(&mut self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("revoke_sessions", e))?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

#[async_trait]
impl SessionRegistry for PostgresAccountStore {
    #[instrument(skip_all, fields(user_id = %user_id), err)]
    async fn create_session(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let session = Session::new(user_id, at);
        sqlx::query("INSERT INTO sessions (id, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(session.id.as_uuid())
            .bind(user_id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_session", e))?;
        Ok(session)
    }

    async fn resolve_session(&self, id: SessionId) -> Result<Option<UserId>, StoreError> {
        let row = sqlx::query("SELECT user_id FROM sessions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("resolve_session", e))?;

        row.map(|r| {
            r.try_get::<uuid::Uuid, _>("user_id")
                .map(UserId::from_uuid)
                .map_err(|e| map_sqlx_error("resolve_session", e))
        })
        .transpose()
    }

    #[instrument(skip_all, fields(user_id = %user_id), err)]
    async fn revoke_all_sessions(&self, user_id: UserId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("revoke_all_sessions", e))?;
        Ok(result.rows_affected())
    }

    async fn count_sessions(&self, user_id: UserId) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_sessions", e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_sessions", e))?;
        Ok(total as u64)
    }
}

// SQLx row mapping

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, StoreError> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_user", e);

    let role: String = row.try_get("role").map_err(get)?;
    let status: String = row.try_get("status").map_err(get)?;
    let email: String = row.try_get("email").map_err(get)?;

    Ok(User {
        id: UserId::from_uuid(row.try_get("id").map_err(get)?),
        email: Email::parse(&email).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        name: row.try_get("name").map_err(get)?,
        role: role
            .parse::<Role>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        status: status
            .parse::<UserStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(get)?,
        updated_at: row.try_get("updated_at").map_err(get)?,
    })
}

fn request_from_row(row: &sqlx::postgres::PgRow) -> Result<AccessRequest, StoreError> {
    let get = |e: sqlx::Error| map_sqlx_error("decode_access_request", e);

    let status: String = row.try_get("status").map_err(get)?;
    let email: String = row.try_get("email").map_err(get)?;
    let reviewed_by: Option<uuid::Uuid> = row.try_get("reviewed_by").map_err(get)?;

    Ok(AccessRequest {
        id: AccessRequestId::from_uuid(row.try_get("id").map_err(get)?),
        email: Email::parse(&email).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        name: row.try_get("name").map_err(get)?,
        status: status
            .parse::<AccessRequestStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(get)?,
        updated_at: row.try_get("updated_at").map_err(get)?,
        reviewed_at: row.try_get("reviewed_at").map_err(get)?,
        reviewed_by: reviewed_by.map(UserId::from_uuid),
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("{} in {}", err, operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
