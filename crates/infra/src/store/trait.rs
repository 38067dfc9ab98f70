use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use accessgate_access::{AccessRequest, Review, StatusFilter};
use accessgate_auth::{User, UserPatch};
use accessgate_core::{AccessRequestId, Email, UserId};

/// Storage operation error.
///
/// These are **infrastructure errors**, as opposed to domain errors. Callers
/// above the service boundary only ever see a generic failure for them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated (e.g. a concurrent insert of the same email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Connection, pool or other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Durable storage of users and access requests.
///
/// Read-only listings are served directly. Every state-changing operation runs
/// inside an [`AccountTx`] obtained from [`AccountStore::begin`]: all writes in
/// it commit together or not at all.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn AccountTx>, StoreError>;

    /// Newest first.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Newest first.
    async fn list_requests(&self, filter: StatusFilter) -> Result<Vec<AccessRequest>, StoreError>;

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
}

/// One open transaction.
///
/// Dropping a transaction without calling [`AccountTx::commit`] rolls it back.
///
/// Lookups lock the row they return until the transaction ends, so a value
/// read here cannot be changed by a concurrent transaction before this one
/// writes. Callers that touch both tables lock the request before the user.
#[async_trait]
pub trait AccountTx: Send {
    async fn user_by_id(&mut self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn user_by_email(&mut self, email: &Email) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if the email is taken.
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;

    /// Overwrites name, role, status and `updated_at`.
    async fn update_user(&mut self, user: &User) -> Result<(), StoreError>;

    /// Write only the columns `patch` supplies. `None` if the user does not exist.
    async fn patch_user(
        &mut self,
        id: UserId,
        patch: &UserPatch,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Conditional activation after an approval: sets `ACTIVE` and fills a
    /// missing name, unless the user is `BLOCKED`. Returns rows affected (0 or 1).
    async fn activate_user(
        &mut self,
        id: UserId,
        name: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn request_by_id(
        &mut self,
        id: AccessRequestId,
    ) -> Result<Option<AccessRequest>, StoreError>;

    async fn request_by_email(&mut self, email: &Email)
    -> Result<Option<AccessRequest>, StoreError>;

    /// Fails with [`StoreError::Conflict`] if a request for the email exists.
    async fn insert_request(&mut self, request: &AccessRequest) -> Result<(), StoreError>;

    /// Overwrites name, status, review fields and `updated_at`.
    async fn update_request(&mut self, request: &AccessRequest) -> Result<(), StoreError>;

    /// Conditional status write: records `review` only if the request is still
    /// `PENDING`. Returns the number of rows affected (0 or 1).
    async fn transition_request(
        &mut self,
        id: AccessRequestId,
        review: &Review,
    ) -> Result<u64, StoreError>;

    /// Delete every session of `user_id` as part of this transaction.
    async fn revoke_sessions(&mut self, user_id: UserId) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> AccountStore for Arc<S>
where
    S: AccountStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn AccountTx>, StoreError> {
        (**self).begin().await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        (**self).list_users().await
    }

    async fn list_requests(&self, filter: StatusFilter) -> Result<Vec<AccessRequest>, StoreError> {
        (**self).list_requests(filter).await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).find_user(id).await
    }
}
