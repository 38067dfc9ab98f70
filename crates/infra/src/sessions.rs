//! Session registry boundary.
//!
//! A session is created on successful sign-in and its id is the opaque bearer
//! token. Sessions carry no role or status: those are re-read from the store on
//! every request. Bulk revocation inside a workflow transaction goes through
//! [`crate::store::AccountTx::revoke_sessions`]; this trait is the standalone
//! surface used by the identity layer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use accessgate_core::{SessionId, UserId};

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            created_at: at,
        }
    }
}

#[async_trait]
pub trait SessionRegistry: Send + Sync {
    async fn create_session(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Session, StoreError>;

    /// Owning user of a live session.
    async fn resolve_session(&self, id: SessionId) -> Result<Option<UserId>, StoreError>;

    /// Unconditional bulk delete. Returns how many sessions were removed.
    async fn revoke_all_sessions(&self, user_id: UserId) -> Result<u64, StoreError>;

    async fn count_sessions(&self, user_id: UserId) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S> SessionRegistry for Arc<S>
where
    S: SessionRegistry + ?Sized,
{
    async fn create_session(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        (**self).create_session(user_id, at).await
    }

    async fn resolve_session(&self, id: SessionId) -> Result<Option<UserId>, StoreError> {
        (**self).resolve_session(id).await
    }

    async fn revoke_all_sessions(&self, user_id: UserId) -> Result<u64, StoreError> {
        (**self).revoke_all_sessions(user_id).await
    }

    async fn count_sessions(&self, user_id: UserId) -> Result<u64, StoreError> {
        (**self).count_sessions(user_id).await
    }
}
