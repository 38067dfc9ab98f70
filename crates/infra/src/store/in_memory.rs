use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use accessgate_access::{AccessRequest, Review, StatusFilter};
use accessgate_auth::{User, UserPatch};
use accessgate_core::{AccessRequestId, Email, SessionId, UserId};

use super::r#trait::{AccountStore, AccountTx, StoreError};
use crate::sessions::{Session, SessionRegistry};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    requests: HashMap<AccessRequestId, AccessRequest>,
    sessions: HashMap<SessionId, Session>,
}

impl Tables {
    fn user_by_email(&self, email: &Email) -> Option<&User> {
        self.users.values().find(|u| &u.email == email)
    }

    fn request_by_email(&self, email: &Email) -> Option<&AccessRequest> {
        self.requests.values().find(|r| &r.email == email)
    }

    fn revoke_sessions(&mut self, user_id: UserId) -> u64 {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user_id != user_id);
        (before - self.sessions.len()) as u64
    }
}

/// In-memory account store and session registry.
///
/// Intended for tests/dev. A single mutex covers all tables and a transaction
/// holds it until commit or drop, so transactions are serialized.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Works on a copy of the tables; commit swaps the copy in.
struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, uuid::Uuid)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn begin(&self) -> Result<Box<dyn AccountTx>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.lock().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        newest_first(&mut users, |u| (u.created_at, *u.id.as_uuid()));
        Ok(users)
    }

    async fn list_requests(&self, filter: StatusFilter) -> Result<Vec<AccessRequest>, StoreError> {
        let tables = self.tables.lock().await;
        let mut requests: Vec<AccessRequest> = tables
            .requests
            .values()
            .filter(|r| filter.matches(r.status))
            .cloned()
            .collect();
        newest_first(&mut requests, |r| (r.created_at, *r.id.as_uuid()));
        Ok(requests)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl AccountTx for InMemoryTx {
    async fn user_by_id(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn user_by_email(&mut self, email: &Email) -> Result<Option<User>, StoreError> {
        Ok(self.working.user_by_email(email).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        if self.working.user_by_email(&user.email).is_some() {
            return Err(StoreError::Conflict(format!("user email already exists ({})", user.id)));
        }
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        match self.working.users.get_mut(&user.id) {
            Some(stored) => {
                stored.name = user.name.clone();
                stored.role = user.role;
                stored.status = user.status;
                stored.updated_at = user.updated_at;
                Ok(())
            }
            None => Err(StoreError::Backend(format!("update of missing user {}", user.id))),
        }
    }

    async fn patch_user(
        &mut self,
        id: UserId,
        patch: &UserPatch,
        at: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.get_mut(&id).map(|user| {
            user.apply_patch(patch, at);
            user.clone()
        }))
    }

    async fn activate_user(
        &mut self,
        id: UserId,
        name: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let activated = self
            .working
            .users
            .get_mut(&id)
            .is_some_and(|user| user.activate_from_approval(name, at).is_ok());
        Ok(u64::from(activated))
    }

    async fn request_by_id(
        &mut self,
        id: AccessRequestId,
    ) -> Result<Option<AccessRequest>, StoreError> {
        Ok(self.working.requests.get(&id).cloned())
    }

    async fn request_by_email(
        &mut self,
        email: &Email,
    ) -> Result<Option<AccessRequest>, StoreError> {
        Ok(self.working.request_by_email(email).cloned())
    }

    async fn insert_request(&mut self, request: &AccessRequest) -> Result<(), StoreError> {
        if self.working.request_by_email(&request.email).is_some() {
            return Err(StoreError::Conflict(format!(
                "access request email already exists ({})",
                request.id
            )));
        }
        self.working.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn update_request(&mut self, request: &AccessRequest) -> Result<(), StoreError> {
        match self.working.requests.get_mut(&request.id) {
            Some(stored) => {
                stored.name = request.name.clone();
                stored.status = request.status;
                stored.reviewed_at = request.reviewed_at;
                stored.reviewed_by = request.reviewed_by;
                stored.updated_at = request.updated_at;
                Ok(())
            }
            None => Err(StoreError::Backend(format!(
                "update of missing access request {}",
                request.id
            ))),
        }
    }

    async fn transition_request(
        &mut self,
        id: AccessRequestId,
        review: &Review,
    ) -> Result<u64, StoreError> {
        let changed = self
            .working
            .requests
            .get_mut(&id)
            .is_some_and(|r| r.apply_review(review));
        Ok(u64::from(changed))
    }

    async fn revoke_sessions(&mut self, user_id: UserId) -> Result<u64, StoreError> {
        Ok(self.working.revoke_sessions(user_id))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl SessionRegistry for InMemoryAccountStore {
    async fn create_session(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let session = Session::new(user_id, at);
        self.tables
            .lock()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn resolve_session(&self, id: SessionId) -> Result<Option<UserId>, StoreError> {
        Ok(self.tables.lock().await.sessions.get(&id).map(|s| s.user_id))
    }

    async fn revoke_all_sessions(&self, user_id: UserId) -> Result<u64, StoreError> {
        Ok(self.tables.lock().await.revoke_sessions(user_id))
    }

    async fn count_sessions(&self, user_id: UserId) -> Result<u64, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.sessions.values().filter(|s| s.user_id == user_id).count() as u64)
    }
}
