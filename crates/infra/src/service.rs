//! The access workflow: submission, review, user management and sign-in.
//!
//! Every admin operation runs the guard first and every state change runs in a
//! single store transaction. Notifications go out only after commit, and only
//! for transitions that actually changed something.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use accessgate_access::{
    AccessRequest, AccessRequestStatus, Decision, DecisionOutcome, Notification, Review,
    StatusFilter, SubmissionInput, SubmissionRejection, SubmissionWrite, SubmitStatus,
    check_email_domain, plan_submission,
};
use accessgate_auth::{
    AuthzError, CallerIdentity, ForbiddenReason, Role, User, UserPatch, UserStatus,
    ensure_no_self_lockout, require_admin,
};
use accessgate_core::{AccessRequestId, Clock, DomainError, Email, SessionId, UserId};

use crate::config::AccessConfig;
use crate::notify::NotificationDispatcher;
use crate::sessions::{Session, SessionRegistry};
use crate::store::{AccountStore, AccountTx, StoreError};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Unauthorized: no session")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(ForbiddenReason),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("User is blocked; unblock from User Management instead.")]
    BlockedUser,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Submission(#[from] SubmissionRejection),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => ServiceError::Unauthenticated,
            AuthzError::Forbidden(reason) => ServiceError::Forbidden(reason),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg)
            | DomainError::InvalidId(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::Conflict(msg) => ServiceError::Validation(msg),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub status: SubmitStatus,
    /// The request as stored after the call. `None` when the email already
    /// belongs to a pending user and no request exists.
    pub request: Option<AccessRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewerSummary {
    pub id: UserId,
    pub email: Email,
    pub name: Option<String>,
}

/// An access request as listed for admins, with the reviewer expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: AccessRequestId,
    pub email: Email,
    pub name: Option<String>,
    pub status: AccessRequestStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub reviewed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub reviewed_by: Option<ReviewerSummary>,
}

impl RequestView {
    fn new(request: AccessRequest, reviewer: Option<ReviewerSummary>) -> Self {
        Self {
            id: request.id,
            email: request.email,
            name: request.name,
            status: request.status,
            created_at: request.created_at,
            updated_at: request.updated_at,
            reviewed_at: request.reviewed_at,
            reviewed_by: reviewer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateUserOutcome {
    pub user: User,
    pub created: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

pub struct AccessService {
    store: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionRegistry>,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    allowed_domains: Vec<String>,
}

impl AccessService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionRegistry>,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
        config: &AccessConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            notifier,
            clock,
            allowed_domains: config.allowed_email_domains.clone(),
        }
    }

    // ── Public self-service ─────────────────────────────────────────────────

    /// Submit (or re-submit) a request to join.
    #[instrument(skip_all, err)]
    pub async fn submit(&self, email: &str, name: Option<&str>) -> ServiceResult<SubmitOutcome> {
        let input = SubmissionInput::parse(email, name)?;
        check_email_domain(&input.email, &self.allowed_domains)?;

        let now = self.clock.now();
        let mut tx = self.store.begin().await?;

        // Request before user, the order a decision locks them in. A decision
        // that commits while we wait is then visible in the user lookup.
        let existing = tx.request_by_email(&input.email).await?;
        let user_status = tx.user_by_email(&input.email).await?.map(|u| u.status);

        let plan = plan_submission(user_status, existing.as_ref(), input.name.as_deref(), now)?;

        let request = match (plan.write, existing) {
            (SubmissionWrite::None, existing) => existing,
            (SubmissionWrite::Create, _) => {
                let request = AccessRequest::new(input.email.clone(), input.name.clone(), now);
                match tx.insert_request(&request).await {
                    Ok(()) => Some(request),
                    // Lost a race with a concurrent first submission, which notified.
                    Err(StoreError::Conflict(_)) => {
                        return Ok(SubmitOutcome {
                            status: SubmitStatus::AcceptedNoOp,
                            request: None,
                        });
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            (SubmissionWrite::Resubmit, Some(mut request)) => {
                request.resubmit(input.name.as_deref(), now);
                tx.update_request(&request).await?;
                Some(request)
            }
            (SubmissionWrite::Resubmit, None) => {
                let missing = StoreError::Backend("resubmission without a stored request".into());
                return Err(missing.into());
            }
        };

        if plan.write != SubmissionWrite::None {
            tx.commit().await?;
        } else {
            drop(tx);
        }

        tracing::info!(
            status = ?plan.status,
            request_id = ?request.as_ref().map(|r| r.id),
            notify = plan.notify,
            "access request submitted"
        );

        if plan.notify {
            let name = request.as_ref().and_then(|r| r.name.as_deref());
            let notifications =
                Notification::for_submission(&plan, &input.email, name, self.notifier.settings());
            self.notifier.dispatch(notifications).await;
        }

        Ok(SubmitOutcome {
            status: plan.status,
            request,
        })
    }

    // ── Admin: access requests ──────────────────────────────────────────────

    #[instrument(skip(self, caller), err)]
    pub async fn list_requests(
        &self,
        caller: Option<&CallerIdentity>,
        filter: StatusFilter,
    ) -> ServiceResult<Vec<RequestView>> {
        require_admin(caller).into_result()?;

        let requests = self.store.list_requests(filter).await?;

        let mut reviewers: HashMap<UserId, Option<ReviewerSummary>> = HashMap::new();
        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            let reviewer = match request.reviewed_by {
                Some(id) => {
                    if !reviewers.contains_key(&id) {
                        let summary = self.store.find_user(id).await?.map(|u| ReviewerSummary {
                            id: u.id,
                            email: u.email,
                            name: u.name,
                        });
                        reviewers.insert(id, summary);
                    }
                    reviewers.get(&id).cloned().flatten()
                }
                None => None,
            };
            views.push(RequestView::new(request, reviewer));
        }
        Ok(views)
    }

    /// Approve or reject a pending request.
    ///
    /// Deciding an already-decided request is not an error: the stored record
    /// comes back with `changed = false` and nothing is re-provisioned or
    /// re-notified.
    #[instrument(skip(self, caller), fields(request_id = %id), err)]
    pub async fn decide(
        &self,
        caller: Option<&CallerIdentity>,
        id: AccessRequestId,
        decision: Decision,
    ) -> ServiceResult<DecisionOutcome> {
        let actor = require_admin(caller).into_result()?;
        let now = self.clock.now();
        let review = Review::new(decision, actor.user_id, now);

        let mut tx = self.store.begin().await?;

        let affected = tx.transition_request(id, &review).await?;
        let request = tx
            .request_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("Request not found"))?;

        if affected == 0 {
            tracing::info!(status = %request.status, "access request already decided");
            return Ok(DecisionOutcome {
                request,
                changed: false,
            });
        }

        if decision == Decision::Approve {
            let user_id = provision_user(&mut *tx, &request, now).await?;
            let revoked = tx.revoke_sessions(user_id).await?;
            tracing::info!(user_id = %user_id, revoked, "user provisioned from access request");
        }

        tx.commit().await?;

        let outcome = DecisionOutcome {
            request,
            changed: true,
        };
        tracing::info!(
            status = %outcome.request.status,
            reviewed_by = %actor.user_id,
            "access request decided"
        );

        self.notifier
            .dispatch(Notification::for_decision(&outcome).into_iter().collect())
            .await;

        Ok(outcome)
    }

    pub async fn approve(
        &self,
        caller: Option<&CallerIdentity>,
        id: AccessRequestId,
    ) -> ServiceResult<DecisionOutcome> {
        self.decide(caller, id, Decision::Approve).await
    }

    pub async fn reject(
        &self,
        caller: Option<&CallerIdentity>,
        id: AccessRequestId,
    ) -> ServiceResult<DecisionOutcome> {
        self.decide(caller, id, Decision::Reject).await
    }

    // ── Admin: users ────────────────────────────────────────────────────────

    #[instrument(skip_all, err)]
    pub async fn list_users(&self, caller: Option<&CallerIdentity>) -> ServiceResult<Vec<User>> {
        require_admin(caller).into_result()?;
        Ok(self.store.list_users().await?)
    }

    /// Create a user, or return the existing one for that email unchanged.
    ///
    /// New users start `PENDING`: provisioned but not yet allowed to sign in.
    #[instrument(skip_all, err)]
    pub async fn create_user(
        &self,
        caller: Option<&CallerIdentity>,
        email: &str,
        name: Option<&str>,
        role: Option<Role>,
    ) -> ServiceResult<CreateUserOutcome> {
        require_admin(caller).into_result()?;
        let email = Email::parse(email)?;
        let name = accessgate_access::submission::normalize_name(name)?;

        let mut tx = self.store.begin().await?;
        if let Some(user) = tx.user_by_email(&email).await? {
            return Ok(CreateUserOutcome {
                user,
                created: false,
            });
        }

        let user = User::new(
            email,
            name,
            role.unwrap_or_default(),
            UserStatus::Pending,
            self.clock.now(),
        );
        tx.insert_user(&user).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user created");
        Ok(CreateUserOutcome {
            user,
            created: true,
        })
    }

    /// Change a user's role and/or status, revoking their sessions.
    #[instrument(skip(self, caller, patch), fields(user_id = %id), err)]
    pub async fn update_user(
        &self,
        caller: Option<&CallerIdentity>,
        id: UserId,
        patch: UserPatch,
    ) -> ServiceResult<User> {
        let actor = require_admin(caller).into_result()?;
        patch.validate()?;
        ensure_no_self_lockout(&actor, id, &patch)?;

        let mut tx = self.store.begin().await?;
        let user = tx
            .patch_user(id, &patch, self.clock.now())
            .await?
            .ok_or(ServiceError::NotFound("User not found"))?;

        let revoked = if patch.revokes_sessions() {
            tx.revoke_sessions(user.id).await?
        } else {
            0
        };
        tx.commit().await?;

        tracing::info!(role = %user.role, status = %user.status, revoked, "user updated");
        Ok(user)
    }

    // ── Identity ────────────────────────────────────────────────────────────

    /// Open a session for an existing, active user.
    #[instrument(skip_all, err)]
    pub async fn sign_in(&self, email: &str) -> ServiceResult<(Session, User)> {
        let email = Email::parse(email)?;

        let user = {
            let mut tx = self.store.begin().await?;
            tx.user_by_email(&email).await?
        }
        .ok_or(ServiceError::NotFound("User not found"))?;

        if !user.is_active() {
            return Err(ServiceError::Forbidden(ForbiddenReason::AccountNotActive(
                user.status,
            )));
        }

        let session = self.sessions.create_session(user.id, self.clock.now()).await?;
        tracing::info!(user_id = %user.id, "session opened");
        Ok((session, user))
    }

    /// Resolve a bearer token into the caller's *current* identity.
    pub async fn resolve_caller(&self, token: SessionId) -> ServiceResult<Option<CallerIdentity>> {
        let Some(user_id) = self.sessions.resolve_session(token).await? else {
            return Ok(None);
        };
        Ok(self.store.find_user(user_id).await?.map(|u| u.identity()))
    }

    /// End every session of the calling user.
    pub async fn sign_out(&self, caller: Option<&CallerIdentity>) -> ServiceResult<u64> {
        let caller = caller.ok_or(ServiceError::Unauthenticated)?;
        Ok(self.sessions.revoke_all_sessions(caller.user_id).await?)
    }
}

/// Create or reactivate the user for an approved request. Returns its id.
///
/// A blocked user aborts the decision; the caller drops the transaction.
async fn provision_user<T>(
    tx: &mut T,
    request: &AccessRequest,
    now: chrono::DateTime<chrono::Utc>,
) -> ServiceResult<UserId>
where
    T: AccountTx + ?Sized,
{
    match tx.user_by_email(&request.email).await? {
        Some(user) => {
            let activated = tx
                .activate_user(user.id, request.name.as_deref(), now)
                .await?;
            if activated == 0 {
                return Err(ServiceError::BlockedUser);
            }
            Ok(user.id)
        }
        None => {
            let user = User::new(
                request.email.clone(),
                request.name.clone(),
                Role::User,
                UserStatus::Active,
                now,
            );
            tx.insert_user(&user).await?;
            Ok(user.id)
        }
    }
}

/// Make `email` an active ADMIN, creating the account if needed.
///
/// Operator bootstrap path: runs without a caller, so it must never be
/// reachable from the HTTP surface.
pub async fn bootstrap_admin(
    store: &dyn AccountStore,
    email: &str,
    name: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> ServiceResult<CreateUserOutcome> {
    let email = Email::parse(email)?;
    let name = accessgate_access::submission::normalize_name(name)?;

    let mut tx = store.begin().await?;
    let outcome = match tx.user_by_email(&email).await? {
        Some(mut user) => {
            let patch = UserPatch {
                role: Some(Role::Admin),
                status: Some(UserStatus::Active),
            };
            let changed = user.role != Role::Admin || user.status != UserStatus::Active;
            user.apply_patch(&patch, now);
            if name.is_some() {
                user.name = name;
            }
            tx.update_user(&user).await?;
            if changed {
                tx.revoke_sessions(user.id).await?;
            }
            CreateUserOutcome {
                user,
                created: false,
            }
        }
        None => {
            let user = User::new(email, name, Role::Admin, UserStatus::Active, now);
            tx.insert_user(&user).await?;
            CreateUserOutcome {
                user,
                created: true,
            }
        }
    };
    tx.commit().await?;

    tracing::info!(user_id = %outcome.user.id, created = outcome.created, "admin account ensured");
    Ok(outcome)
}
