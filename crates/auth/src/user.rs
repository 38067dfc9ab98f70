//! User accounts and their role/status lifecycle.
//!
//! Users are never hard-deleted here. They are created on access-request
//! approval or directly by an administrator, and mutated only through role or
//! status changes.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use accessgate_core::{DomainError, DomainResult, Email, UserId};

use crate::{Actor, CallerIdentity, Role};

// ─────────────────────────────────────────────────────────────────────────────
// User Status
// ─────────────────────────────────────────────────────────────────────────────

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// Can sign in and pass the guard.
    Active,
    /// Provisioned but not yet allowed in.
    #[default]
    Pending,
    /// Explicitly locked out. Only direct user management can lift this.
    Blocked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Pending => "PENDING",
            UserStatus::Blocked => "BLOCKED",
        }
    }
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(UserStatus::Active),
            "PENDING" => Ok(UserStatus::Pending),
            "BLOCKED" => Ok(UserStatus::Blocked),
            other => Err(DomainError::validation(format!("unknown user status '{other}'"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A stored user account.
///
/// # Invariants
/// - `email` is globally unique (enforced by the store).
/// - `updated_at >= created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: Email,
        name: Option<String>,
        role: Role,
        status: UserStatus,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            email,
            name,
            role,
            status,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn identity(&self) -> CallerIdentity {
        CallerIdentity {
            user_id: self.id,
            email: self.email.clone(),
            role: self.role,
            status: self.status,
        }
    }

    fn ensure_not_blocked(&self) -> DomainResult<()> {
        if self.status == UserStatus::Blocked {
            return Err(DomainError::conflict("user is blocked"));
        }
        Ok(())
    }

    /// Reactivate this account as the side effect of an approved access request.
    ///
    /// A blocked account stays blocked: approving a stale request must never
    /// lift a block. The name is only filled in when the account has none.
    pub fn activate_from_approval(
        &mut self,
        name: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.ensure_not_blocked()?;

        self.status = UserStatus::Active;
        if self.name.is_none() {
            self.name = name.map(str::to_string);
        }
        self.updated_at = at;
        Ok(())
    }

    /// Apply an administrative role/status change.
    pub fn apply_patch(&mut self, patch: &UserPatch, at: DateTime<Utc>) {
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = at;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Administrative changes
// ─────────────────────────────────────────────────────────────────────────────

/// Role and/or status change requested by an administrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

impl UserPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if self.role.is_none() && self.status.is_none() {
            return Err(DomainError::validation("Provide role and/or status"));
        }
        Ok(())
    }

    /// Whether applying this patch must invalidate the target's sessions.
    ///
    /// Any supplied role or status counts as a change of granted trust.
    pub fn revokes_sessions(&self) -> bool {
        self.role.is_some() || self.status.is_some()
    }
}

/// Reject a patch that would leave the acting admin without an active ADMIN account.
///
/// Checked before any storage work starts.
pub fn ensure_no_self_lockout(
    actor: &Actor,
    target: UserId,
    patch: &UserPatch,
) -> DomainResult<()> {
    if actor.user_id != target {
        return Ok(());
    }

    let next_role = patch.role.unwrap_or(actor.role);
    let next_status = patch.status.unwrap_or(UserStatus::Active);

    if next_role != Role::Admin || next_status != UserStatus::Active {
        return Err(DomainError::validation("You cannot remove your own admin access."));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn user(status: UserStatus, name: Option<&str>) -> User {
        User::new(
            Email::parse("ann@co.com").unwrap(),
            name.map(str::to_string),
            Role::User,
            status,
            now(),
        )
    }

    #[test]
    fn approval_activates_pending_user_and_fills_missing_name() {
        let mut u = user(UserStatus::Pending, None);
        u.activate_from_approval(Some("Ann"), now()).unwrap();

        assert_eq!(u.status, UserStatus::Active);
        assert_eq!(u.name.as_deref(), Some("Ann"));
    }

    #[test]
    fn approval_keeps_existing_name() {
        let mut u = user(UserStatus::Pending, Some("Annie"));
        u.activate_from_approval(Some("Ann"), now()).unwrap();
        assert_eq!(u.name.as_deref(), Some("Annie"));
    }

    #[test]
    fn approval_never_unblocks() {
        let mut u = user(UserStatus::Blocked, None);
        let err = u.activate_from_approval(Some("Ann"), now()).unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(u.status, UserStatus::Blocked);
        assert!(u.name.is_none());
    }

    fn patch(role: Option<Role>, status: Option<UserStatus>) -> UserPatch {
        UserPatch { role, status }
    }

    #[test]
    fn empty_patch_is_invalid() {
        assert!(UserPatch::default().validate().is_err());
        assert!(patch(Some(Role::Admin), None).validate().is_ok());
    }

    #[test]
    fn admin_cannot_demote_or_deactivate_self() {
        let actor = Actor {
            user_id: UserId::new(),
            role: Role::Admin,
        };

        let demote = patch(Some(Role::User), None);
        let block = patch(None, Some(UserStatus::Blocked));
        let park = patch(None, Some(UserStatus::Pending));

        for change in [demote, block, park] {
            let err = ensure_no_self_lockout(&actor, actor.user_id, &change).unwrap_err();
            assert!(err.to_string().contains("own admin access"));
        }
    }

    #[test]
    fn admin_may_reaffirm_self_or_change_others() {
        let actor = Actor {
            user_id: UserId::new(),
            role: Role::Admin,
        };

        let reaffirm = patch(Some(Role::Admin), Some(UserStatus::Active));
        assert!(ensure_no_self_lockout(&actor, actor.user_id, &reaffirm).is_ok());

        let demote_other = patch(Some(Role::User), Some(UserStatus::Blocked));
        assert!(ensure_no_self_lockout(&actor, UserId::new(), &demote_other).is_ok());
    }

    #[test]
    fn status_parsing_is_closed() {
        assert_eq!("BLOCKED".parse::<UserStatus>().unwrap(), UserStatus::Blocked);
        assert!("SUSPENDED".parse::<UserStatus>().is_err());
    }
}
