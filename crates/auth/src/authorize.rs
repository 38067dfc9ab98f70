use serde::Serialize;
use thiserror::Error;

use accessgate_core::UserId;

use crate::{Actor, CallerIdentity, Role, UserStatus};

/// Why an authenticated caller was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ForbiddenReason {
    /// Status is not `ACTIVE`.
    AccountNotActive(UserStatus),
    /// Active, but lacks the required role.
    RoleRequired(Role),
}

impl core::fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ForbiddenReason::AccountNotActive(status) => {
                write!(f, "Forbidden: account not active (status is {status})")
            }
            ForbiddenReason::RoleRequired(role) => write!(f, "Forbidden: {role} role required"),
        }
    }
}

/// Result of running the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Allowed { user_id: UserId, role: Role },
    Unauthenticated,
    Forbidden(ForbiddenReason),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Unauthorized: no session")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(ForbiddenReason),
}

impl AuthOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthOutcome::Allowed { .. })
    }

    pub fn into_result(self) -> Result<Actor, AuthzError> {
        match self {
            AuthOutcome::Allowed { user_id, role } => Ok(Actor { user_id, role }),
            AuthOutcome::Unauthenticated => Err(AuthzError::Unauthenticated),
            AuthOutcome::Forbidden(reason) => Err(AuthzError::Forbidden(reason)),
        }
    }
}

type Check = fn(&CallerIdentity, Option<Role>) -> Result<(), ForbiddenReason>;

/// Checks run after identity presence, in this order. A blocked admin is
/// reported as "account not active", never as a role problem.
const CHECKS: [Check; 2] = [check_active, check_role];

fn check_active(caller: &CallerIdentity, _required: Option<Role>) -> Result<(), ForbiddenReason> {
    if caller.status != UserStatus::Active {
        return Err(ForbiddenReason::AccountNotActive(caller.status));
    }
    Ok(())
}

fn check_role(caller: &CallerIdentity, required: Option<Role>) -> Result<(), ForbiddenReason> {
    match required {
        Some(role) if caller.role != role => Err(ForbiddenReason::RoleRequired(role)),
        _ => Ok(()),
    }
}

/// Decide whether a caller may proceed.
///
/// - No IO
/// - No panics
/// - `required = None` means "any active user"
pub fn authorize(caller: Option<&CallerIdentity>, required: Option<Role>) -> AuthOutcome {
    let Some(caller) = caller else {
        return AuthOutcome::Unauthenticated;
    };

    for check in CHECKS {
        if let Err(reason) = check(caller, required) {
            return AuthOutcome::Forbidden(reason);
        }
    }

    AuthOutcome::Allowed {
        user_id: caller.user_id,
        role: caller.role,
    }
}

pub fn require_admin(caller: Option<&CallerIdentity>) -> AuthOutcome {
    authorize(caller, Some(Role::Admin))
}

pub fn require_active(caller: Option<&CallerIdentity>) -> AuthOutcome {
    authorize(caller, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use accessgate_core::Email;
    use proptest::prelude::*;

    fn caller(role: Role, status: UserStatus) -> CallerIdentity {
        CallerIdentity {
            user_id: UserId::new(),
            email: Email::parse("someone@co.com").unwrap(),
            role,
            status,
        }
    }

    #[test]
    fn missing_identity_is_unauthenticated() {
        assert_eq!(authorize(None, Some(Role::Admin)), AuthOutcome::Unauthenticated);
        assert_eq!(authorize(None, None), AuthOutcome::Unauthenticated);
    }

    #[test]
    fn blocked_admin_is_not_active_rather_than_missing_role() {
        let c = caller(Role::Admin, UserStatus::Blocked);
        assert_eq!(
            require_admin(Some(&c)),
            AuthOutcome::Forbidden(ForbiddenReason::AccountNotActive(UserStatus::Blocked))
        );
    }

    #[test]
    fn active_user_lacks_admin_role() {
        let c = caller(Role::User, UserStatus::Active);
        let outcome = require_admin(Some(&c));
        assert_eq!(outcome, AuthOutcome::Forbidden(ForbiddenReason::RoleRequired(Role::Admin)));
        assert_eq!(
            outcome.into_result().unwrap_err().to_string(),
            "Forbidden: ADMIN role required"
        );
    }

    #[test]
    fn active_admin_is_allowed() {
        let c = caller(Role::Admin, UserStatus::Active);
        let actor = require_admin(Some(&c)).into_result().unwrap();
        assert_eq!(actor.user_id, c.user_id);
        assert_eq!(actor.role, Role::Admin);
    }

    #[test]
    fn any_active_user_passes_without_required_role() {
        let c = caller(Role::User, UserStatus::Active);
        assert!(require_active(Some(&c)).is_allowed());
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::Admin), Just(Role::User)]
    }

    fn any_status() -> impl Strategy<Value = UserStatus> {
        prop_oneof![
            Just(UserStatus::Active),
            Just(UserStatus::Pending),
            Just(UserStatus::Blocked)
        ]
    }

    proptest! {
        /// Property: a non-active account is always reported as not active,
        /// whatever its role and whatever role is required.
        #[test]
        fn status_is_checked_before_role(
            role in any_role(),
            status in any_status(),
            required in proptest::option::of(any_role()),
        ) {
            let c = caller(role, status);
            let outcome = authorize(Some(&c), required);

            if status != UserStatus::Active {
                prop_assert_eq!(outcome, AuthOutcome::Forbidden(ForbiddenReason::AccountNotActive(status)));
            } else if required.is_some_and(|r| r != role) {
                prop_assert!(matches!(outcome, AuthOutcome::Forbidden(ForbiddenReason::RoleRequired(_))));
            } else {
                prop_assert!(outcome.is_allowed());
            }
        }
    }
}
