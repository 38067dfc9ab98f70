//! Self-service submission of access requests.
//!
//! `plan_submission` is the single transition function for a submit call. It
//! yields *both* whether to write and whether to notify, so the two can never
//! drift apart.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use accessgate_auth::UserStatus;
use accessgate_core::{DomainError, DomainResult, Email};

use crate::AccessRequest;

/// Window during which an unchanged resubmission of a pending request is a silent no-op.
pub const SUBMISSION_COOLDOWN_MINUTES: i64 = 10;

pub const MAX_NAME_LEN: usize = 100;

pub fn submission_cooldown() -> Duration {
    Duration::minutes(SUBMISSION_COOLDOWN_MINUTES)
}

/// Validated submit input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionInput {
    pub email: Email,
    pub name: Option<String>,
}

impl SubmissionInput {
    pub fn parse(email: &str, name: Option<&str>) -> DomainResult<Self> {
        Ok(Self {
            email: Email::parse(email)?,
            name: normalize_name(name)?,
        })
    }
}

/// Trim; blank means absent.
pub fn normalize_name(raw: Option<&str>) -> DomainResult<Option<String>> {
    let Some(trimmed) = raw.map(str::trim) else {
        return Ok(None);
    };
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// Domain-specific refusals of a submission.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionRejection {
    #[error("Access already approved. Please sign in.")]
    AlreadyApproved,

    #[error("Account is blocked. Please contact an admin.")]
    Blocked,

    #[error("Email domain is not allowed for access requests.")]
    DomainNotAllowed,
}

/// Allow-list check. An empty list allows every domain.
pub fn check_email_domain(email: &Email, allowed: &[String]) -> Result<(), SubmissionRejection> {
    if allowed.is_empty() || allowed.iter().any(|d| d == email.domain()) {
        Ok(())
    } else {
        Err(SubmissionRejection::DomainNotAllowed)
    }
}

/// What the caller is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Created,
    Updated,
    AcceptedNoOp,
}

/// Storage effect of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionWrite {
    None,
    Create,
    /// Rewrite the existing record: refresh a pending one or open a new review cycle.
    Resubmit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionPlan {
    pub write: SubmissionWrite,
    pub notify: bool,
    pub status: SubmitStatus,
}

impl SubmissionPlan {
    const NO_OP: SubmissionPlan = SubmissionPlan {
        write: SubmissionWrite::None,
        notify: false,
        status: SubmitStatus::AcceptedNoOp,
    };
}

/// Decide what a submission does.
///
/// - An existing user short-circuits: ACTIVE and BLOCKED are refused, PENDING is
///   accepted without touching the request table.
/// - No request yet: create and notify.
/// - Decided request: reopen and notify (new review cycle).
/// - Pending request: rewrite and notify only if the name changed or the
///   cooldown since the last update has passed; otherwise a silent no-op.
pub fn plan_submission(
    existing_user: Option<UserStatus>,
    existing_request: Option<&AccessRequest>,
    name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<SubmissionPlan, SubmissionRejection> {
    match existing_user {
        Some(UserStatus::Active) => return Err(SubmissionRejection::AlreadyApproved),
        Some(UserStatus::Blocked) => return Err(SubmissionRejection::Blocked),
        Some(UserStatus::Pending) => return Ok(SubmissionPlan::NO_OP),
        None => {}
    }

    let Some(request) = existing_request else {
        return Ok(SubmissionPlan {
            write: SubmissionWrite::Create,
            notify: true,
            status: SubmitStatus::Created,
        });
    };

    let changed = if request.is_pending() {
        let name_changed = name.is_some_and(|n| request.name.as_deref() != Some(n));
        let in_cooldown = now - request.updated_at < submission_cooldown();
        name_changed || !in_cooldown
    } else {
        true
    };

    if !changed {
        return Ok(SubmissionPlan::NO_OP);
    }

    Ok(SubmissionPlan {
        write: SubmissionWrite::Resubmit,
        notify: true,
        status: SubmitStatus::Updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Decision, Review};
    use accessgate_core::UserId;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn pending(name: Option<&str>) -> AccessRequest {
        AccessRequest::new(Email::parse("a@co.com").unwrap(), name.map(str::to_string), t0())
    }

    #[test]
    fn first_submission_creates_and_notifies() {
        let plan = plan_submission(None, None, Some("Ann"), t0()).unwrap();
        assert_eq!(plan.write, SubmissionWrite::Create);
        assert!(plan.notify);
        assert_eq!(plan.status, SubmitStatus::Created);
    }

    #[test]
    fn same_name_inside_cooldown_is_silent() {
        let r = pending(Some("Ann"));
        let plan =
            plan_submission(None, Some(&r), Some("Ann"), t0() + Duration::minutes(9)).unwrap();
        assert_eq!(plan, SubmissionPlan::NO_OP);

        let plan = plan_submission(None, Some(&r), None, t0() + Duration::minutes(1)).unwrap();
        assert_eq!(plan, SubmissionPlan::NO_OP);
    }

    #[test]
    fn different_name_inside_cooldown_writes_and_notifies() {
        let r = pending(Some("Ann"));
        let plan =
            plan_submission(None, Some(&r), Some("Annie"), t0() + Duration::minutes(1)).unwrap();
        assert_eq!(plan.write, SubmissionWrite::Resubmit);
        assert!(plan.notify);
        assert_eq!(plan.status, SubmitStatus::Updated);
    }

    #[test]
    fn cooldown_expires_after_ten_minutes() {
        let r = pending(Some("Ann"));
        let plan =
            plan_submission(None, Some(&r), Some("Ann"), t0() + Duration::minutes(10)).unwrap();
        assert_eq!(plan.write, SubmissionWrite::Resubmit);
        assert!(plan.notify);
    }

    #[test]
    fn decided_request_is_reopened_even_inside_cooldown() {
        let mut r = pending(Some("Ann"));
        r.apply_review(&Review::new(Decision::Reject, UserId::new(), t0()));

        let plan = plan_submission(None, Some(&r), None, t0() + Duration::seconds(5)).unwrap();
        assert_eq!(plan.write, SubmissionWrite::Resubmit);
        assert!(plan.notify);
    }

    #[test]
    fn existing_users_short_circuit() {
        assert_eq!(
            plan_submission(Some(UserStatus::Active), None, None, t0()),
            Err(SubmissionRejection::AlreadyApproved)
        );
        assert_eq!(
            plan_submission(Some(UserStatus::Blocked), None, None, t0()),
            Err(SubmissionRejection::Blocked)
        );
        let r = pending(None);
        assert_eq!(
            plan_submission(Some(UserStatus::Pending), Some(&r), Some("New"), t0()),
            Ok(SubmissionPlan::NO_OP)
        );
    }

    #[test]
    fn domain_allow_list() {
        let email = Email::parse("a@co.com").unwrap();
        assert!(check_email_domain(&email, &[]).is_ok());
        assert!(check_email_domain(&email, &["co.com".into()]).is_ok());
        assert_eq!(
            check_email_domain(&email, &["other.org".into()]),
            Err(SubmissionRejection::DomainNotAllowed)
        );
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(normalize_name(Some("  Ann ")).unwrap().as_deref(), Some("Ann"));
        assert_eq!(normalize_name(Some("   ")).unwrap(), None);
        assert!(normalize_name(Some(&"x".repeat(101))).is_err());
        assert!(normalize_name(Some(&"x".repeat(100))).is_ok());
    }

    proptest! {
        /// Property: for any submission against a pending request, a write
        /// happens exactly when a notification does.
        #[test]
        fn write_and_notify_agree_for_pending(
            stored in proptest::option::of("[A-C]"),
            supplied in proptest::option::of("[A-C]"),
            elapsed_secs in 0i64..3_600,
        ) {
            let r = pending(stored.as_deref());
            let plan = plan_submission(None, Some(&r), supplied.as_deref(), t0() + Duration::seconds(elapsed_secs)).unwrap();

            prop_assert_eq!(plan.write != SubmissionWrite::None, plan.notify);

            let name_changed = supplied.is_some() && supplied != stored;
            let expected = name_changed || elapsed_secs >= SUBMISSION_COOLDOWN_MINUTES * 60;
            prop_assert_eq!(plan.notify, expected);
        }
    }
}
