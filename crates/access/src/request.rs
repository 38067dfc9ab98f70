//! Access request record and its review lifecycle.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use accessgate_core::{AccessRequestId, DomainError, DomainResult, Email, UserId};

use crate::decision::Review;

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessRequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl AccessRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRequestStatus::Pending => "PENDING",
            AccessRequestStatus::Approved => "APPROVED",
            AccessRequestStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AccessRequestStatus::Pending)
    }
}

impl core::fmt::Display for AccessRequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessRequestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AccessRequestStatus::Pending),
            "APPROVED" => Ok(AccessRequestStatus::Approved),
            "REJECTED" => Ok(AccessRequestStatus::Rejected),
            other => Err(DomainError::validation(format!(
                "unknown access request status '{other}'"
            ))),
        }
    }
}

/// Listing filter for the admin queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    Pending,
    Approved,
    Rejected,
    All,
}

impl StatusFilter {
    pub fn matches(&self, status: AccessRequestStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == AccessRequestStatus::Pending,
            StatusFilter::Approved => status == AccessRequestStatus::Approved,
            StatusFilter::Rejected => status == AccessRequestStatus::Rejected,
        }
    }

    /// `None` for `ALL`.
    pub fn status(&self) -> Option<AccessRequestStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Pending => Some(AccessRequestStatus::Pending),
            StatusFilter::Approved => Some(AccessRequestStatus::Approved),
            StatusFilter::Rejected => Some(AccessRequestStatus::Rejected),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = DomainError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(StatusFilter::Pending),
            "APPROVED" => Ok(StatusFilter::Approved),
            "REJECTED" => Ok(StatusFilter::Rejected),
            "ALL" => Ok(StatusFilter::All),
            _ => Err(DomainError::validation("Invalid status filter")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Record
// ─────────────────────────────────────────────────────────────────────────────

/// A request to join, one per email.
///
/// # Invariants
/// - `reviewed_at` and `reviewed_by` are set iff `status != PENDING`.
/// - At most one request per email (enforced by the store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: AccessRequestId,
    pub email: Email,
    pub name: Option<String>,
    pub status: AccessRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<UserId>,
}

impl AccessRequest {
    pub fn new(email: Email, name: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: AccessRequestId::new(),
            email,
            name,
            status: AccessRequestStatus::Pending,
            created_at: at,
            updated_at: at,
            reviewed_at: None,
            reviewed_by: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == AccessRequestStatus::Pending
    }

    /// Put the request (back) into the review queue.
    ///
    /// Used both for refreshing a pending request and for opening a new review
    /// cycle on a decided one. The name is only replaced when one is supplied.
    pub fn resubmit(&mut self, name: Option<&str>, at: DateTime<Utc>) {
        if let Some(name) = name {
            self.name = Some(name.to_string());
        }
        self.status = AccessRequestStatus::Pending;
        self.reviewed_at = None;
        self.reviewed_by = None;
        self.updated_at = at;
    }

    /// Compare-and-swap on status: records the review only while still pending.
    ///
    /// Returns whether the record changed.
    pub fn apply_review(&mut self, review: &Review) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = review.decision.target_status();
        self.reviewed_at = Some(review.reviewed_at);
        self.reviewed_by = Some(review.reviewed_by);
        self.updated_at = review.reviewed_at;
        true
    }

    pub fn check_invariants(&self) -> DomainResult<()> {
        let reviewed = self.reviewed_at.is_some() && self.reviewed_by.is_some();
        let unreviewed = self.reviewed_at.is_none() && self.reviewed_by.is_none();

        match (self.status.is_terminal(), reviewed, unreviewed) {
            (true, true, _) | (false, _, true) => Ok(()),
            _ => Err(DomainError::invariant(
                "review fields must be set exactly when the request is decided",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Decision;

    fn request() -> AccessRequest {
        AccessRequest::new(Email::parse("a@co.com").unwrap(), Some("Ann".into()), Utc::now())
    }

    #[test]
    fn review_applies_once() {
        let mut r = request();
        let reviewer = UserId::new();

        assert!(r.apply_review(&Review::new(Decision::Approve, reviewer, Utc::now())));
        assert_eq!(r.status, AccessRequestStatus::Approved);
        assert_eq!(r.reviewed_by, Some(reviewer));

        assert!(!r.apply_review(&Review::new(Decision::Reject, UserId::new(), Utc::now())));
        assert_eq!(r.status, AccessRequestStatus::Approved);
        assert_eq!(r.reviewed_by, Some(reviewer));
        r.check_invariants().unwrap();
    }

    #[test]
    fn resubmit_clears_review_and_keeps_name_when_absent() {
        let mut r = request();
        r.apply_review(&Review::new(Decision::Reject, UserId::new(), Utc::now()));

        r.resubmit(None, Utc::now());

        assert!(r.is_pending());
        assert_eq!(r.name.as_deref(), Some("Ann"));
        assert!(r.reviewed_at.is_none() && r.reviewed_by.is_none());
        r.check_invariants().unwrap();
    }

    #[test]
    fn half_reviewed_record_violates_invariant() {
        let mut r = request();
        r.reviewed_by = Some(UserId::new());
        assert!(r.check_invariants().is_err());
    }

    #[test]
    fn filter_parsing_is_case_insensitive() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!("Approved".parse::<StatusFilter>().unwrap(), StatusFilter::Approved);
        assert!("everything".parse::<StatusFilter>().is_err());
        assert_eq!(StatusFilter::default(), StatusFilter::Pending);
    }
}
