use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use accessgate_core::{DomainError, UserId};

use crate::{AccessRequest, AccessRequestStatus};

/// An administrator's verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target_status(&self) -> AccessRequestStatus {
        match self {
            Decision::Approve => AccessRequestStatus::Approved,
            Decision::Reject => AccessRequestStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVE" => Ok(Decision::Approve),
            "REJECT" => Ok(Decision::Reject),
            other => Err(DomainError::validation(format!("unknown action '{other}'"))),
        }
    }
}

/// The review stamped onto a request by a conditional status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Review {
    pub decision: Decision,
    pub reviewed_by: UserId,
    pub reviewed_at: DateTime<Utc>,
}

impl Review {
    pub fn new(decision: Decision, reviewed_by: UserId, reviewed_at: DateTime<Utc>) -> Self {
        Self {
            decision,
            reviewed_by,
            reviewed_at,
        }
    }
}

/// What a decide call produced.
///
/// `changed = false` means the request had already been decided (possibly by a
/// concurrent call); `request` is then the record as it stands, and callers
/// must not notify again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    pub request: AccessRequest,
    pub changed: bool,
}
