use serde::Deserialize;
use serde_json::json;

use accessgate_access::{Decision, DecisionOutcome, StatusFilter};
use accessgate_auth::{Role, UserStatus};
use accessgate_infra::{CreateUserOutcome, SubmitOutcome};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitAccessRequest {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub action: Decision,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRequestsQuery {
    pub status: Option<String>,
}

impl ListRequestsQuery {
    /// Missing means `PENDING`; parsing is case-insensitive.
    pub fn filter(&self) -> Result<StatusFilter, accessgate_core::DomainError> {
        match self.status.as_deref() {
            None => Ok(StatusFilter::default()),
            Some(raw) => raw.parse(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn submit_outcome_to_json(outcome: &SubmitOutcome) -> serde_json::Value {
    json!({
        "status": outcome.status,
        "request": outcome.request,
    })
}

pub fn decision_outcome_to_json(outcome: &DecisionOutcome) -> serde_json::Value {
    json!({
        "request": outcome.request,
        "changed": outcome.changed,
    })
}

pub fn create_user_outcome_to_json(outcome: &CreateUserOutcome) -> serde_json::Value {
    json!({
        "user": outcome.user,
        "created": outcome.created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decide_body_uses_screaming_actions() {
        let body: DecideRequest = serde_json::from_str(r#"{"action":"REJECT"}"#).unwrap();
        assert_eq!(body.action, Decision::Reject);
        assert!(serde_json::from_str::<DecideRequest>(r#"{"action":"reject"}"#).is_err());
    }

    #[test]
    fn status_query_defaults_to_pending() {
        assert_eq!(ListRequestsQuery::default().filter().unwrap(), StatusFilter::Pending);

        let q = ListRequestsQuery { status: Some("all".into()) };
        assert_eq!(q.filter().unwrap(), StatusFilter::All);

        let q = ListRequestsQuery { status: Some("bogus".into()) };
        assert_eq!(q.filter().unwrap_err().to_string(), "validation failed: Invalid status filter");
    }
}
