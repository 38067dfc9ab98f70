//! `accessgate-access`: the request-to-join workflow model.
//!
//! Pure state and decisions only: storage and delivery are wired in
//! `accessgate-infra`.

pub mod decision;
pub mod notification;
pub mod request;
pub mod submission;

pub use decision::{Decision, DecisionOutcome, Review};
pub use notification::{Notification, NotificationKind, NotificationSettings, OutboundEmail};
pub use request::{AccessRequest, AccessRequestStatus, StatusFilter};
pub use submission::{
    SubmissionInput, SubmissionPlan, SubmissionRejection, SubmissionWrite, SubmitStatus,
    check_email_domain, plan_submission,
};
