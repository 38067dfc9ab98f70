//! Notification decisions and message content.
//!
//! This module decides *which* messages a transition produces and renders them.
//! Delivery lives in `accessgate-infra` and is best-effort.

use serde::Serialize;

use accessgate_core::Email;

use crate::{AccessRequestStatus, DecisionOutcome, SubmissionPlan};

/// Message handed to the mail transport. `text` is the plain-text twin of `html`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Rendering inputs that come from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    /// Base URL without trailing slash.
    pub app_url: String,
    pub admin_email: Option<Email>,
}

impl NotificationSettings {
    pub fn new(app_url: impl Into<String>, admin_email: Option<Email>) -> Self {
        let app_url = app_url.into();
        Self {
            app_url: app_url.trim_end_matches('/').to_string(),
            admin_email,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.app_url, path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RequestReceived,
    NewRequestAlert,
    AccessApproved,
    AccessRejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    /// The requester the message is about.
    pub email: Email,
    pub name: Option<String>,
}

impl Notification {
    fn new(kind: NotificationKind, email: &Email, name: Option<&str>) -> Self {
        Self {
            kind,
            email: email.clone(),
            name: name.map(str::to_string),
        }
    }

    /// Messages for a submission: nothing unless the plan says notify; the admin
    /// alert only when an admin address is configured.
    pub fn for_submission(
        plan: &SubmissionPlan,
        email: &Email,
        name: Option<&str>,
        settings: &NotificationSettings,
    ) -> Vec<Notification> {
        if !plan.notify {
            return Vec::new();
        }

        let mut out = vec![Notification::new(NotificationKind::RequestReceived, email, name)];
        if settings.admin_email.is_some() {
            out.push(Notification::new(NotificationKind::NewRequestAlert, email, name));
        }
        out
    }

    /// Message for a decision; none for an idempotent re-decision.
    pub fn for_decision(outcome: &DecisionOutcome) -> Option<Notification> {
        if !outcome.changed {
            return None;
        }

        let request = &outcome.request;
        let kind = match request.status {
            AccessRequestStatus::Approved => NotificationKind::AccessApproved,
            AccessRequestStatus::Rejected => NotificationKind::AccessRejected,
            AccessRequestStatus::Pending => return None,
        };
        Some(Notification::new(kind, &request.email, request.name.as_deref()))
    }

    /// Returns `None` when the recipient is not configured.
    pub fn render(&self, settings: &NotificationSettings) -> Option<OutboundEmail> {
        match self.kind {
            NotificationKind::RequestReceived => Some(self.request_received()),
            NotificationKind::NewRequestAlert => {
                let admin = settings.admin_email.as_ref()?;
                Some(self.new_request_alert(admin, settings))
            }
            NotificationKind::AccessApproved => Some(self.access_approved(settings)),
            NotificationKind::AccessRejected => Some(self.access_rejected(settings)),
        }
    }

    fn greeting(&self) -> (String, String) {
        match self.name.as_deref() {
            Some(name) => (format!("Hi {},", escape_html(name)), format!("Hi {name},")),
            None => ("Hi,".to_string(), "Hi,".to_string()),
        }
    }

    fn request_received(&self) -> OutboundEmail {
        let (html_greeting, text_greeting) = self.greeting();
        let body = "Your access request has been received. An admin will review it shortly.";

        OutboundEmail {
            to: self.email.to_string(),
            subject: "Access request received".to_string(),
            html: wrap_html(&format!(
                "<p>{html_greeting}</p>\n<p>{body}</p>\n<p style=\"color:#6b7280;font-size:12px\">Requested for: {}</p>",
                escape_html(self.email.as_str())
            )),
            text: format!("{text_greeting}\n\n{body}\n\nRequested for: {}", self.email),
        }
    }

    fn new_request_alert(&self, admin: &Email, settings: &NotificationSettings) -> OutboundEmail {
        let review_url = settings.url("/admin/access-requests");
        let name = self.name.as_deref().unwrap_or("—");

        OutboundEmail {
            to: admin.to_string(),
            subject: "New access request".to_string(),
            html: wrap_html(&format!(
                "<p>New access request received:</p>\n<p><strong>Email:</strong> {}</p>\n<p><strong>Name:</strong> {}</p>\n<p><a href=\"{}\">Review requests</a></p>",
                escape_html(self.email.as_str()),
                escape_html(name),
                escape_html(&review_url)
            )),
            text: format!(
                "New access request received:\n\nEmail: {}\nName: {name}\n\nReview: {review_url}",
                self.email
            ),
        }
    }

    fn access_approved(&self, settings: &NotificationSettings) -> OutboundEmail {
        let (html_greeting, text_greeting) = self.greeting();
        let sign_in_url = settings.url("/login");
        let body = "Your access has been approved. You can now sign in.";

        OutboundEmail {
            to: self.email.to_string(),
            subject: "Access approved".to_string(),
            html: wrap_html(&format!(
                "<p>{html_greeting}</p>\n<p>{body}</p>\n<p><a href=\"{}\">Sign in</a></p>",
                escape_html(&sign_in_url)
            )),
            text: format!("{text_greeting}\n\n{body}\n\nSign in: {sign_in_url}"),
        }
    }

    fn access_rejected(&self, settings: &NotificationSettings) -> OutboundEmail {
        let (html_greeting, text_greeting) = self.greeting();
        let body = "Your access request was not approved at this time.";
        let contact = match &settings.admin_email {
            Some(admin) => format!("If you believe this is a mistake, contact: {admin}"),
            None => {
                "If you believe this is a mistake, please contact the administrator.".to_string()
            }
        };

        OutboundEmail {
            to: self.email.to_string(),
            subject: "Access request update".to_string(),
            html: wrap_html(&format!(
                "<p>{html_greeting}</p>\n<p>{body}</p>\n<p>{}</p>",
                escape_html(&contact)
            )),
            text: format!("{text_greeting}\n\n{body}\n\n{contact}"),
        }
    }
}

fn wrap_html(inner: &str) -> String {
    format!(
        "<div style=\"font-family:ui-sans-serif,system-ui,-apple-system,Segoe UI,Roboto,Helvetica,Arial;\">\n{inner}\n</div>"
    )
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccessRequest, Decision, Review, SubmissionWrite, SubmitStatus};
    use accessgate_core::UserId;
    use chrono::Utc;

    fn settings(admin: Option<&str>) -> NotificationSettings {
        NotificationSettings::new(
            "https://app.example.com/",
            admin.map(|a| Email::parse(a).unwrap()),
        )
    }

    fn email() -> Email {
        Email::parse("a@co.com").unwrap()
    }

    fn notify_plan() -> SubmissionPlan {
        SubmissionPlan {
            write: SubmissionWrite::Create,
            notify: true,
            status: SubmitStatus::Created,
        }
    }

    #[test]
    fn submission_alerts_admin_only_when_configured() {
        let without =
            Notification::for_submission(&notify_plan(), &email(), Some("Ann"), &settings(None));
        assert_eq!(without.len(), 1);
        assert_eq!(without[0].kind, NotificationKind::RequestReceived);

        let with = Notification::for_submission(
            &notify_plan(),
            &email(),
            Some("Ann"),
            &settings(Some("boss@co.com")),
        );
        let kinds: Vec<_> = with.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![NotificationKind::RequestReceived, NotificationKind::NewRequestAlert]
        );

        let alert = with[1].render(&settings(Some("boss@co.com"))).unwrap();
        assert_eq!(alert.to, "boss@co.com");
        assert!(alert.text.contains("https://app.example.com/admin/access-requests"));
    }

    #[test]
    fn silent_plan_produces_nothing() {
        let plan = SubmissionPlan {
            write: SubmissionWrite::None,
            notify: false,
            status: SubmitStatus::AcceptedNoOp,
        };
        let admin = settings(Some("boss@co.com"));
        assert!(Notification::for_submission(&plan, &email(), None, &admin).is_empty());
    }

    #[test]
    fn unchanged_decision_is_not_notified() {
        let mut request = AccessRequest::new(email(), None, Utc::now());
        request.apply_review(&Review::new(Decision::Approve, UserId::new(), Utc::now()));

        let repeat = DecisionOutcome {
            request: request.clone(),
            changed: false,
        };
        assert!(Notification::for_decision(&repeat).is_none());

        let first = DecisionOutcome {
            request,
            changed: true,
        };
        let n = Notification::for_decision(&first).unwrap();
        assert_eq!(n.kind, NotificationKind::AccessApproved);
        let msg = n.render(&settings(None)).unwrap();
        assert_eq!(msg.to, "a@co.com");
        assert_eq!(msg.subject, "Access approved");
        assert!(msg.text.contains("https://app.example.com/login"));
    }

    #[test]
    fn rejection_contact_line_depends_on_admin_address() {
        let n = Notification::new(NotificationKind::AccessRejected, &email(), None);

        let with = n.render(&settings(Some("boss@co.com"))).unwrap();
        assert!(with.text.ends_with("If you believe this is a mistake, contact: boss@co.com"));
        assert!(with.html.contains("contact: boss@co.com"));

        let without = n.render(&settings(None)).unwrap();
        assert!(without.text.ends_with("please contact the administrator."));
    }

    #[test]
    fn names_are_escaped_in_html_only() {
        let n = Notification::new(
            NotificationKind::RequestReceived,
            &email(),
            Some("<b>Ann & Co</b>"),
        );
        let msg = n.render(&settings(None)).unwrap();

        assert!(msg.html.contains("Hi &lt;b&gt;Ann &amp; Co&lt;/b&gt;,"));
        assert!(msg.text.starts_with("Hi <b>Ann & Co</b>,"));
    }

    #[test]
    fn every_message_has_plain_text() {
        let s = settings(Some("boss@co.com"));
        for kind in [
            NotificationKind::RequestReceived,
            NotificationKind::NewRequestAlert,
            NotificationKind::AccessApproved,
            NotificationKind::AccessRejected,
        ] {
            let msg = Notification::new(kind, &email(), Some("Ann")).render(&s).unwrap();
            assert!(!msg.text.is_empty());
            assert!(!msg.text.contains('<'));
        }
    }
}
