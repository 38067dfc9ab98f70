//! Best-effort notification delivery.
//!
//! The dispatcher renders [`Notification`]s and hands them to a [`Mailer`].
//! Transport failures are logged and swallowed: they never reach the caller
//! and never undo the state transition that triggered them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use accessgate_access::{Notification, NotificationSettings, OutboundEmail};

use crate::mailer::Mailer;

enum Delivery {
    /// Await the transport in the caller's task.
    Inline(Arc<dyn Mailer>),
    /// Queue for a worker task.
    Background(mpsc::UnboundedSender<OutboundEmail>),
}

pub struct NotificationDispatcher {
    settings: NotificationSettings,
    delivery: Delivery,
}

impl NotificationDispatcher {
    pub fn inline(mailer: Arc<dyn Mailer>, settings: NotificationSettings) -> Self {
        Self {
            settings,
            delivery: Delivery::Inline(mailer),
        }
    }

    /// Spawn a worker that drains the queue. Must be called inside a tokio runtime.
    ///
    /// The worker stops once the dispatcher is dropped and the queue is empty.
    pub fn background(
        mailer: Arc<dyn Mailer>,
        settings: NotificationSettings,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<OutboundEmail>();

        let handle = tokio::spawn(async move {
            while let Some(email) = rx.recv().await {
                deliver(mailer.as_ref(), &email).await;
            }
            tracing::debug!("notification worker stopped");
        });

        let dispatcher = Self {
            settings,
            delivery: Delivery::Background(tx),
        };
        (dispatcher, handle)
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    pub async fn dispatch(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            let Some(email) = notification.render(&self.settings) else {
                continue;
            };

            match &self.delivery {
                Delivery::Inline(mailer) => deliver(mailer.as_ref(), &email).await,
                Delivery::Background(queue) => {
                    if let Err(err) = queue.send(email) {
                        tracing::warn!(
                            to = %err.0.to,
                            subject = %err.0.subject,
                            "notification worker gone; message dropped"
                        );
                    }
                }
            }
        }
    }
}

async fn deliver(mailer: &dyn Mailer, email: &OutboundEmail) {
    if let Err(err) = mailer.send(email).await {
        tracing::warn!(
            to = %email.to,
            subject = %email.subject,
            error = %err,
            "failed to send notification email"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::InMemoryMailer;
    use accessgate_access::{
        AccessRequest, Decision, DecisionOutcome, Review, SubmissionPlan, SubmissionWrite,
        SubmitStatus,
    };
    use accessgate_core::{Email, UserId};
    use chrono::Utc;

    fn settings() -> NotificationSettings {
        NotificationSettings::new(
            "http://localhost:3000",
            Some(Email::parse("admin@co.com").unwrap()),
        )
    }

    fn submission() -> Vec<Notification> {
        let plan = SubmissionPlan {
            write: SubmissionWrite::Create,
            notify: true,
            status: SubmitStatus::Created,
        };
        let email = Email::parse("a@co.com").unwrap();
        Notification::for_submission(&plan, &email, Some("Ann"), &settings())
    }

    #[tokio::test]
    async fn inline_delivery_sends_every_rendered_message() {
        let mailer = Arc::new(InMemoryMailer::new());
        let dispatcher = NotificationDispatcher::inline(mailer.clone(), settings());

        dispatcher.dispatch(submission()).await;

        assert_eq!(mailer.sent_to("a@co.com").len(), 1);
        assert_eq!(mailer.sent_to("admin@co.com").len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        let mailer = Arc::new(InMemoryMailer::new());
        mailer.set_failing(true);
        let dispatcher = NotificationDispatcher::inline(mailer.clone(), settings());

        dispatcher.dispatch(submission()).await;

        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn background_worker_drains_queue() {
        let mailer = Arc::new(InMemoryMailer::new());
        let (dispatcher, worker) = NotificationDispatcher::background(mailer.clone(), settings());

        let mut request = AccessRequest::new(Email::parse("a@co.com").unwrap(), None, Utc::now());
        request.apply_review(&Review::new(Decision::Reject, UserId::new(), Utc::now()));
        let outcome = DecisionOutcome {
            request,
            changed: true,
        };
        dispatcher
            .dispatch(Notification::for_decision(&outcome).into_iter().collect())
            .await;

        drop(dispatcher);
        worker.await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Access request update");
    }
}
