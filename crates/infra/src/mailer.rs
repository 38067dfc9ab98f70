//! Mail transport boundary.
//!
//! Real delivery is an external collaborator. `LogMailer` is the default
//! transport and only records what would have been sent; `InMemoryMailer`
//! captures messages for tests and can be told to fail.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use accessgate_access::OutboundEmail;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailerError {
    #[error("mail transport unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError>;
}

#[async_trait]
impl<M> Mailer for Arc<M>
where
    M: Mailer + ?Sized,
{
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        (**self).send(email).await
    }
}

/// Writes each message to the log instead of delivering it.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        tracing::info!(
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            "outbound email"
        );
        tracing::debug!(body = %email.text, "outbound email body");
        Ok(())
    }
}

/// Captures sent messages.
#[derive(Debug, Default)]
pub struct InMemoryMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: AtomicBool,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every send fails and nothing is captured.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn sent_to(&self, to: &str) -> Vec<OutboundEmail> {
        self.sent().into_iter().filter(|m| m.to == to).collect()
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailerError::Unavailable("transport switched off".to_string()));
        }

        self.sent
            .lock()
            .map_err(|_| MailerError::Unavailable("lock poisoned".to_string()))?
            .push(email.clone());
        Ok(())
    }
}
