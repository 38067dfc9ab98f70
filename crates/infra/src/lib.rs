//! Infrastructure layer: storage, sessions, mail transport, configuration and
//! the access workflow service that ties them together.

pub mod config;
pub mod mailer;
pub mod notify;
pub mod service;
pub mod sessions;
pub mod store;


pub use config::AccessConfig;
pub use mailer::{InMemoryMailer, LogMailer, Mailer, MailerError};
pub use notify::NotificationDispatcher;
pub use service::{
    AccessService, CreateUserOutcome, RequestView, ReviewerSummary, ServiceError, ServiceResult,
    SubmitOutcome, bootstrap_admin,
};
pub use sessions::{Session, SessionRegistry};
pub use store::{AccountStore, AccountTx, InMemoryAccountStore, StoreError};
#[cfg(feature = "postgres")]
pub use store::PostgresAccountStore;
