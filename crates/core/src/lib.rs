//! `accessgate-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod clock;
pub mod email;
pub mod error;
pub mod id;
pub mod value_object;

pub use clock::{Clock, ManualClock, SystemClock};
pub use email::Email;
pub use error::{DomainError, DomainResult};
pub use id::{AccessRequestId, SessionId, UserId};
pub use value_object::ValueObject;
