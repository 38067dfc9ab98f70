//! `accessgate-auth`: accounts, roles, and the authorization guard.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{
    AuthOutcome, AuthzError, ForbiddenReason, authorize, require_active, require_admin,
};
pub use principal::{Actor, CallerIdentity};
pub use roles::Role;
pub use user::{User, UserPatch, UserStatus, ensure_no_self_lockout};
