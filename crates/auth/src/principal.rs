use serde::{Deserialize, Serialize};

use accessgate_core::{Email, UserId};

use crate::{Role, UserStatus};

/// A caller's resolved identity.
///
/// Built by the identity layer from the *current* stored user record, never
/// from state cached in a token, so role and status changes take effect on
/// the next request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub user_id: UserId,
    pub email: Email,
    pub role: Role,
    pub status: UserStatus,
}

/// A caller that passed the guard. Workflow operations take this as proof.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}
