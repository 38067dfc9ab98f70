use accessgate_auth::CallerIdentity;

/// Caller context for a request.
///
/// Always present on routed requests. Holds the identity resolved from the
/// bearer token, or nothing when no valid session was presented; the guard
/// decides what an absent identity means for each route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    identity: Option<CallerIdentity>,
}

impl CallerContext {
    pub fn new(identity: Option<CallerIdentity>) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> Option<&CallerIdentity> {
        self.identity.as_ref()
    }
}
