use dealspark_auth::AccountRole;
use dealspark_core::UserId;

/// Principal context for a request (authenticated identity + account role).
///
/// Inserted by the auth middleware; every protected handler receives it
/// explicitly instead of reading ambient state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    role: AccountRole,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, role: AccountRole) -> Self {
        Self { user_id, role }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> AccountRole {
        self.role
    }
}
