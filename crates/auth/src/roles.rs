use serde::{Deserialize, Serialize};

/// Account role carried in the access token.
///
/// Owners list products and answer offers on them; buyers make offers and
/// place orders. A user's side of a particular offer is decided by the offer
/// itself, not by this role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Buyer,
    Owner,
}

impl AccountRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountRole::Buyer => "buyer",
            AccountRole::Owner => "owner",
        }
    }

    pub fn is_owner(self) -> bool {
        matches!(self, AccountRole::Owner)
    }
}

impl core::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
