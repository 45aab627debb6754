//! Turn-taking rules for a negotiation.
//!
//! The whole state machine lives in [`next_status`]; the aggregate only asks it
//! whether a move is legal and where it leads.

use serde::{Deserialize, Serialize};

/// Side of a negotiation, relative to one offer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Buyer,
    Owner,
}

impl Party {
    pub fn counterparty(self) -> Party {
        match self {
            Party::Buyer => Party::Owner,
            Party::Owner => Party::Buyer,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Party::Buyer => "buyer",
            Party::Owner => "owner",
        }
    }
}

impl core::fmt::Display for Party {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    CounteredByOwner,
    CounteredByBuyer,
    Accepted,
    Rejected,
}

impl OfferStatus {
    /// Party whose turn it is, or `None` once the negotiation is over.
    pub fn awaiting(self) -> Option<Party> {
        match self {
            OfferStatus::Pending | OfferStatus::CounteredByBuyer => Some(Party::Owner),
            OfferStatus::CounteredByOwner => Some(Party::Buyer),
            OfferStatus::Accepted | OfferStatus::Rejected => None,
        }
    }

    /// Pending or countered: still open for negotiation.
    pub fn is_active(self) -> bool {
        self.awaiting().is_some()
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::CounteredByOwner => "countered_by_owner",
            OfferStatus::CounteredByBuyer => "countered_by_buyer",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
        }
    }
}

impl core::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response to the counterparty's latest move.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferAction {
    Accept,
    Reject,
    Counter,
}

/// Status reached when `actor` performs `action` on an offer in `status`.
///
/// Returns `None` when the move is illegal: the offer is terminal, or it is the
/// other party's turn.
pub fn next_status(status: OfferStatus, actor: Party, action: OfferAction) -> Option<OfferStatus> {
    if status.awaiting() != Some(actor) {
        return None;
    }

    Some(match action {
        OfferAction::Accept => OfferStatus::Accepted,
        OfferAction::Reject => OfferStatus::Rejected,
        OfferAction::Counter => match actor {
            Party::Owner => OfferStatus::CounteredByOwner,
            Party::Buyer => OfferStatus::CounteredByBuyer,
        },
    })
}
