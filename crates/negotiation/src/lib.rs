//! Negotiation domain module (event-sourced).
//!
//! An offer is a turn-based exchange between a buyer and a product owner:
//! the buyer opens at or above 95% of the deal price, then each side may
//! accept, reject or counter the other's latest move until the offer is
//! accepted or rejected. Pure domain logic (no IO, no HTTP, no storage).

pub mod offer;
pub mod transition;

pub use offer::{
    AGGREGATE_TYPE, CreateOffer, HistoryEntry, MIN_OFFER_BPS, MarkSeen, Offer, OfferAccepted,
    OfferCommand, OfferCountered, OfferCreated, OfferEvent, OfferId, OfferRejected, OfferRemoved,
    OfferSeen, RemoveOffer, RespondToOffer,
};
pub use transition::{OfferAction, OfferStatus, Party, next_status};
