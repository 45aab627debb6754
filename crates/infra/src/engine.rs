//! Negotiation engine: the application service behind every offer operation.
//!
//! Writes go through the [`CommandDispatcher`](crate::command_dispatcher::CommandDispatcher)
//! onto the offer's own stream; the offer read model is caught up from the
//! store before the call returns, so a read issued after a write observes it.
//!
//! Concurrency:
//! - Two writers on one offer are serialized by `ExpectedVersion::Exact`. The
//!   loser reloads and decides again (up to [`MAX_ATTEMPTS`] times), so it sees
//!   the winner's status and fails with a state error if its move is now illegal.
//! - Two creates for the same (product, buyer) land in different streams and
//!   are arbitrated by the [`ActiveOfferIndex`].

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use dealspark_catalog::ProductId;
use dealspark_core::{Aggregate, DomainError, Money, UserId};
use dealspark_negotiation::{
    AGGREGATE_TYPE, CreateOffer, MarkSeen, Offer, OfferAction, OfferCommand, OfferEvent, OfferId,
    OfferStatus, Party, RemoveOffer, RespondToOffer,
};

use crate::active_index::ActiveOfferIndex;
use crate::catalog::CatalogStore;
use crate::command_dispatcher::{DispatchError, SharedDispatcher};
use crate::event_store::StoredEvent;
use crate::projections::{OfferProjection, OfferReadModel, ProjectionError, catch_up, rebuild};
use crate::read_model::InMemoryKeyedStore;

/// Attempts per command before a concurrency conflict is reported.
pub const MAX_ATTEMPTS: usize = 3;

/// Application-level error returned by the engine and the other services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    /// The action is not legal for the offer's status and the acting party.
    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    NotFound(String),

    /// Still conflicting after [`MAX_ATTEMPTS`] attempts.
    #[error("{0}")]
    Concurrency(String),

    /// Storage, serialization or read-model failure.
    #[error("{0}")]
    Server(String),
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(m) | DomainError::InvalidId(m) => EngineError::Validation(m),
            DomainError::InvalidTransition(m) => EngineError::InvalidTransition(m),
            DomainError::NotFound => EngineError::NotFound("not found".to_string()),
            DomainError::Conflict(m) => EngineError::Conflict(m),
            DomainError::Unauthorized(m) => EngineError::Unauthorized(m),
        }
    }
}

impl From<DispatchError> for EngineError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Domain(e) => e.into(),
            DispatchError::Concurrency(m) => EngineError::Concurrency(m),
            other => EngineError::Server(other.to_string()),
        }
    }
}

impl From<ProjectionError> for EngineError {
    fn from(value: ProjectionError) -> Self {
        EngineError::Server(value.to_string())
    }
}

type OfferStore = Arc<InMemoryKeyedStore<OfferId, OfferReadModel>>;

/// Offer lifecycle operations.
pub struct NegotiationEngine {
    dispatcher: Arc<SharedDispatcher>,
    catalog: Arc<dyn CatalogStore>,
    offers: OfferProjection<OfferStore>,
    index: ActiveOfferIndex,
}

impl std::fmt::Debug for NegotiationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiationEngine")
            .field("offers", &self.offers)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl NegotiationEngine {
    pub fn new(dispatcher: Arc<SharedDispatcher>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            dispatcher,
            catalog,
            offers: OfferProjection::new(Arc::new(InMemoryKeyedStore::new())),
            index: ActiveOfferIndex::new(),
        }
    }

    /// Replay every offer stream and re-derive the active-offer claims.
    /// Returns the number of events replayed.
    pub fn rebuild(&self) -> Result<usize, EngineError> {
        let replayed = rebuild(self.dispatcher.store(), &self.offers)?;
        self.index.rebuild(&self.offers.list());
        tracing::info!(active = self.index.len(), "active offer index rebuilt");
        Ok(replayed)
    }

    /// Open a negotiation on `product_id` at `offered_price`.
    ///
    /// Checks run in order: product exists, price and ownership rules, then
    /// uniqueness of the buyer's active offer.
    pub fn create_offer(
        &self,
        product_id: ProductId,
        buyer: UserId,
        offered_price: Money,
    ) -> Result<OfferReadModel, EngineError> {
        let product = self
            .catalog
            .get_product(product_id)
            .ok_or_else(|| EngineError::NotFound("product not found".to_string()))?;

        let offer_id = OfferId::generate();
        let cmd = OfferCommand::CreateOffer(CreateOffer {
            offer_id,
            product_id,
            buyer_id: buyer,
            owner_id: product.owner_id,
            offered_price,
            deal_price: product.deal_price,
            occurred_at: Utc::now(),
        });

        // Price rules are pure; reject before touching the index.
        Offer::empty(offer_id).handle(&cmd)?;

        if self.index.try_claim(product_id, buyer, offer_id).is_err() {
            return Err(EngineError::Conflict(
                "you already have an active offer for this product".to_string(),
            ));
        }

        if let Err(e) = self.dispatch(offer_id, cmd) {
            self.index.release(offer_id);
            return Err(e);
        }

        self.refresh(offer_id)
    }

    /// Accept, reject or counter on behalf of `actor`.
    pub fn transition(
        &self,
        offer_id: OfferId,
        actor: UserId,
        action: OfferAction,
        price: Option<Money>,
    ) -> Result<OfferReadModel, EngineError> {
        let committed = self.dispatch_with_retry(offer_id, || {
            OfferCommand::RespondToOffer(RespondToOffer {
                offer_id,
                actor,
                action,
                price,
                occurred_at: Utc::now(),
            })
        })?;

        // The claim follows the committed stream, not the read model.
        if closes_negotiation(&committed) {
            self.index.release(offer_id);
        }
        self.refresh(offer_id)
    }

    /// Remove the offer, whatever its status. Either party may do this.
    pub fn delete_offer(&self, offer_id: OfferId, actor: UserId) -> Result<(), EngineError> {
        self.dispatch_with_retry(offer_id, || {
            OfferCommand::RemoveOffer(RemoveOffer {
                offer_id,
                actor,
                occurred_at: Utc::now(),
            })
        })?;

        self.index.release(offer_id);
        catch_up(self.dispatcher.store(), &self.offers, offer_id.aggregate_id())?;
        Ok(())
    }

    /// Mark every offer `user` takes part in as `party` seen by that side.
    /// Returns how many offers changed.
    pub fn mark_seen(&self, user: UserId, party: Party) -> Result<usize, EngineError> {
        let mut updated = 0;
        for offer in self.offers.list_for(user, party) {
            if offer.seen_by(party) {
                continue;
            }
            let offer_id = offer.offer_id;
            let committed = match self.dispatch_with_retry(offer_id, || {
                OfferCommand::MarkSeen(MarkSeen {
                    offer_id,
                    viewer: user,
                    party,
                    occurred_at: Utc::now(),
                })
            }) {
                Ok(committed) => committed,
                // Removed since it was listed.
                Err(EngineError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };

            if !committed.is_empty() {
                catch_up(self.dispatcher.store(), &self.offers, offer_id.aggregate_id())?;
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Badge count. A buyer sees offers still in play plus accepted ones
    /// awaiting checkout; an owner sees offers waiting on their response.
    pub fn count_active(&self, user: UserId, party: Party) -> usize {
        self.offers
            .list_for(user, party)
            .iter()
            .filter(|o| counts_toward_badge(o.status, party))
            .count()
    }

    pub fn get_offer(&self, offer_id: OfferId) -> Option<OfferReadModel> {
        self.offers.get(&offer_id)
    }

    /// The buyer's offer on a product: the active one if any, otherwise the
    /// most recently updated.
    pub fn offer_for_product(&self, buyer: UserId, product_id: ProductId) -> Option<OfferReadModel> {
        let offers = self.offers.list_for_buyer_product(buyer, product_id);
        if let Some(active) = offers.iter().find(|o| o.status.is_active()) {
            return Some(active.clone());
        }
        offers
            .into_iter()
            .max_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.offer_id.cmp(&b.offer_id)))
    }

    /// Offers where `user` is on the `party` side, newest first.
    pub fn offers_for(&self, user: UserId, party: Party) -> Vec<OfferReadModel> {
        self.offers.list_for(user, party)
    }

    fn dispatch(&self, offer_id: OfferId, cmd: OfferCommand) -> Result<Vec<StoredEvent>, EngineError> {
        Ok(self
            .dispatcher
            .dispatch(offer_id.aggregate_id(), AGGREGATE_TYPE, cmd, |id| {
                Offer::empty(OfferId::new(id))
            })?)
    }

    fn dispatch_with_retry(
        &self,
        offer_id: OfferId,
        command: impl Fn() -> OfferCommand,
    ) -> Result<Vec<StoredEvent>, EngineError> {
        let mut attempt = 1;
        loop {
            match self.dispatch(offer_id, command()) {
                Err(EngineError::Concurrency(msg)) if attempt < MAX_ATTEMPTS => {
                    tracing::debug!(offer_id = %offer_id, attempt, "retrying after conflict: {msg}");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn refresh(&self, offer_id: OfferId) -> Result<OfferReadModel, EngineError> {
        catch_up(self.dispatcher.store(), &self.offers, offer_id.aggregate_id())?;
        self.offers
            .get(&offer_id)
            .ok_or_else(|| EngineError::NotFound("offer not found".to_string()))
    }
}

fn closes_negotiation(committed: &[StoredEvent]) -> bool {
    committed.iter().any(|stored| {
        serde_json::from_value::<OfferEvent>(stored.payload.clone())
            .is_ok_and(|event| event.closes_negotiation())
    })
}

fn counts_toward_badge(status: OfferStatus, party: Party) -> bool {
    match party {
        Party::Buyer => matches!(
            status,
            OfferStatus::Pending
                | OfferStatus::CounteredByOwner
                | OfferStatus::CounteredByBuyer
                | OfferStatus::Accepted
        ),
        Party::Owner => matches!(status, OfferStatus::Pending | OfferStatus::CounteredByBuyer),
    }
}
