use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use dealspark_catalog::ProductId;
use dealspark_core::{Aggregate, AggregateRoot, Money, UserId};
use dealspark_events::EventEnvelope;
use dealspark_negotiation::{HistoryEntry, Offer, OfferEvent, OfferId, OfferStatus, Party};

use super::{Projection, ProjectionError, StreamCursors, decode};
use crate::read_model::KeyedStore;

/// Queryable offer read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferReadModel {
    pub offer_id: OfferId,
    pub product_id: ProductId,
    pub buyer_id: UserId,
    pub owner_id: UserId,
    pub offered_price: Money,
    pub counter_price: Option<Money>,
    pub status: OfferStatus,
    pub history: Vec<HistoryEntry>,
    pub seen_by_owner: bool,
    pub seen_by_buyer: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl OfferReadModel {
    /// Snapshot of a live offer. `None` before creation and after removal.
    pub fn from_offer(offer: &Offer) -> Option<Self> {
        if !offer.exists() {
            return None;
        }
        Some(Self {
            offer_id: offer.id_typed(),
            product_id: offer.product_id()?,
            buyer_id: offer.buyer_id()?,
            owner_id: offer.owner_id()?,
            offered_price: offer.offered_price(),
            counter_price: offer.counter_price(),
            status: offer.status(),
            history: offer.history().to_vec(),
            seen_by_owner: offer.seen_by_owner(),
            seen_by_buyer: offer.seen_by_buyer(),
            created_at: offer.created_at()?,
            updated_at: offer.updated_at()?,
            version: offer.version(),
        })
    }

    pub fn participant(&self, party: Party) -> UserId {
        match party {
            Party::Buyer => self.buyer_id,
            Party::Owner => self.owner_id,
        }
    }

    pub fn seen_by(&self, party: Party) -> bool {
        match party {
            Party::Buyer => self.seen_by_buyer,
            Party::Owner => self.seen_by_owner,
        }
    }
}

/// Offers by id, with per-user listings.
///
/// Events are folded through the [`Offer`] aggregate itself and the read model
/// is a snapshot of the result, so history and seen flags follow the same
/// rules on both sides.
#[derive(Debug)]
pub struct OfferProjection<S>
where
    S: KeyedStore<OfferId, OfferReadModel>,
{
    store: S,
    cursors: StreamCursors,
    folded: Mutex<HashMap<OfferId, Offer>>,
}

impl<S> OfferProjection<S>
where
    S: KeyedStore<OfferId, OfferReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
            folded: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, offer_id: &OfferId) -> Option<OfferReadModel> {
        self.store.get(offer_id)
    }

    pub fn list(&self) -> Vec<OfferReadModel> {
        self.store.list()
    }

    /// Offers where `user` is on the given side, newest first.
    pub fn list_for(&self, user: UserId, party: Party) -> Vec<OfferReadModel> {
        let mut offers: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|o| o.participant(party) == user)
            .collect();
        offers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.offer_id.cmp(&a.offer_id)));
        offers
    }

    /// All offers one buyer made on one product.
    pub fn list_for_buyer_product(&self, buyer: UserId, product: ProductId) -> Vec<OfferReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|o| o.buyer_id == buyer && o.product_id == product)
            .collect()
    }

    fn folded(&self) -> MutexGuard<'_, HashMap<OfferId, Offer>> {
        self.folded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply_event(&self, envelope: &EventEnvelope<JsonValue>, ev: OfferEvent) -> Result<(), ProjectionError> {
        let offer_id = ev.offer_id();
        if offer_id.aggregate_id() != envelope.aggregate_id() {
            return Err(ProjectionError::StreamMismatch(
                "event offer_id does not match envelope aggregate_id".to_string(),
            ));
        }

        let mut folded = self.folded();
        let offer = folded.entry(offer_id).or_insert_with(|| Offer::empty(offer_id));
        if !offer.is_created() && !matches!(ev, OfferEvent::OfferCreated(_)) {
            folded.remove(&offer_id);
            return Err(ProjectionError::StreamMismatch(format!(
                "event for unknown offer {offer_id}"
            )));
        }
        offer.apply(&ev);

        match OfferReadModel::from_offer(offer) {
            Some(rm) => self.store.upsert(offer_id, rm),
            None => {
                folded.remove(&offer_id);
                self.store.remove(&offer_id);
            }
        }
        Ok(())
    }
}

impl<S> Projection for OfferProjection<S>
where
    S: KeyedStore<OfferId, OfferReadModel>,
{
    fn aggregate_type(&self) -> &'static str {
        dealspark_negotiation::AGGREGATE_TYPE
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != self.aggregate_type() {
            return Ok(());
        }

        self.cursors
            .apply_next(envelope.aggregate_id(), envelope.sequence_number(), || {
                let ev: OfferEvent = decode(envelope)?;
                self.apply_event(envelope, ev)
            })
            .map(|_| ())
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
        self.folded().clear();
    }
}
