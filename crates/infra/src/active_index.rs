//! Uniqueness guard for active offers.
//!
//! At most one active offer may exist per (product, buyer). The event store
//! only serializes writes within one stream, so concurrent creates for the
//! same pair (which land in two fresh streams) are arbitrated here: a create
//! must claim the pair before it is dispatched.

use std::collections::HashMap;
use std::sync::Mutex;

use dealspark_catalog::ProductId;
use dealspark_core::UserId;
use dealspark_negotiation::OfferId;

use crate::projections::OfferReadModel;

#[derive(Debug, Default)]
pub struct ActiveOfferIndex {
    claims: Mutex<HashMap<(ProductId, UserId), OfferId>>,
}

impl ActiveOfferIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim the pair for `offer_id`. On conflict returns the
    /// offer currently holding the claim.
    pub fn try_claim(&self, product: ProductId, buyer: UserId, offer_id: OfferId) -> Result<(), OfferId> {
        let mut claims = self.lock();
        match claims.get(&(product, buyer)) {
            Some(existing) if *existing != offer_id => Err(*existing),
            _ => {
                claims.insert((product, buyer), offer_id);
                Ok(())
            }
        }
    }

    /// Release whatever pair `offer_id` holds. No-op if it holds none.
    pub fn release(&self, offer_id: OfferId) {
        self.lock().retain(|_, held| *held != offer_id);
    }

    pub fn get(&self, product: ProductId, buyer: UserId) -> Option<OfferId> {
        self.lock().get(&(product, buyer)).copied()
    }

    /// Replace all claims with the active offers of a freshly rebuilt read model.
    pub fn rebuild(&self, offers: &[OfferReadModel]) {
        let mut claims = self.lock();
        claims.clear();
        for o in offers.iter().filter(|o| o.status.is_active()) {
            claims.insert((o.product_id, o.buyer_id), o.offer_id);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(ProductId, UserId), OfferId>> {
        // The map is always left consistent, so a poisoned lock is still usable.
        self.claims.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
