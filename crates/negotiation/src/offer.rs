use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dealspark_catalog::ProductId;
use dealspark_core::{Aggregate, AggregateRoot, DomainError, Money, UserId, aggregate_newtype};
use dealspark_events::Event;

use crate::transition::{OfferAction, OfferStatus, Party, next_status};

/// Stream type for offer aggregates.
pub const AGGREGATE_TYPE: &str = "negotiation.offer";

/// Minimum opening offer, in basis points of the product's deal price.
pub const MIN_OFFER_BPS: u64 = 9_500;

pub const NOTE_INITIAL: &str = "Initial offer";
pub const NOTE_ACCEPTED: &str = "Offer accepted";
pub const NOTE_REJECTED: &str = "Offer rejected";

aggregate_newtype!(
    /// Offer identifier.
    OfferId
);

/// One step of the negotiation, as shown to both parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub by: Party,
    pub price: Option<Money>,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate root: Offer.
///
/// A buyer's proposal for a product and every counter that followed. After an
/// `OfferRemoved` event the offer is gone and rejects every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    id: OfferId,
    product_id: Option<ProductId>,
    buyer_id: Option<UserId>,
    owner_id: Option<UserId>,
    offered_price: Money,
    counter_price: Option<Money>,
    status: OfferStatus,
    history: Vec<HistoryEntry>,
    seen_by_owner: bool,
    seen_by_buyer: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
    removed: bool,
}

impl Offer {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OfferId) -> Self {
        Self {
            id,
            product_id: None,
            buyer_id: None,
            owner_id: None,
            offered_price: Money::ZERO,
            counter_price: None,
            status: OfferStatus::Pending,
            history: Vec::new(),
            seen_by_owner: false,
            seen_by_buyer: false,
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
            removed: false,
        }
    }

    pub fn id_typed(&self) -> OfferId {
        self.id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn owner_id(&self) -> Option<UserId> {
        self.owner_id
    }

    pub fn offered_price(&self) -> Money {
        self.offered_price
    }

    pub fn counter_price(&self) -> Option<Money> {
        self.counter_price
    }

    pub fn status(&self) -> OfferStatus {
        self.status
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn seen_by_owner(&self) -> bool {
        self.seen_by_owner
    }

    pub fn seen_by_buyer(&self) -> bool {
        self.seen_by_buyer
    }

    pub fn seen_by(&self, party: Party) -> bool {
        match party {
            Party::Buyer => self.seen_by_buyer,
            Party::Owner => self.seen_by_owner,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Live offer: created and not removed.
    pub fn exists(&self) -> bool {
        self.created && !self.removed
    }

    /// Which side of this offer `user` is on, if any.
    pub fn party_of(&self, user: UserId) -> Option<Party> {
        if self.buyer_id == Some(user) {
            Some(Party::Buyer)
        } else if self.owner_id == Some(user) {
            Some(Party::Owner)
        } else {
            None
        }
    }

    /// User on the given side of this offer.
    pub fn participant(&self, party: Party) -> Option<UserId> {
        match party {
            Party::Buyer => self.buyer_id,
            Party::Owner => self.owner_id,
        }
    }

    fn set_seen(&mut self, party: Party, seen: bool) {
        match party {
            Party::Buyer => self.seen_by_buyer = seen,
            Party::Owner => self.seen_by_owner = seen,
        }
    }

    /// The mover has seen its own move; the other side has something new.
    fn record_move(&mut self, by: Party, price: Option<Money>, note: String, at: DateTime<Utc>) {
        self.history.push(HistoryEntry {
            by,
            price,
            note,
            timestamp: at,
        });
        self.set_seen(by, true);
        self.set_seen(by.counterparty(), false);
        self.updated_at = Some(at);
    }
}

impl AggregateRoot for Offer {
    type Id = OfferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOffer.
///
/// `owner_id` and `deal_price` are read from the catalog by the caller at the
/// time the offer is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOffer {
    pub offer_id: OfferId,
    pub product_id: ProductId,
    pub buyer_id: UserId,
    pub owner_id: UserId,
    pub offered_price: Money,
    pub deal_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RespondToOffer (accept, reject or counter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondToOffer {
    pub offer_id: OfferId,
    pub actor: UserId,
    pub action: OfferAction,
    pub price: Option<Money>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkSeen. Clears the badge for one side of the offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSeen {
    pub offer_id: OfferId,
    pub viewer: UserId,
    pub party: Party,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveOffer. Allowed for either party in any status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOffer {
    pub offer_id: OfferId,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferCommand {
    CreateOffer(CreateOffer),
    RespondToOffer(RespondToOffer),
    MarkSeen(MarkSeen),
    RemoveOffer(RemoveOffer),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferCreated {
    pub offer_id: OfferId,
    pub product_id: ProductId,
    pub buyer_id: UserId,
    pub owner_id: UserId,
    pub offered_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Transition events name the product and the party who must react, so
/// subscribers do not need to rehydrate the offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAccepted {
    pub offer_id: OfferId,
    pub product_id: ProductId,
    pub by: Party,
    pub recipient: UserId,
    pub price: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRejected {
    pub offer_id: OfferId,
    pub product_id: ProductId,
    pub by: Party,
    pub recipient: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferCountered {
    pub offer_id: OfferId,
    pub product_id: ProductId,
    pub by: Party,
    pub recipient: UserId,
    pub price: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSeen {
    pub offer_id: OfferId,
    pub by: Party,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRemoved {
    pub offer_id: OfferId,
    pub product_id: ProductId,
    pub buyer_id: UserId,
    pub by: Party,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferEvent {
    OfferCreated(OfferCreated),
    OfferAccepted(OfferAccepted),
    OfferRejected(OfferRejected),
    OfferCountered(OfferCountered),
    OfferSeen(OfferSeen),
    OfferRemoved(OfferRemoved),
}

impl OfferEvent {
    pub fn offer_id(&self) -> OfferId {
        match self {
            OfferEvent::OfferCreated(e) => e.offer_id,
            OfferEvent::OfferAccepted(e) => e.offer_id,
            OfferEvent::OfferRejected(e) => e.offer_id,
            OfferEvent::OfferCountered(e) => e.offer_id,
            OfferEvent::OfferSeen(e) => e.offer_id,
            OfferEvent::OfferRemoved(e) => e.offer_id,
        }
    }

    /// `true` when the event ends the offer's active period.
    pub fn closes_negotiation(&self) -> bool {
        matches!(
            self,
            OfferEvent::OfferAccepted(_) | OfferEvent::OfferRejected(_) | OfferEvent::OfferRemoved(_)
        )
    }
}

impl Event for OfferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OfferEvent::OfferCreated(_) => "negotiation.offer.created",
            OfferEvent::OfferAccepted(_) => "negotiation.offer.accepted",
            OfferEvent::OfferRejected(_) => "negotiation.offer.rejected",
            OfferEvent::OfferCountered(_) => "negotiation.offer.countered",
            OfferEvent::OfferSeen(_) => "negotiation.offer.seen",
            OfferEvent::OfferRemoved(_) => "negotiation.offer.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OfferEvent::OfferCreated(e) => e.occurred_at,
            OfferEvent::OfferAccepted(e) => e.occurred_at,
            OfferEvent::OfferRejected(e) => e.occurred_at,
            OfferEvent::OfferCountered(e) => e.occurred_at,
            OfferEvent::OfferSeen(e) => e.occurred_at,
            OfferEvent::OfferRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Offer {
    type Command = OfferCommand;
    type Event = OfferEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OfferEvent::OfferCreated(e) => {
                self.id = e.offer_id;
                self.product_id = Some(e.product_id);
                self.buyer_id = Some(e.buyer_id);
                self.owner_id = Some(e.owner_id);
                self.offered_price = e.offered_price;
                self.counter_price = None;
                self.status = OfferStatus::Pending;
                self.created_at = Some(e.occurred_at);
                self.created = true;
                self.record_move(
                    Party::Buyer,
                    Some(e.offered_price),
                    NOTE_INITIAL.to_string(),
                    e.occurred_at,
                );
            }
            OfferEvent::OfferAccepted(e) => {
                self.status = OfferStatus::Accepted;
                self.counter_price = Some(e.price);
                self.record_move(e.by, Some(e.price), NOTE_ACCEPTED.to_string(), e.occurred_at);
            }
            OfferEvent::OfferRejected(e) => {
                self.status = OfferStatus::Rejected;
                self.counter_price = None;
                self.record_move(e.by, None, NOTE_REJECTED.to_string(), e.occurred_at);
            }
            OfferEvent::OfferCountered(e) => {
                self.status = match e.by {
                    Party::Owner => OfferStatus::CounteredByOwner,
                    Party::Buyer => OfferStatus::CounteredByBuyer,
                };
                self.counter_price = Some(e.price);
                self.record_move(
                    e.by,
                    Some(e.price),
                    format!("Countered by {}", e.by),
                    e.occurred_at,
                );
            }
            OfferEvent::OfferSeen(e) => {
                self.set_seen(e.by, true);
            }
            OfferEvent::OfferRemoved(e) => {
                self.removed = true;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OfferCommand::CreateOffer(cmd) => self.handle_create(cmd),
            OfferCommand::RespondToOffer(cmd) => self.handle_respond(cmd),
            OfferCommand::MarkSeen(cmd) => self.handle_mark_seen(cmd),
            OfferCommand::RemoveOffer(cmd) => self.handle_remove(cmd),
        }
    }
}

impl Offer {
    fn ensure_offer_id(&self, offer_id: OfferId) -> Result<(), DomainError> {
        if self.id != offer_id {
            return Err(DomainError::validation("offer_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    /// Ids recorded at creation; only missing on an offer that does not exist.
    fn parties(&self) -> Result<(ProductId, UserId, UserId), DomainError> {
        match (self.product_id, self.buyer_id, self.owner_id) {
            (Some(product), Some(buyer), Some(owner)) => Ok((product, buyer, owner)),
            _ => Err(DomainError::not_found()),
        }
    }

    fn handle_create(&self, cmd: &CreateOffer) -> Result<Vec<OfferEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("offer already exists"));
        }
        self.ensure_offer_id(cmd.offer_id)?;

        if cmd.buyer_id == cmd.owner_id {
            return Err(DomainError::validation("cannot make an offer on your own product"));
        }
        if cmd.offered_price.is_zero() {
            return Err(DomainError::validation("offered price must be positive"));
        }
        if !cmd.offered_price.meets_bps_of(cmd.deal_price, MIN_OFFER_BPS) {
            let floor = cmd.deal_price.floor_at_bps(MIN_OFFER_BPS);
            return Err(DomainError::validation(format!("offer must be at least {floor}")));
        }

        Ok(vec![OfferEvent::OfferCreated(OfferCreated {
            offer_id: cmd.offer_id,
            product_id: cmd.product_id,
            buyer_id: cmd.buyer_id,
            owner_id: cmd.owner_id,
            offered_price: cmd.offered_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_respond(&self, cmd: &RespondToOffer) -> Result<Vec<OfferEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_offer_id(cmd.offer_id)?;
        let (product_id, _, _) = self.parties()?;

        let actor = self
            .party_of(cmd.actor)
            .ok_or_else(|| DomainError::unauthorized("not a party to this offer"))?;

        if next_status(self.status, actor, cmd.action).is_none() {
            return Err(DomainError::invalid_transition(format!(
                "{actor} cannot {} an offer that is {}",
                action_verb(cmd.action),
                self.status
            )));
        }

        let recipient = self
            .participant(actor.counterparty())
            .ok_or_else(DomainError::not_found)?;

        let event = match cmd.action {
            OfferAction::Accept => OfferEvent::OfferAccepted(OfferAccepted {
                offer_id: cmd.offer_id,
                product_id,
                by: actor,
                recipient,
                price: self.counter_price.unwrap_or(self.offered_price),
                occurred_at: cmd.occurred_at,
            }),
            OfferAction::Reject => OfferEvent::OfferRejected(OfferRejected {
                offer_id: cmd.offer_id,
                product_id,
                by: actor,
                recipient,
                occurred_at: cmd.occurred_at,
            }),
            OfferAction::Counter => {
                let price = match cmd.price {
                    Some(price) if !price.is_zero() => price,
                    _ => return Err(DomainError::validation("counter offer requires a positive price")),
                };
                OfferEvent::OfferCountered(OfferCountered {
                    offer_id: cmd.offer_id,
                    product_id,
                    by: actor,
                    recipient,
                    price,
                    occurred_at: cmd.occurred_at,
                })
            }
        };

        Ok(vec![event])
    }

    fn handle_mark_seen(&self, cmd: &MarkSeen) -> Result<Vec<OfferEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_offer_id(cmd.offer_id)?;

        if self.participant(cmd.party) != Some(cmd.viewer) {
            return Err(DomainError::unauthorized(format!(
                "not the {} of this offer",
                cmd.party
            )));
        }

        if self.seen_by(cmd.party) {
            return Ok(vec![]);
        }

        Ok(vec![OfferEvent::OfferSeen(OfferSeen {
            offer_id: cmd.offer_id,
            by: cmd.party,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveOffer) -> Result<Vec<OfferEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_offer_id(cmd.offer_id)?;
        let (product_id, buyer_id, _) = self.parties()?;

        let by = self
            .party_of(cmd.actor)
            .ok_or_else(|| DomainError::unauthorized("not a party to this offer"))?;

        Ok(vec![OfferEvent::OfferRemoved(OfferRemoved {
            offer_id: cmd.offer_id,
            product_id,
            buyer_id,
            by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn action_verb(action: OfferAction) -> &'static str {
    match action {
        OfferAction::Accept => "accept",
        OfferAction::Reject => "reject",
        OfferAction::Counter => "counter",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealspark_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    struct Fixture {
        offer: Offer,
        buyer: UserId,
        owner: UserId,
    }

    fn create_cmd(offer_id: OfferId, buyer: UserId, owner: UserId, offered: u64) -> CreateOffer {
        CreateOffer {
            offer_id,
            product_id: ProductId::generate(),
            buyer_id: buyer,
            owner_id: owner,
            offered_price: Money::new(offered),
            deal_price: Money::new(1000),
            occurred_at: test_time(),
        }
    }

    fn pending_offer(offered: u64) -> Fixture {
        let buyer = UserId::new();
        let owner = UserId::new();
        let offer_id = OfferId::generate();
        let mut offer = Offer::empty(offer_id);
        execute(
            &mut offer,
            &OfferCommand::CreateOffer(create_cmd(offer_id, buyer, owner, offered)),
        )
        .unwrap();
        Fixture { offer, buyer, owner }
    }

    fn respond(
        offer: &mut Offer,
        actor: UserId,
        action: OfferAction,
        price: Option<u64>,
    ) -> Result<Vec<OfferEvent>, DomainError> {
        let cmd = OfferCommand::RespondToOffer(RespondToOffer {
            offer_id: offer.id_typed(),
            actor,
            action,
            price: price.map(Money::new),
            occurred_at: test_time(),
        });
        execute(offer, &cmd)
    }

    #[test]
    fn create_offer_starts_pending_with_initial_history() {
        let f = pending_offer(950);

        assert_eq!(f.offer.status(), OfferStatus::Pending);
        assert_eq!(f.offer.offered_price(), Money::new(950));
        assert_eq!(f.offer.counter_price(), None);
        assert_eq!(f.offer.history().len(), 1);
        assert_eq!(f.offer.history()[0].note, NOTE_INITIAL);
        assert_eq!(f.offer.history()[0].by, Party::Buyer);
        assert_eq!(f.offer.history()[0].price, Some(Money::new(950)));
        assert!(f.offer.seen_by_buyer());
        assert!(!f.offer.seen_by_owner());
        assert_eq!(f.offer.version(), 1);
    }

    #[test]
    fn create_offer_below_floor_names_the_floor() {
        let offer_id = OfferId::generate();
        let offer = Offer::empty(offer_id);

        let err = offer
            .handle(&OfferCommand::CreateOffer(create_cmd(
                offer_id,
                UserId::new(),
                UserId::new(),
                900,
            )))
            .unwrap_err();

        assert_eq!(err, DomainError::validation("offer must be at least 950"));
    }

    #[test]
    fn create_offer_rejects_zero_price() {
        let offer_id = OfferId::generate();
        let offer = Offer::empty(offer_id);
        let mut cmd = create_cmd(offer_id, UserId::new(), UserId::new(), 0);
        cmd.deal_price = Money::ZERO;

        let err = offer.handle(&OfferCommand::CreateOffer(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_offer_rejects_own_product() {
        let offer_id = OfferId::generate();
        let offer = Offer::empty(offer_id);
        let me = UserId::new();

        let err = offer
            .handle(&OfferCommand::CreateOffer(create_cmd(offer_id, me, me, 1000)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn owner_accepting_pending_offer_agrees_on_offered_price() {
        let mut f = pending_offer(960);

        respond(&mut f.offer, f.owner, OfferAction::Accept, None).unwrap();

        assert_eq!(f.offer.status(), OfferStatus::Accepted);
        assert_eq!(f.offer.counter_price(), Some(Money::new(960)));
        let last = f.offer.history().last().unwrap();
        assert_eq!(last.note, NOTE_ACCEPTED);
        assert_eq!(last.price, Some(Money::new(960)));
        assert!(f.offer.seen_by_owner());
        assert!(!f.offer.seen_by_buyer());
    }

    #[test]
    fn full_counter_round_trip_ends_at_buyer_price() {
        let mut f = pending_offer(950);

        respond(&mut f.offer, f.owner, OfferAction::Counter, Some(990)).unwrap();
        assert_eq!(f.offer.status(), OfferStatus::CounteredByOwner);
        assert_eq!(f.offer.counter_price(), Some(Money::new(990)));
        assert_eq!(f.offer.history().last().unwrap().note, "Countered by owner");

        respond(&mut f.offer, f.buyer, OfferAction::Counter, Some(970)).unwrap();
        assert_eq!(f.offer.status(), OfferStatus::CounteredByBuyer);
        assert_eq!(f.offer.history().last().unwrap().note, "Countered by buyer");
        assert!(f.offer.seen_by_buyer());
        assert!(!f.offer.seen_by_owner());

        respond(&mut f.offer, f.owner, OfferAction::Accept, None).unwrap();
        assert_eq!(f.offer.status(), OfferStatus::Accepted);
        assert_eq!(f.offer.counter_price(), Some(Money::new(970)));
        assert_eq!(f.offer.history().len(), 4);
        assert_eq!(f.offer.version(), 4);
    }

    #[test]
    fn reject_clears_counter_price() {
        let mut f = pending_offer(950);
        respond(&mut f.offer, f.owner, OfferAction::Counter, Some(990)).unwrap();

        respond(&mut f.offer, f.buyer, OfferAction::Reject, None).unwrap();

        assert_eq!(f.offer.status(), OfferStatus::Rejected);
        assert_eq!(f.offer.counter_price(), None);
        let last = f.offer.history().last().unwrap();
        assert_eq!(last.note, NOTE_REJECTED);
        assert_eq!(last.price, None);
    }

    #[test]
    fn latest_mover_cannot_act_again() {
        let mut f = pending_offer(950);
        respond(&mut f.offer, f.owner, OfferAction::Counter, Some(990)).unwrap();

        let err = respond(&mut f.offer, f.owner, OfferAction::Counter, Some(980)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
        assert_eq!(f.offer.status(), OfferStatus::CounteredByOwner);
    }

    #[test]
    fn buyer_cannot_act_on_pending_offer() {
        let mut f = pending_offer(950);
        let err = respond(&mut f.offer, f.buyer, OfferAction::Accept, None).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn terminal_offer_rejects_every_response() {
        let mut f = pending_offer(950);
        respond(&mut f.offer, f.owner, OfferAction::Reject, None).unwrap();
        let history_len = f.offer.history().len();

        for actor in [f.buyer, f.owner] {
            for action in [OfferAction::Accept, OfferAction::Reject, OfferAction::Counter] {
                let err = respond(&mut f.offer, actor, action, Some(999)).unwrap_err();
                assert!(matches!(err, DomainError::InvalidTransition(_)));
            }
        }
        assert_eq!(f.offer.history().len(), history_len);
    }

    #[test]
    fn third_party_is_unauthorized_before_state_is_checked() {
        let mut f = pending_offer(950);
        respond(&mut f.offer, f.owner, OfferAction::Accept, None).unwrap();

        let err = respond(&mut f.offer, UserId::new(), OfferAction::Reject, None).unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[test]
    fn counter_without_price_is_validation_error() {
        let mut f = pending_offer(950);

        let err = respond(&mut f.offer, f.owner, OfferAction::Counter, None).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        let err = respond(&mut f.offer, f.owner, OfferAction::Counter, Some(0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(f.offer.status(), OfferStatus::Pending);
    }

    #[test]
    fn state_error_wins_over_missing_counter_price() {
        let mut f = pending_offer(950);
        let err = respond(&mut f.offer, f.buyer, OfferAction::Counter, None).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn mark_seen_is_idempotent() {
        let mut f = pending_offer(950);
        let cmd = OfferCommand::MarkSeen(MarkSeen {
            offer_id: f.offer.id_typed(),
            viewer: f.owner,
            party: Party::Owner,
            occurred_at: test_time(),
        });

        let first = execute(&mut f.offer, &cmd).unwrap();
        assert_eq!(first.len(), 1);
        assert!(f.offer.seen_by_owner());

        let second = execute(&mut f.offer, &cmd).unwrap();
        assert!(second.is_empty());
        assert_eq!(f.offer.history().len(), 1);
    }

    #[test]
    fn mark_seen_requires_matching_party() {
        let f = pending_offer(950);
        let err = f
            .offer
            .handle(&OfferCommand::MarkSeen(MarkSeen {
                offer_id: f.offer.id_typed(),
                viewer: f.buyer,
                party: Party::Owner,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[test]
    fn removed_offer_behaves_as_not_found() {
        let mut f = pending_offer(950);
        let remove = OfferCommand::RemoveOffer(RemoveOffer {
            offer_id: f.offer.id_typed(),
            actor: f.buyer,
            occurred_at: test_time(),
        });
        execute(&mut f.offer, &remove).unwrap();
        assert!(!f.offer.exists());

        let err = respond(&mut f.offer, f.owner, OfferAction::Accept, None).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
        assert_eq!(f.offer.handle(&remove).unwrap_err(), DomainError::NotFound);
    }

    #[test]
    fn stranger_cannot_remove_offer() {
        let f = pending_offer(950);
        let err = f
            .offer
            .handle(&OfferCommand::RemoveOffer(RemoveOffer {
                offer_id: f.offer.id_typed(),
                actor: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[test]
    fn terminal_offer_can_still_be_removed_by_owner() {
        let mut f = pending_offer(950);
        respond(&mut f.offer, f.owner, OfferAction::Accept, None).unwrap();

        let offer_id = f.offer.id_typed();
        let events = execute(
            &mut f.offer,
            &OfferCommand::RemoveOffer(RemoveOffer {
                offer_id,
                actor: f.owner,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        match &events[0] {
            OfferEvent::OfferRemoved(e) => assert_eq!(e.by, Party::Owner),
            other => panic!("Expected OfferRemoved event, got {other:?}"),
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Move {
            Respond {
                actor: u8,
                action: OfferAction,
                price: Option<u64>,
            },
            Seen {
                party: Party,
            },
        }

        fn action_strategy() -> impl Strategy<Value = OfferAction> {
            prop_oneof![
                Just(OfferAction::Accept),
                Just(OfferAction::Reject),
                Just(OfferAction::Counter),
            ]
        }

        fn move_strategy() -> impl Strategy<Value = Move> {
            prop_oneof![
                4 => (0u8..3, action_strategy(), proptest::option::of(0u64..2_000))
                    .prop_map(|(actor, action, price)| Move::Respond { actor, action, price }),
                1 => prop_oneof![Just(Party::Buyer), Just(Party::Owner)]
                    .prop_map(|party| Move::Seen { party }),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: whatever sequence of moves is attempted, history only
            /// grows by one per accepted transition, terminal offers never move
            /// again, and rejected offers never carry a counter price.
            #[test]
            fn negotiation_invariants_hold(moves in proptest::collection::vec(move_strategy(), 0..40)) {
                let mut f = pending_offer(975);
                let stranger = UserId::new();

                for mv in moves {
                    let before = f.offer.clone();
                    match mv {
                        Move::Respond { actor, action, price } => {
                            let user = match actor {
                                0 => f.buyer,
                                1 => f.owner,
                                _ => stranger,
                            };
                            let result = respond(&mut f.offer, user, action, price);

                            match result {
                                Ok(events) => {
                                    prop_assert_eq!(events.len(), 1);
                                    prop_assert!(before.status().is_active());
                                    prop_assert_eq!(f.offer.history().len(), before.history().len() + 1);
                                    prop_assert_eq!(&f.offer.history()[..before.history().len()], before.history());
                                    let party = f.offer.party_of(user).unwrap();
                                    prop_assert!(f.offer.seen_by(party));
                                    prop_assert!(!f.offer.seen_by(party.counterparty()));
                                }
                                Err(err) => {
                                    prop_assert_eq!(&f.offer, &before);
                                    if user == stranger {
                                        prop_assert!(matches!(err, DomainError::Unauthorized(_)), "unexpected error");
                                    }
                                    if before.status().is_terminal() && user != stranger {
                                        prop_assert!(matches!(err, DomainError::InvalidTransition(_)), "unexpected error");
                                    }
                                }
                            }
                        }
                        Move::Seen { party } => {
                            let viewer = f.offer.participant(party).unwrap();
                            let offer_id = f.offer.id_typed();
                            execute(&mut f.offer, &OfferCommand::MarkSeen(MarkSeen {
                                offer_id,
                                viewer,
                                party,
                                occurred_at: test_time(),
                            })).unwrap();
                            prop_assert!(f.offer.seen_by(party));
                            prop_assert_eq!(f.offer.status(), before.status());
                            prop_assert_eq!(f.offer.history(), before.history());
                        }
                    }

                    if f.offer.status() == OfferStatus::Rejected {
                        prop_assert_eq!(f.offer.counter_price(), None);
                    }
                    if f.offer.status() == OfferStatus::Accepted {
                        prop_assert!(f.offer.counter_price().is_some());
                    }
                }
            }
        }
    }
}
