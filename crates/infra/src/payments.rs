//! Payment gateway port.
//!
//! The gateway only has to turn an amount into a client-side confirmation
//! token; the buyer completes payment against the provider directly and then
//! places the order with the returned intent id.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use dealspark_core::Money;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("payment provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub amount: Money,
    pub currency: String,
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, amount: Money) -> Result<PaymentIntent, PaymentError>;
}

/// In-process gateway issuing provider-shaped ids, in rupees.
#[derive(Debug, Default, Clone)]
pub struct FakePaymentGateway;

impl FakePaymentGateway {
    pub const CURRENCY: &'static str = "inr";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_intent(&self, amount: Money) -> Result<PaymentIntent, PaymentError> {
        if amount.is_zero() {
            return Err(PaymentError::InvalidAmount("amount must be positive".to_string()));
        }

        let id = format!("pi_{}", Uuid::now_v7().simple());
        let client_secret = format!("{id}_secret_{}", Uuid::now_v7().simple());
        tracing::debug!(payment_intent_id = %id, amount = %amount, "payment intent created");

        Ok(PaymentIntent {
            id,
            client_secret,
            amount,
            currency: Self::CURRENCY.to_string(),
        })
    }
}
