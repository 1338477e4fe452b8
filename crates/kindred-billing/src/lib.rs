pub mod http;
pub mod stub;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("billing request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("billing API returned {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: String,
}

/// The payment-processor capability the account lifecycle needs. Nothing
/// here is transactional with the local database: every method must be
/// safe to call again for a customer or subscription that is already gone.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn list_active_subscriptions(
        &self,
        customer: &str,
    ) -> Result<Vec<Subscription>, BillingError>;

    async fn cancel_subscription(&self, subscription: &str) -> Result<(), BillingError>;

    async fn delete_customer(&self, customer: &str) -> Result<(), BillingError>;
}
