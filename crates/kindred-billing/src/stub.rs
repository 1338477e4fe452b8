use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::{BillingError, PaymentGateway, Subscription};

/// In-memory gateway that records every call. Used by account-closure
/// tests in place of the HTTP gateway.
#[derive(Default)]
pub struct StubGateway {
    pub active: Mutex<HashMap<String, Vec<Subscription>>>,
    pub listed: Mutex<Vec<String>>,
    pub canceled: Mutex<Vec<String>>,
    pub deleted_customers: Mutex<Vec<String>>,
    pub fail_deletes: AtomicBool,
}

impl StubGateway {
    pub fn with_subscription(customer: &str, subscription: &str) -> Self {
        let stub = Self::default();
        stub.active.lock().unwrap().insert(
            customer.to_string(),
            vec![Subscription {
                id: subscription.to_string(),
                status: "active".to_string(),
            }],
        );
        stub
    }

    /// Total processor calls of any kind.
    pub fn call_count(&self) -> usize {
        self.listed.lock().unwrap().len()
            + self.canceled.lock().unwrap().len()
            + self.deleted_customers.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn list_active_subscriptions(
        &self,
        customer: &str,
    ) -> Result<Vec<Subscription>, BillingError> {
        self.listed.lock().unwrap().push(customer.to_string());
        Ok(self
            .active
            .lock()
            .unwrap()
            .get(customer)
            .cloned()
            .unwrap_or_default())
    }

    async fn cancel_subscription(&self, subscription: &str) -> Result<(), BillingError> {
        self.canceled.lock().unwrap().push(subscription.to_string());
        Ok(())
    }

    async fn delete_customer(&self, customer: &str) -> Result<(), BillingError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BillingError::Api {
                status: 500,
                body: "stub failure".to_string(),
            });
        }
        self.deleted_customers
            .lock()
            .unwrap()
            .push(customer.to_string());
        Ok(())
    }
}
