use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{BillingError, PaymentGateway, Subscription};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stripe-shaped REST gateway. All calls carry a bounded timeout. Retries
/// happen only when the request never reached the server (connect errors);
/// an ambiguous failure after the request was sent is surfaced as-is, since
/// the processor may already have applied the effect.
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    secret: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionList {
    data: Vec<Subscription>,
}

impl HttpGateway {
    pub fn new(base_url: String, secret: String) -> Result<Self, BillingError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret)
    }

    async fn send(&self, method: Method, path: &str) -> Result<Response, BillingError> {
        let first = self.request(method.clone(), path).send().await;
        match first {
            Ok(resp) => Ok(resp),
            // The request never reached the server, so it cannot have been
            // applied; one retry is safe.
            Err(e) if e.is_connect() => {
                warn!("billing connect failure, retrying once: {}", e);
                Ok(self.request(method, path).send().await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn check(resp: Response) -> Result<Response, BillingError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BillingError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn list_active_subscriptions(
        &self,
        customer: &str,
    ) -> Result<Vec<Subscription>, BillingError> {
        let path = format!("/v1/subscriptions?customer={}&status=active", customer);
        let resp = check(self.send(Method::GET, &path).await?).await?;
        let list: SubscriptionList = resp.json().await?;
        debug!(
            customer,
            count = list.data.len(),
            "listed active subscriptions"
        );
        Ok(list.data)
    }

    async fn cancel_subscription(&self, subscription: &str) -> Result<(), BillingError> {
        let path = format!("/v1/subscriptions/{}", subscription);
        let resp = self.send(Method::DELETE, &path).await?;
        // Already canceled or gone counts as done.
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(subscription, "subscription already absent");
            return Ok(());
        }
        check(resp).await?;
        Ok(())
    }

    async fn delete_customer(&self, customer: &str) -> Result<(), BillingError> {
        let path = format!("/v1/customers/{}", customer);
        let resp = self.send(Method::DELETE, &path).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(customer, "customer already absent");
            return Ok(());
        }
        check(resp).await?;
        Ok(())
    }
}
