use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::plans::Plan;

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// key: billing-adapter -> provider integration seam
#[async_trait]
pub trait BillingProviderAdapter: Send + Sync {
    async fn create_checkout_session(
        &self,
        plan: Plan,
        account_id: &str,
        email: &str,
    ) -> Result<CheckoutSession>;
}

/// Stripe checkout over the REST API. Form-encoded, bounded timeout, one
/// idempotency key per call.
pub struct StripeAdapter {
    base: String,
    secret_key: String,
    public_url: String,
    pro_price_id: String,
    unlimited_price_id: String,
    client: Client,
}

impl StripeAdapter {
    pub fn new(
        base: impl Into<String>,
        secret_key: impl Into<String>,
        public_url: impl Into<String>,
        pro_price_id: impl Into<String>,
        unlimited_price_id: impl Into<String>,
    ) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            pro_price_id: pro_price_id.into(),
            unlimited_price_id: unlimited_price_id.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("client build"),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            crate::config::STRIPE_API_BASE.as_str(),
            crate::config::STRIPE_SECRET_KEY.as_str(),
            crate::config::PUBLIC_URL.as_str(),
            crate::config::STRIPE_PRO_PRICE_ID.as_str(),
            crate::config::STRIPE_UNLIMITED_PRICE_ID.as_str(),
        )
    }

    fn price_id_for(&self, plan: Plan) -> Result<&str> {
        match plan {
            Plan::Pro => Ok(self.pro_price_id.as_str()),
            Plan::Unlimited => Ok(self.unlimited_price_id.as_str()),
            Plan::Free => Err(anyhow!("free plan is not purchasable")),
        }
    }
}

#[async_trait]
impl BillingProviderAdapter for StripeAdapter {
    async fn create_checkout_session(
        &self,
        plan: Plan,
        account_id: &str,
        email: &str,
    ) -> Result<CheckoutSession> {
        let price_id = self.price_id_for(plan)?;
        let success_url = format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", self.public_url);
        let cancel_url = format!("{}/cancel", self.public_url);

        let params: Vec<(&str, &str)> = vec![
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("mode", "subscription"),
            ("success_url", &success_url),
            ("cancel_url", &cancel_url),
            ("customer_email", email),
            ("metadata[userId]", account_id),
            ("metadata[plan]", plan.as_str()),
        ];

        let session: CheckoutSession = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.base))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", Uuid::new_v4().to_string())
            .form(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(session)
    }
}
