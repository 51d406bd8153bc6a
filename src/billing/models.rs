use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::plans::Plan;

/// key: billing-models -> checkout,webhook wire types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutSessionResponse {
    pub id: String,
}

/// Billing lifecycle event distilled from a verified Stripe webhook payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    CheckoutCompleted {
        account_id: String,
        plan: Plan,
        customer_ref: String,
        subscription_ref: String,
    },
    SubscriptionUpdated {
        subscription_ref: String,
    },
    SubscriptionDeleted {
        subscription_ref: String,
    },
    Ignored {
        event_type: String,
    },
}

/// A recognized event whose payload is missing required fields. Logged and
/// dropped; one bad event must not block subsequent deliveries.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed `{event_type}` event: {reason}")]
pub struct MalformedEvent {
    pub event_type: String,
    pub reason: String,
}

impl BillingEvent {
    /// Maps a raw Stripe event envelope to the handful of lifecycle events
    /// this system acts on.
    pub fn from_payload(payload: &Value) -> Result<BillingEvent, MalformedEvent> {
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let object = payload
            .pointer("/data/object")
            .cloned()
            .unwrap_or(Value::Null);

        match event_type.as_str() {
            "checkout.session.completed" => {
                let account_id = object
                    .pointer("/metadata/userId")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| malformed(&event_type, "missing metadata.userId"))?
                    .to_string();
                let plan_raw = object
                    .pointer("/metadata/plan")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| malformed(&event_type, "missing metadata.plan"))?;
                let plan = Plan::parse(plan_raw)
                    .map_err(|e| malformed(&event_type, &e.to_string()))?;
                let customer_ref = object
                    .get("customer")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let subscription_ref = object
                    .get("subscription")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(BillingEvent::CheckoutCompleted {
                    account_id,
                    plan,
                    customer_ref,
                    subscription_ref,
                })
            }
            "customer.subscription.updated" => {
                let subscription_ref = require_id(&object, &event_type)?;
                Ok(BillingEvent::SubscriptionUpdated { subscription_ref })
            }
            "customer.subscription.deleted" => {
                let subscription_ref = require_id(&object, &event_type)?;
                Ok(BillingEvent::SubscriptionDeleted { subscription_ref })
            }
            _ => Ok(BillingEvent::Ignored { event_type }),
        }
    }
}

fn require_id(object: &Value, event_type: &str) -> Result<String, MalformedEvent> {
    object
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| malformed(event_type, "missing subscription id"))
}

fn malformed(event_type: &str, reason: &str) -> MalformedEvent {
    MalformedEvent {
        event_type: event_type.to_string(),
        reason: reason.to_string(),
    }
}
