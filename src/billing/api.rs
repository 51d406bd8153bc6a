use axum::{extract::Extension, http::HeaderMap, Json};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

use super::adapters::BillingProviderAdapter;
use super::models::{BillingEvent, CheckoutSessionRequest, CheckoutSessionResponse};
use super::webhook::{verify_signature, PlanTransitionHandler};
use crate::error::{AppError, AppResult};
use crate::plans::Plan;

/// key: billing-api -> checkout,webhook endpoints
pub async fn create_checkout_session(
    Extension(adapter): Extension<Arc<dyn BillingProviderAdapter>>,
    Json(payload): Json<CheckoutSessionRequest>,
) -> AppResult<Json<CheckoutSessionResponse>> {
    if payload.plan.trim().is_empty()
        || payload.user_id.trim().is_empty()
        || payload.email.trim().is_empty()
    {
        return Err(AppError::BadRequest("Missing required fields".into()));
    }
    let plan = Plan::parse(&payload.plan)
        .map_err(|_| AppError::BadRequest("Invalid plan".into()))?;
    if plan == Plan::Free {
        return Err(AppError::BadRequest("Invalid plan".into()));
    }

    let session = adapter
        .create_checkout_session(plan, &payload.user_id, &payload.email)
        .await
        .map_err(|e| {
            error!(?e, "Checkout session creation failed");
            AppError::Message("Failed to create checkout session".into())
        })?;

    Ok(Json(CheckoutSessionResponse { id: session.id }))
}

/// Verified Stripe events feed the plan transition handler. A malformed
/// payload for a recognized event type is logged and dropped with a 200 so
/// one bad event cannot wedge the delivery queue.
pub async fn stripe_webhook(
    Extension(handler): Extension<PlanTransitionHandler>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing signature".into()))?;

    let secret = crate::config::STRIPE_WEBHOOK_SECRET.as_str();
    verify_signature(&body, signature, secret, Utc::now().timestamp()).map_err(|e| {
        warn!(%e, "Webhook signature verification failed");
        AppError::BadRequest("Webhook signature verification failed".into())
    })?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Invalid JSON payload".into()))?;

    match BillingEvent::from_payload(&payload) {
        Ok(event) => {
            handler.apply(event).await.map_err(|e| {
                error!(?e, "Webhook processing failed");
                AppError::Message("Webhook processing failed".into())
            })?;
        }
        Err(e) => {
            warn!(%e, "Dropping malformed billing event");
        }
    }

    Ok(Json(json!({ "received": true })))
}
