use anyhow::Result;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::BillingEvent;
use crate::store::AccountStore;

/// Maximum accepted age for a signed webhook timestamp, in seconds.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    MalformedHeader,
    #[error("signature does not match payload")]
    Mismatch,
    #[error("signature timestamp outside tolerance window")]
    TimestampOutOfTolerance,
}

/// Verifies a Stripe-style `t=<unix>,v1=<hex>` signature header: HMAC-SHA256
/// over `"{t}.{payload}"` with the endpoint secret. `now` is passed in so the
/// tolerance window is testable.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(value)) => {
                timestamp = value.parse().ok();
            }
            (Some("v1"), Some(value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::TimestampOutOfTolerance);
    }

    for candidate in candidates {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can use any key length");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&candidate).is_ok() {
            return Ok(());
        }
    }
    Err(SignatureError::Mismatch)
}

/// Convenience for producing a valid header; used by tests and local tooling.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can use any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

/// key: plan-transitions -> async billing events into the ledger
///
/// The only component allowed to change `plan`. Events arrive at-least-once
/// and possibly out of order, so every application is idempotent: re-applying
/// an event lands on the same end state.
#[derive(Clone)]
pub struct PlanTransitionHandler {
    store: Arc<dyn AccountStore>,
}

impl PlanTransitionHandler {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    pub async fn apply(&self, event: BillingEvent) -> Result<()> {
        match event {
            BillingEvent::CheckoutCompleted {
                account_id,
                plan,
                customer_ref,
                subscription_ref,
            } => {
                let updated = self
                    .store
                    .apply_checkout(&account_id, plan, &customer_ref, &subscription_ref)
                    .await?;
                match updated {
                    Some(account) => {
                        info!(account_id = %account.id, plan = %plan, "Account plan upgraded");
                    }
                    None => {
                        warn!(%account_id, "Checkout completed for unknown account; dropping");
                    }
                }
            }
            BillingEvent::SubscriptionUpdated { subscription_ref } => {
                info!(%subscription_ref, "Subscription updated; no ledger change");
            }
            BillingEvent::SubscriptionDeleted { subscription_ref } => {
                let updated = self.store.clear_subscription(&subscription_ref).await?;
                match updated {
                    Some(account) => {
                        info!(account_id = %account.id, "Account downgraded to free");
                    }
                    None => {
                        // Ref may belong to another system or already be
                        // cleared; success so the event is not redelivered.
                        info!(%subscription_ref, "Subscription deleted with no matching account");
                    }
                }
            }
            BillingEvent::Ignored { event_type } => {
                debug!(%event_type, "Unhandled billing event type");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn valid_signature_accepted() {
        let payload = br#"{"type":"noop"}"#;
        let header = sign_payload(payload, SECRET, 1_700_000_000);
        assert_eq!(
            verify_signature(payload, &header, SECRET, 1_700_000_010),
            Ok(())
        );
    }

    #[test]
    fn tampered_payload_rejected() {
        let payload = br#"{"type":"noop"}"#;
        let header = sign_payload(payload, SECRET, 1_700_000_000);
        assert_eq!(
            verify_signature(br#"{"type":"evil"}"#, &header, SECRET, 1_700_000_010),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_rejected() {
        let payload = b"payload";
        let header = sign_payload(payload, "whsec_other", 1_700_000_000);
        assert_eq!(
            verify_signature(payload, &header, SECRET, 1_700_000_010),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_rejected() {
        let payload = b"payload";
        let header = sign_payload(payload, SECRET, 1_700_000_000);
        assert_eq!(
            verify_signature(payload, &header, SECRET, 1_700_000_000 + 301),
            Err(SignatureError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn garbage_header_rejected() {
        assert_eq!(
            verify_signature(b"payload", "not-a-signature", SECRET, 0),
            Err(SignatureError::MalformedHeader)
        );
    }
}
