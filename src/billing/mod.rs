pub mod adapters;
pub mod api;
pub mod models;
pub mod webhook;

pub use adapters::{BillingProviderAdapter, CheckoutSession, StripeAdapter};
pub use models::{BillingEvent, CheckoutSessionRequest, CheckoutSessionResponse, MalformedEvent};
pub use webhook::{verify_signature, PlanTransitionHandler, SignatureError};
