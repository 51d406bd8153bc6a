use axum::{
    routing::{get, post},
    Router,
};

use crate::{auth, billing, generate};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/me", get(auth::current_user))
        .route("/api/generate", post(generate::generate_ideas))
        .route("/api/generate/posts", post(generate::generate_posts))
        .route("/api/checkout", post(billing::api::create_checkout_session))
        .route("/api/webhooks/stripe", post(billing::api::stripe_webhook))
}
