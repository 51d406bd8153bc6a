use once_cell::sync::Lazy;

/// Secret used for JWT signing. Must be set via the `JWT_SECRET` env variable.
pub static JWT_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"));

/// Stripe API secret key, used for outbound checkout-session calls.
pub static STRIPE_SECRET_KEY: Lazy<String> =
    Lazy::new(|| std::env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY must be set"));

/// Shared secret for verifying inbound Stripe webhook signatures.
pub static STRIPE_WEBHOOK_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET must be set"));

pub static STRIPE_PRO_PRICE_ID: Lazy<String> =
    Lazy::new(|| std::env::var("STRIPE_PRO_PRICE_ID").expect("STRIPE_PRO_PRICE_ID must be set"));

pub static STRIPE_UNLIMITED_PRICE_ID: Lazy<String> = Lazy::new(|| {
    std::env::var("STRIPE_UNLIMITED_PRICE_ID").expect("STRIPE_UNLIMITED_PRICE_ID must be set")
});

/// Base URL for the Stripe API. Overridable so tests can point at a mock.
pub static STRIPE_API_BASE: Lazy<String> = Lazy::new(|| {
    read_optional_env("STRIPE_API_BASE").unwrap_or_else(|| "https://api.stripe.com".to_string())
});

pub static OPENAI_API_KEY: Lazy<String> =
    Lazy::new(|| std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set"));

pub static OPENAI_API_BASE: Lazy<String> = Lazy::new(|| {
    read_optional_env("OPENAI_API_BASE").unwrap_or_else(|| "https://api.openai.com".to_string())
});

pub static OPENAI_MODEL: Lazy<String> = Lazy::new(|| {
    read_optional_env("OPENAI_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string())
});

/// Endpoint used to validate Google ID tokens on sign-in.
pub static GOOGLE_TOKENINFO_URL: Lazy<String> = Lazy::new(|| {
    read_optional_env("GOOGLE_TOKENINFO_URL")
        .unwrap_or_else(|| "https://oauth2.googleapis.com/tokeninfo".to_string())
});

/// Public origin of the deployed site, used for checkout redirect URLs.
pub static PUBLIC_URL: Lazy<String> = Lazy::new(|| {
    read_optional_env("PUBLIC_URL").unwrap_or_else(|| "http://localhost:3000".to_string())
});

/// Ledger backend: `postgres` (default) or `memory` for local development.
pub static ACCOUNT_STORE: Lazy<String> = Lazy::new(|| {
    read_optional_env("ACCOUNT_STORE").unwrap_or_else(|| "postgres".to_string())
});

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running even
/// if database migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
