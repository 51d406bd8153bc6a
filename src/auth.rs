use axum::{
    extract::Extension,
    http::HeaderMap,
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::account::{NewAccount, UserAccount};
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::identity::IdentityProvider;
use crate::plans::Plan;
use crate::store::AccountStore;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub id_token: String,
}

#[derive(Serialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub plan: Plan,
    pub usage_count: i64,
    pub usage_limit: i64,
    pub remaining: i64,
}

impl From<UserAccount> for UserInfo {
    fn from(account: UserAccount) -> Self {
        let usage_limit = account.plan.quota();
        let remaining = account.remaining();
        UserInfo {
            id: account.id,
            email: account.email,
            display_name: account.display_name,
            plan: account.plan,
            usage_count: account.usage_count,
            usage_limit,
            remaining,
        }
    }
}

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: usize,
}

/// Exchanges a provider ID token for a session cookie, lazily creating the
/// account ledger on first sign-in. Creation is idempotent so two
/// near-simultaneous sign-ins for the same identity race safely.
pub async fn login(
    Extension(store): Extension<Arc<dyn AccountStore>>,
    Extension(provider): Extension<Arc<dyn IdentityProvider>>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<UserInfo>)> {
    if payload.id_token.trim().is_empty() {
        return Err(AppError::BadRequest("id_token is required".into()));
    }

    let profile = provider.verify(&payload.id_token).await.map_err(|e| {
        error!(?e, "Identity token verification failed");
        AppError::Unauthorized
    })?;

    let account = store
        .create_if_absent(NewAccount {
            id: profile.subject,
            email: profile.email,
            display_name: profile.display_name,
        })
        .await?;

    let exp = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .expect("valid timestamp")
        .timestamp() as usize;
    let claims = Claims {
        sub: account.id.clone(),
        exp,
    };
    let secret = crate::config::JWT_SECRET.as_str();
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!(?e, "Token encoding error");
        AppError::Message("Token error".into())
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        format!("auth_token={token}; HttpOnly; Secure; SameSite=Strict; Path=/")
            .parse()
            .expect("valid header value"),
    );
    Ok((headers, Json(account.into())))
}

pub async fn logout() -> (HeaderMap, &'static str) {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        "auth_token=deleted; HttpOnly; Path=/; Max-Age=0"
            .parse()
            .expect("valid header value"),
    );
    (headers, "Logged out")
}

pub async fn current_user(
    Extension(store): Extension<Arc<dyn AccountStore>>,
    AuthUser { account_id }: AuthUser,
) -> AppResult<Json<UserInfo>> {
    let account = store
        .get(&account_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;
    Ok(Json(account.into()))
}
