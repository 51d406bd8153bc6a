use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Profile asserted by the external identity provider on a successful
/// sign-in. Treated as an opaque source of truth; we do not validate it
/// beyond the token check.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProfile {
    pub subject: String,
    pub email: String,
    pub display_name: String,
}

/// key: identity-provider -> token verification seam
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<IdentityProfile>;
}

/// Verifies Google ID tokens against the tokeninfo endpoint.
pub struct GoogleIdentityProvider {
    endpoint: String,
    client: Client,
}

impl GoogleIdentityProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("client build"),
        }
    }

    pub fn from_env() -> Self {
        Self::new(crate::config::GOOGLE_TOKENINFO_URL.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    async fn verify(&self, id_token: &str) -> Result<IdentityProfile> {
        let info: TokenInfo = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let email = info
            .email
            .ok_or_else(|| anyhow!("identity token carries no email"))?;
        let display_name = info.name.unwrap_or_else(|| email.clone());

        Ok(IdentityProfile {
            subject: info.sub,
            email,
            display_name,
        })
    }
}
