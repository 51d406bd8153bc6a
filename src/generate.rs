use anyhow::{anyhow, Result};
use axum::{extract::Extension, Json};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::openai::OpenAiClient;
use crate::quota::{ConsumeOutcome, QuotaEnforcer};

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<script.*?</script>|<style.*?</style>|<[^>]+>").expect("valid regex"));
static FETCH_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("client build")
});

/// Resolves the request body to blog text: pasted content wins, otherwise the
/// URL is fetched and crudely de-tagged.
async fn resolve_source(payload: &GenerateRequest) -> AppResult<String> {
    if let Some(blog) = payload.blog.as_deref() {
        if !blog.trim().is_empty() {
            return Ok(blog.to_string());
        }
    }
    if let Some(raw_url) = payload.url.as_deref() {
        if !raw_url.trim().is_empty() {
            let text = fetch_page_text(raw_url).await.map_err(|e| {
                error!(?e, "Failed to fetch blog URL");
                AppError::Message("Failed to fetch blog content".into())
            })?;
            if text.trim().is_empty() {
                return Err(AppError::Message("Fetched page has no text".into()));
            }
            return Ok(text);
        }
    }
    Err(AppError::BadRequest("Blog content is required".into()))
}

async fn fetch_page_text(raw_url: &str) -> Result<String> {
    let parsed = url::Url::parse(raw_url.trim())?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(anyhow!("unsupported URL scheme `{}`", parsed.scheme()));
    }
    let html = FETCH_CLIENT
        .get(parsed)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let text = TAG_PATTERN.replace_all(&html, " ");
    Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Consumes one unit of quota for the authenticated account. The increment is
/// tied to the allow decision, not to downstream generation success: a failed
/// completion after `Allowed` leaves the unit spent.
async fn consume_quota(enforcer: &QuotaEnforcer, account_id: &str) -> AppResult<()> {
    match enforcer.try_consume(account_id).await? {
        ConsumeOutcome::Allowed(_) => Ok(()),
        ConsumeOutcome::Denied(account) => {
            tracing::info!(
                account_id,
                usage = account.usage_count,
                limit = account.plan.quota(),
                "Generation denied: quota exhausted"
            );
            Err(AppError::QuotaExhausted)
        }
        ConsumeOutcome::AccountNotFound => Err(AppError::NotFound),
    }
}

/// key: generation-api -> numbered-list ideas
pub async fn generate_ideas(
    Extension(enforcer): Extension<QuotaEnforcer>,
    Extension(openai): Extension<Arc<OpenAiClient>>,
    AuthUser { account_id }: AuthUser,
    Json(payload): Json<GenerateRequest>,
) -> AppResult<Json<Value>> {
    let blog = resolve_source(&payload).await?;
    consume_quota(&enforcer, &account_id).await?;

    let ideas = openai.generate_ideas(&blog).await.map_err(|e| {
        error!(?e, "Idea generation failed");
        AppError::Message("Failed to generate ideas".into())
    })?;

    Ok(Json(json!({ "message": ideas.join("\n\n") })))
}

/// key: generation-api -> structured {hook,content,image} posts
pub async fn generate_posts(
    Extension(enforcer): Extension<QuotaEnforcer>,
    Extension(openai): Extension<Arc<OpenAiClient>>,
    AuthUser { account_id }: AuthUser,
    Json(payload): Json<GenerateRequest>,
) -> AppResult<Json<Value>> {
    let blog = resolve_source(&payload).await?;
    consume_quota(&enforcer, &account_id).await?;

    let posts = openai.generate_posts(&blog).await.map_err(|e| {
        error!(?e, "Post generation failed");
        AppError::Message("Failed to generate posts".into())
    })?;

    Ok(Json(json!({ "message": posts })))
}
