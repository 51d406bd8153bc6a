use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Prompt input is capped so oversized blogs do not blow the token budget.
const MAX_BLOG_CHARS: usize = 3000;
const MAX_IDEAS: usize = 5;
const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f64 = 0.7;

static NUMBERED_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s*").expect("valid regex"));

/// A structured post suggestion from the JSON endpoint variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostIdea {
    pub hook: String,
    pub content: String,
    pub image: String,
}

/// key: openai-client -> chat-completions caller
pub struct OpenAiClient {
    base: String,
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(
        base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("client build"),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            crate::config::OPENAI_API_BASE.as_str(),
            crate::config::OPENAI_API_KEY.as_str(),
            crate::config::OPENAI_MODEL.as_str(),
        )
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
        });

        let response: serde_json::Value = self
            .client
            .post(format!("{}/v1/chat/completions", self.base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(message) = response.pointer("/error/message").and_then(|v| v.as_str()) {
            return Err(anyhow!("OpenAI API error: {message}"));
        }

        response
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("OpenAI response carries no content"))
    }

    /// Numbered-list variant: five short LinkedIn post ideas.
    pub async fn generate_ideas(&self, blog: &str) -> Result<Vec<String>> {
        let content = self.chat(&ideas_prompt(blog)).await?;
        let ideas = parse_numbered_ideas(&content);
        if ideas.is_empty() {
            return Err(anyhow!("no ideas parsed from completion"));
        }
        Ok(ideas)
    }

    /// Structured variant: strict JSON array of {hook, content, image}.
    pub async fn generate_posts(&self, blog: &str) -> Result<Vec<PostIdea>> {
        let content = self.chat(&posts_prompt(blog)).await?;
        let posts = parse_post_ideas(&content)?;
        if posts.is_empty() {
            return Err(anyhow!("no posts parsed from completion"));
        }
        Ok(posts)
    }
}

fn truncated(blog: &str) -> &str {
    match blog.char_indices().nth(MAX_BLOG_CHARS) {
        Some((idx, _)) => &blog[..idx],
        None => blog,
    }
}

fn ideas_prompt(blog: &str) -> String {
    format!(
        "Generate 5 engaging LinkedIn post ideas from this blog content. Each idea should be concise, professional, and highlight key insights. Format as a numbered list.\n\nBlog content:\n{}\n\nPlease provide 5 LinkedIn post ideas:",
        truncated(blog)
    )
}

fn posts_prompt(blog: &str) -> String {
    format!(
        "Generate 5 LinkedIn posts from this blog content. Respond with only a JSON array of objects, each with keys \"hook\" (an attention-grabbing first line), \"content\" (the post body), and \"image\" (a one-sentence image suggestion).\n\nBlog content:\n{}",
        truncated(blog)
    )
}

/// Strips `N. ` prefixes and blank lines, keeping at most five ideas.
pub fn parse_numbered_ideas(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| NUMBERED_PREFIX.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(MAX_IDEAS)
        .collect()
}

/// Strict JSON parse, tolerating a markdown code fence around the array.
pub fn parse_post_ideas(content: &str) -> Result<Vec<PostIdea>> {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .map(str::trim)
        .unwrap_or(trimmed);
    serde_json::from_str(trimmed).map_err(|e| anyhow!("completion is not a valid post array: {e}"))
}
