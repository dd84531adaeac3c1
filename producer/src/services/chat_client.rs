//! Chat-completion backed article generator

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use shared::{GeneratedArticle, GenerationFailure, GenerationResult, Settings};

use crate::core::{build_user_prompt, parse_article, RateLimiter, SYSTEM_PROMPT};
use crate::error::ProducerResult;
use crate::traits::ArticleGenerator;

/// Connection parameters for the completion endpoint
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub rate_limit_per_minute: u32,
    pub request_timeout: Duration,
}

impl From<&Settings> for ChatClientConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            base_url: settings.clean_base_url(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().filter(|key| !key.trim().is_empty()),
            rate_limit_per_minute: settings.rate_limit_per_minute,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

/// Article generator talking to an OpenAI-compatible `/chat/completions` endpoint
pub struct RealArticleGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: RwLock<Option<String>>,
    rate_limiter: RateLimiter,
}

impl RealArticleGenerator {
    pub fn new(config: ChatClientConfig) -> ProducerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let base_url = config.base_url.trim().trim_matches('`').trim().trim_end_matches('/');

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url),
            model: config.model,
            api_key: RwLock::new(config.api_key),
            rate_limiter: RateLimiter::new(config.rate_limit_per_minute),
        })
    }

    pub fn from_settings(settings: &Settings) -> ProducerResult<Self> {
        Self::new(ChatClientConfig::from(settings))
    }

    fn current_key(&self) -> Option<String> {
        self.api_key
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn request_completion(&self, api_key: &str, seed: &str, length_hint: &str) -> Result<String, GenerationFailure> {
        let request_body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": build_user_prompt(seed, length_hint)
                }
            ],
            "max_completion_tokens": 8192,
            "temperature": 0.7,
            "top_p": 0.95,
            "stream": false,
            "frequency_penalty": 0,
            "presence_penalty": 0,
            "thinking": { "type": "disabled" }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerationFailure::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return match response.status().as_u16() {
                401 => Err(GenerationFailure::AuthenticationFailed),
                429 => Err(GenerationFailure::RateLimitExceeded),
                503 => Err(GenerationFailure::ServiceUnavailable),
                _ => Err(GenerationFailure::ServerError(response.status().to_string())),
            };
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationFailure::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        response_json
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(str::to_string)
            .ok_or_else(|| GenerationFailure::InvalidResponse("No content in response".to_string()))
    }
}

#[async_trait]
impl ArticleGenerator for RealArticleGenerator {
    async fn generate(&self, seed: &str, index: u64, length_hint: &str) -> GenerationResult {
        self.rate_limiter.acquire().await;

        let Some(api_key) = self.current_key() else {
            warn!("Article {} skipped: no API key configured", index);
            return Err(GenerationFailure::AuthenticationFailed);
        };

        debug!("Requesting article {} for seed '{}'", index, seed);
        let raw = self.request_completion(&api_key, seed, length_hint).await?;
        let parsed = parse_article(&raw);

        Ok(GeneratedArticle {
            title: parsed.title,
            tags: parsed.tags,
            content: parsed.content,
            raw_response: raw,
        })
    }

    fn remaining_capacity(&self) -> u32 {
        self.rate_limiter.remaining_capacity()
    }

    fn update_api_key(&self, api_key: &str) {
        let key = api_key.trim();
        let mut current = self.api_key.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = if key.is_empty() { None } else { Some(key.to_string()) };
    }
}
