//! HTTP client for an OpenAI-compatible chat-completions endpoint.

use super::{ChatRequest, ModelTier, Oracle};
use crate::error::{PromoError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_STANDARD_MODEL: &str = "gpt-4o";
const DEFAULT_MINI_MODEL: &str = "gpt-4o-mini";

/// Chat-completions request body. `response_format` pins the reply to a
/// single JSON object, which is what the schema layer expects to parse.
#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Reasoning-service client. Credentials are explicit constructor state so
/// the pipeline can be handed a fake behind the [`Oracle`] trait in tests.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    standard_model: String,
    mini_model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| PromoError::config_with_source("failed to create HTTP client", e))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            standard_model: DEFAULT_STANDARD_MODEL.to_string(),
            mini_model: DEFAULT_MINI_MODEL.to_string(),
        })
    }

    /// Point the client at a different endpoint (proxies, compatible vendors).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the model names behind the two tiers.
    pub fn with_models(
        mut self,
        standard_model: impl Into<String>,
        mini_model: impl Into<String>,
    ) -> Self {
        self.standard_model = standard_model.into();
        self.mini_model = mini_model.into();
        self
    }

    fn model_name(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.standard_model,
            ModelTier::Mini => &self.mini_model,
        }
    }
}

#[async_trait]
impl Oracle for OpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = CompletionRequest {
            model: self.model_name(request.model).to_string(),
            temperature: request.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![
                Message {
                    role: "system",
                    content: request.system_prompt.clone(),
                },
                Message {
                    role: "user",
                    content: request.user_prompt.clone(),
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PromoError::oracle(format!("request failed: {e}")))?;

        match response.status() {
            StatusCode::OK => {
                let parsed: CompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| PromoError::oracle(format!("unreadable response: {e}")))?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| PromoError::oracle("response carried no content"))
            }
            status => {
                let detail = response.text().await.unwrap_or_default();
                Err(PromoError::oracle(format!(
                    "endpoint returned {status}: {}",
                    detail.chars().take(200).collect::<String>()
                )))
            }
        }
    }
}
