use super::{ensure_success, ImageInput, InvokeOptions, ModelInvoker, RawModelOutput};
use crate::config::ChatGlmConfig;
use crate::error::{PlantDiagError, Result};
use crate::logic::prompt::Prompt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const TOP_P: f64 = 0.9;

/// Client for the ChatGLM assistant API.
///
/// Each call fetches its own access token; nothing is cached between calls.
pub struct ChatGlmInvoker {
    client: reqwest::Client,
    label: String,
    config: ChatGlmConfig,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    api_key: &'a str,
    api_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    status: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<TokenResult>,
}

#[derive(Debug, Deserialize)]
struct TokenResult {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssistantRequest<'a> {
    assistant_id: &'a str,
    prompt: &'a str,
    file_list: Vec<FileRef>,
    meta_data: MetaData,
}

#[derive(Debug, Serialize)]
struct FileRef {
    file_id: String,
}

#[derive(Debug, Serialize)]
struct MetaData {
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AssistantResponse {
    status: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<AssistantResult>,
}

#[derive(Debug, Deserialize)]
struct AssistantResult {
    #[serde(default)]
    message: Option<AssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Value,
}

impl ChatGlmInvoker {
    pub fn new(label: impl Into<String>, config: ChatGlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            label: label.into(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> PlantDiagError {
        PlantDiagError::ModelUnavailable(format!("{}: {}", self.label, e))
    }

    async fn access_token(&self, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("get_token"))
            .timeout(timeout)
            .json(&TokenRequest {
                api_key: &self.config.api_key,
                api_secret: &self.config.api_secret,
            })
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        let response = ensure_success(&self.label, response).await?;

        let token: TokenResponse = response.json().await.map_err(|e| {
            PlantDiagError::InvalidResponse(format!("Failed to parse {} token: {}", self.label, e))
        })?;

        if token.status != 0 {
            return Err(self.unavailable(format!(
                "token request rejected: {}",
                token.message.unwrap_or_else(|| "unknown error".into())
            )));
        }

        token
            .result
            .and_then(|r| r.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| self.unavailable("token response has no access_token"))
    }
}

/// Text may arrive as `{"text": ...}`, `{"type": "text", "text": ...}` or a plain string.
fn content_text(content: &Value) -> Option<&str> {
    content
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| content.as_str())
}

#[async_trait]
impl ModelInvoker for ChatGlmInvoker {
    fn label(&self) -> &str {
        &self.label
    }

    async fn invoke(
        &self,
        image: &ImageInput,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<RawModelOutput> {
        let timeout = Duration::from_millis(options.timeout_ms);
        let token = self.access_token(timeout).await?;

        let request = AssistantRequest {
            assistant_id: &self.config.assistant_id,
            prompt: &prompt.user,
            file_list: vec![FileRef {
                file_id: image.data_url(),
            }],
            meta_data: MetaData {
                temperature: options.temperature,
                top_p: TOP_P,
                max_tokens: options.max_tokens,
            },
        };

        tracing::debug!(label = %self.label, "sending assistant request");

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&token)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        let response = ensure_success(&self.label, response).await?;

        let body: AssistantResponse = response.json().await.map_err(|e| {
            PlantDiagError::InvalidResponse(format!(
                "Failed to parse {} response: {}",
                self.label, e
            ))
        })?;

        if body.status != 0 {
            return Err(self.unavailable(format!(
                "request rejected: {}",
                body.message.unwrap_or_else(|| "unknown error".into())
            )));
        }

        let text = body
            .result
            .as_ref()
            .and_then(|r| r.message.as_ref())
            .and_then(|m| content_text(&m.content))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                PlantDiagError::InvalidResponse(format!("{} returned no text", self.label))
            })?;

        Ok(RawModelOutput::Text(text.to_string()))
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(self.access_token(Duration::from_secs(10)).await.is_ok())
    }
}
