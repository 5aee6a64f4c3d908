use super::{ensure_success, ImageInput, InvokeOptions, ModelInvoker, RawModelOutput};
use crate::config::ChatEndpointConfig;
use crate::error::{PlantDiagError, Result};
use crate::logic::prompt::Prompt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TOP_P: f64 = 0.9;

/// Client for OpenAI-compatible vision endpoints (Qwen-VL, Taichu-VL).
pub struct ChatCompletionsInvoker {
    client: reqwest::Client,
    label: String,
    model: String,
    config: ChatEndpointConfig,
}

// Request/response shapes of the chat/completions API
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsInvoker {
    pub fn new(label: impl Into<String>, config: ChatEndpointConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            label: label.into(),
            model: config.model.clone(),
            config,
        }
    }

    /// Use a different model on the same endpoint, e.g. the OCR variant.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn build_request<'a>(
        &'a self,
        image: &ImageInput,
        prompt: &'a Prompt,
        options: &InvokeOptions,
    ) -> ChatRequest<'a> {
        let system_prompt = if self.config.send_system_prompt {
            prompt.system.as_deref()
        } else {
            None
        };

        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: prompt.user.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_url(),
                        },
                    },
                ],
            }],
            temperature: options.temperature,
            top_p: TOP_P,
            max_tokens: options.max_tokens,
            stream: false,
            system_prompt,
        }
    }
}

#[async_trait]
impl ModelInvoker for ChatCompletionsInvoker {
    fn label(&self) -> &str {
        &self.label
    }

    async fn invoke(
        &self,
        image: &ImageInput,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<RawModelOutput> {
        let request = self.build_request(image, prompt, options);

        tracing::debug!(model = %self.model, label = %self.label, "sending chat completion");

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&request)
            .send()
            .await
            .map_err(|e| PlantDiagError::ModelUnavailable(format!("{}: {}", self.label, e)))?;

        let response = ensure_success(&self.label, response).await?;

        let body: ChatResponse = response.json().await.map_err(|e| {
            PlantDiagError::InvalidResponse(format!(
                "Failed to parse {} response: {}",
                self.label, e
            ))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                PlantDiagError::InvalidResponse(format!("{} returned no content", self.label))
            })?;

        Ok(RawModelOutput::Text(content))
    }

    async fn test_connection(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| PlantDiagError::ModelUnavailable(format!("{}: {}", self.label, e)))?;

        Ok(response.status().is_success())
    }
}
