pub mod chat_completions;
pub mod chatglm;
pub mod local_service;

pub use chat_completions::ChatCompletionsInvoker;
pub use chatglm::ChatGlmInvoker;
pub use local_service::LocalServiceInvoker;

use crate::error::{PlantDiagError, Result};
use crate::logic::prompt::Prompt;
use crate::models::Diagnosis;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// A photo to be diagnosed.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageInput {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageInput")
            .field("bytes", &format!("[{} bytes]", self.bytes.len()))
            .finish()
    }
}

impl ImageInput {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        if bytes.is_empty() {
            return Err(PlantDiagError::InvalidInput(format!(
                "image file {} is empty",
                path.display()
            )));
        }
        Ok(Self { bytes })
    }

    /// Accepts a full `data:...;base64,` URL or bare base64.
    pub fn from_data_url(data: &str) -> Result<Self> {
        let encoded = match data.find("base64,") {
            Some(i) => &data[i + "base64,".len()..],
            None => data,
        };
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| PlantDiagError::InvalidInput(format!("invalid base64 image: {}", e)))?;
        if bytes.is_empty() {
            return Err(PlantDiagError::InvalidInput("image data is empty".into()));
        }
        Ok(Self { bytes })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("{}{}", DATA_URL_PREFIX, self.to_base64())
    }
}

/// Per-request sampling and timeout settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvokeOptions {
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
            timeout_ms: 60_000,
        }
    }
}

/// What a model call hands back before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawModelOutput {
    /// Free-text answer, run through the response extractor
    Text(String),
    /// Already structured by the service that produced it
    Structured(Diagnosis),
}

/// One vision-language model endpoint.
///
/// Implementations acquire everything a call needs (request, access token)
/// inside `invoke` and must return `Err` on any transport or API error.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Name used in logs, failures and provenance
    fn label(&self) -> &str;

    async fn invoke(
        &self,
        image: &ImageInput,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<RawModelOutput>;

    /// Check that the endpoint is reachable with the configured credentials
    async fn test_connection(&self) -> Result<bool>;
}

/// Map a non-success HTTP response to `ModelUnavailable`, keeping the body.
pub(crate) async fn ensure_success(
    label: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(PlantDiagError::ModelUnavailable(format!(
        "{} returned {}: {}",
        label, status, body
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_round_trip() {
        let image = ImageInput::from_bytes(vec![0xff, 0xd8, 0xff, 0xe0]);
        let url = image.data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(ImageInput::from_data_url(&url).unwrap(), image);
    }

    #[test]
    fn bare_base64_is_accepted() {
        let image = ImageInput::from_data_url("aGVsbG8=").unwrap();
        assert_eq!(image.bytes(), b"hello");
    }

    #[test]
    fn png_prefix_is_stripped() {
        let image = ImageInput::from_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.bytes(), b"hello");
    }

    #[test]
    fn invalid_input_is_rejected() {
        assert!(matches!(
            ImageInput::from_data_url("data:image/jpeg;base64,@@@"),
            Err(PlantDiagError::InvalidInput(_))
        ));
        assert!(matches!(
            ImageInput::from_data_url("data:image/jpeg;base64,"),
            Err(PlantDiagError::InvalidInput(_))
        ));
    }

    #[test]
    fn debug_hides_bytes() {
        let image = ImageInput::from_bytes(vec![1, 2, 3]);
        assert_eq!(format!("{:?}", image), "ImageInput { bytes: \"[3 bytes]\" }");
    }

    #[test]
    fn default_options() {
        let options = InvokeOptions::default();
        assert_eq!(options.temperature, 0.7);
        assert_eq!(options.max_tokens, 2000);
        assert_eq!(options.timeout_ms, 60_000);
    }
}
