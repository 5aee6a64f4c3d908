use super::{ensure_success, ImageInput, InvokeOptions, ModelInvoker, RawModelOutput};
use crate::config::LocalServiceConfig;
use crate::error::{PlantDiagError, Result};
use crate::logic::extraction::treatments::DEFAULT_PRICE;
use crate::logic::prompt::Prompt;
use crate::models::{Diagnosis, EnvReading, Tier, Treatment};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Confidence assumed when the service omits one.
pub const SERVICE_DEFAULT_CONFIDENCE: f64 = 0.85;

/// Client for a self-hosted diagnosis service that answers with structured JSON.
pub struct LocalServiceInvoker {
    client: reqwest::Client,
    label: String,
    config: LocalServiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiagnoseRequest<'a> {
    image_data: String,
    plant_type: &'a str,
    environment_data: Option<EnvironmentPayload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentPayload {
    soil_moisture: f64,
    soil_temperature: f64,
    soil_ph: f64,
    air_temperature: f64,
    air_humidity: f64,
}

impl From<&EnvReading> for EnvironmentPayload {
    fn from(e: &EnvReading) -> Self {
        Self {
            soil_moisture: e.soil_moisture_percent,
            soil_temperature: e.soil_temperature_c,
            soil_ph: e.soil_ph,
            air_temperature: e.air_temperature_c,
            air_humidity: e.air_humidity_percent,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceDiagnosis {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    treatments: Option<Vec<ServiceTreatment>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceTreatment {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    cost: Option<String>,
    #[serde(default)]
    effectiveness: Option<String>,
    #[serde(default)]
    estimated_price: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ServiceTreatment {
    fn into_treatment(self) -> Option<Treatment> {
        let method = self.method.filter(|m| !m.trim().is_empty())?;
        Some(Treatment::new(
            method,
            self.cost.as_deref().map(Tier::from_keyword).unwrap_or_default(),
            self.effectiveness
                .as_deref()
                .map(Tier::from_keyword)
                .unwrap_or_default(),
            self.estimated_price
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_PRICE.to_string()),
            self.description.unwrap_or_default(),
        ))
    }
}

impl ServiceDiagnosis {
    fn into_diagnosis(self, label: &str) -> Result<Diagnosis> {
        let name = self.name.filter(|n| !n.trim().is_empty()).ok_or_else(|| {
            PlantDiagError::InvalidResponse(format!("{} response has no name", label))
        })?;

        let confidence = self
            .confidence
            .filter(|c| *c > 0.0)
            .unwrap_or(SERVICE_DEFAULT_CONFIDENCE);

        let treatments = self
            .treatments
            .unwrap_or_default()
            .into_iter()
            .filter_map(ServiceTreatment::into_treatment)
            .collect();

        Ok(Diagnosis::new(
            name,
            self.description.unwrap_or_default(),
            confidence,
            treatments,
        ))
    }
}

impl LocalServiceInvoker {
    pub fn new(label: impl Into<String>, config: LocalServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            label: label.into(),
            config,
        }
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> PlantDiagError {
        PlantDiagError::ModelUnavailable(format!("{}: {}", self.label, e))
    }
}

#[async_trait]
impl ModelInvoker for LocalServiceInvoker {
    fn label(&self) -> &str {
        &self.label
    }

    async fn invoke(
        &self,
        image: &ImageInput,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<RawModelOutput> {
        let request = DiagnoseRequest {
            image_data: image.to_base64(),
            plant_type: prompt.plant_type_hint().unwrap_or("unknown"),
            environment_data: prompt.environment.as_ref().map(EnvironmentPayload::from),
        };

        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        let response = ensure_success(&self.label, response).await?;

        let body: ServiceDiagnosis = response.json().await.map_err(|e| {
            PlantDiagError::InvalidResponse(format!(
                "Failed to parse {} response: {}",
                self.label, e
            ))
        })?;

        Ok(RawModelOutput::Structured(body.into_diagnosis(&self.label)?))
    }

    async fn test_connection(&self) -> Result<bool> {
        let response = self
            .client
            .get(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        Ok(!response.status().is_server_error())
    }
}
