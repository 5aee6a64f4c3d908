use crate::config::Config;
use crate::error::{PlantDiagError, Result};
use crate::invokers::{
    ChatCompletionsInvoker, ChatGlmInvoker, ImageInput, LocalServiceInvoker, ModelInvoker,
};
use crate::logic::consensus::ConsensusAggregator;
use crate::logic::fallback::FallbackPolicy;
use crate::logic::prompt::{Prompt, PromptBuilder};
use crate::models::{Diagnosis, EnvReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Qwen,
    QwenOcr,
    Taichu,
    ChatGlm,
    Local,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Qwen,
        ModelKind::QwenOcr,
        ModelKind::Taichu,
        ModelKind::ChatGlm,
        ModelKind::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Qwen => "qwen",
            ModelKind::QwenOcr => "qwen-ocr",
            ModelKind::Taichu => "taichu",
            ModelKind::ChatGlm => "chatglm",
            ModelKind::Local => "local",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "qwen" | "qwen-vl" => Some(ModelKind::Qwen),
            "qwen-ocr" | "qwen-vl-ocr" => Some(ModelKind::QwenOcr),
            "taichu" | "taichu-vl" => Some(ModelKind::Taichu),
            "chatglm" | "glm" => Some(ModelKind::ChatGlm),
            "local" | "local-service" => Some(ModelKind::Local),
            _ => None,
        }
    }

    /// Parse a comma-separated list, rejecting unknown names.
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        let mut kinds = Vec::new();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let kind = Self::from_str(name).ok_or_else(|| {
                PlantDiagError::InvalidInput(format!("unknown model '{}'", name))
            })?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One diagnosis request from the caller.
#[derive(Debug, Clone)]
pub struct DiagnosisRequest {
    pub image: ImageInput,
    pub plant_type: Option<String>,
    pub environment: Option<EnvReading>,
    /// Empty means the configured default models
    pub models: Vec<ModelKind>,
}

impl DiagnosisRequest {
    pub fn new(image: ImageInput) -> Self {
        Self {
            image,
            plant_type: None,
            environment: None,
            models: Vec::new(),
        }
    }

    pub fn with_plant_type(mut self, plant_type: impl Into<String>) -> Self {
        self.plant_type = Some(plant_type.into());
        self
    }

    pub fn with_environment(mut self, environment: EnvReading) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_models(mut self, models: Vec<ModelKind>) -> Self {
        self.models = models;
        self
    }
}

/// Wires configured models, the prompt and the aggregator together.
pub struct DiagnosisService {
    config: Config,
    aggregator: ConsensusAggregator,
    fallback: FallbackPolicy,
}

impl DiagnosisService {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            aggregator: ConsensusAggregator::new(),
            fallback: FallbackPolicy::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn build_invoker(&self, kind: ModelKind) -> Result<Box<dyn ModelInvoker>> {
        let missing =
            || PlantDiagError::Config(format!("{} is not configured or not enabled", kind));

        let invoker: Box<dyn ModelInvoker> = match kind {
            ModelKind::Qwen => {
                let c = self.config.qwen.as_ref().filter(|c| c.enabled).ok_or_else(missing)?;
                Box::new(ChatCompletionsInvoker::new(kind.as_str(), c.clone()))
            }
            ModelKind::QwenOcr => {
                let c = self.config.qwen.as_ref().filter(|c| c.enabled).ok_or_else(missing)?;
                let model = c.ocr_model.clone().ok_or_else(missing)?;
                Box::new(ChatCompletionsInvoker::new(kind.as_str(), c.clone()).with_model(model))
            }
            ModelKind::Taichu => {
                let c = self.config.taichu.as_ref().filter(|c| c.enabled).ok_or_else(missing)?;
                Box::new(ChatCompletionsInvoker::new(kind.as_str(), c.clone()))
            }
            ModelKind::ChatGlm => {
                let c = self.config.chatglm.as_ref().filter(|c| c.enabled).ok_or_else(missing)?;
                Box::new(ChatGlmInvoker::new(kind.as_str(), c.clone()))
            }
            ModelKind::Local => {
                let c = self
                    .config
                    .local_service
                    .as_ref()
                    .filter(|c| c.enabled)
                    .ok_or_else(missing)?;
                Box::new(LocalServiceInvoker::new(kind.as_str(), c.clone()))
            }
        };

        Ok(invoker)
    }

    /// The request's models, or the configured defaults when it names none.
    pub fn resolve_models(&self, requested: &[ModelKind]) -> Result<Vec<ModelKind>> {
        if !requested.is_empty() {
            return Ok(requested.to_vec());
        }
        let models = ModelKind::parse_list(&self.config.analysis.models.join(","))?;
        if models.is_empty() {
            return Err(PlantDiagError::Config("no default models configured".into()));
        }
        Ok(models)
    }

    pub fn build_prompt(&self, request: &DiagnosisRequest, models: &[ModelKind]) -> Prompt {
        PromptBuilder::new()
            .with_plant_type(request.plant_type.as_deref())
            .with_environment(request.environment.clone())
            .with_ocr(models == [ModelKind::QwenOcr])
            .build()
    }

    /// Diagnose a photo. When every model fails the causes are logged and the
    /// upstream-failure fallback is returned so there is always something to show.
    pub async fn diagnose(&self, request: &DiagnosisRequest) -> Result<Diagnosis> {
        let models = self.resolve_models(&request.models)?;
        let invokers = models
            .iter()
            .map(|kind| self.build_invoker(*kind))
            .collect::<Result<Vec<_>>>()?;
        let prompt = self.build_prompt(request, &models);

        tracing::info!(
            models = %models.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(","),
            plant_type = prompt.plant_type_hint().unwrap_or("unknown"),
            "starting diagnosis"
        );

        self.run(&invokers, &request.image, &prompt).await
    }

    /// Run the aggregator over prepared invokers, converting total failure
    /// into the sentinel fallback.
    pub async fn run(
        &self,
        invokers: &[Box<dyn ModelInvoker>],
        image: &ImageInput,
        prompt: &Prompt,
    ) -> Result<Diagnosis> {
        let options = self.config.analysis.invoke_options();

        match self.aggregator.aggregate(invokers, image, prompt, &options).await {
            Ok(diagnosis) => Ok(diagnosis),
            Err(PlantDiagError::TotalFailure(failures)) => {
                for failure in &failures {
                    tracing::warn!("{} failed: {}", failure.model, failure.cause);
                }
                tracing::warn!("All {} models failed, using fallback", failures.len());
                Ok(self.fallback.fallback(prompt.plant_type_hint(), true))
            }
            Err(e) => Err(e),
        }
    }

    /// Reachability of every enabled model.
    pub async fn check_connections(&self) -> ConnectionStatus {
        let mut status = ConnectionStatus::default();

        for name in self.config.enabled_models() {
            let Some(kind) = ModelKind::from_str(name) else {
                continue;
            };
            let connected = match self.build_invoker(kind) {
                Ok(invoker) => invoker.test_connection().await.unwrap_or(false),
                Err(e) => {
                    tracing::warn!("Cannot build {} client: {}", kind, e);
                    false
                }
            };
            status.models.push((kind, connected));
        }

        status
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionStatus {
    pub models: Vec<(ModelKind, bool)>,
}

impl ConnectionStatus {
    pub fn all_connected(&self) -> bool {
        !self.models.is_empty() && self.models.iter().all(|(_, ok)| *ok)
    }

    pub fn any_connected(&self) -> bool {
        self.models.iter().any(|(_, ok)| *ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChatEndpointConfig, LocalServiceConfig};

    fn config() -> Config {
        Config {
            qwen: Some(ChatEndpointConfig::qwen("k")),
            local_service: Some(LocalServiceConfig {
                url: "http://localhost:3001/api".into(),
                api_key: String::new(),
                enabled: false,
            }),
            ..Config::default()
        }
    }

    #[test]
    fn model_kind_parsing() {
        for kind in ModelKind::ALL {
            assert_eq!(ModelKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ModelKind::from_str(" Qwen_VL "), Some(ModelKind::Qwen));
        assert_eq!(ModelKind::from_str("spark"), None);
    }

    #[test]
    fn model_list_parsing() {
        assert_eq!(
            ModelKind::parse_list("qwen, taichu,qwen,").unwrap(),
            vec![ModelKind::Qwen, ModelKind::Taichu]
        );
        assert!(matches!(
            ModelKind::parse_list("qwen,spark"),
            Err(PlantDiagError::InvalidInput(_))
        ));
    }

    #[test]
    fn invokers_need_enabled_sections() {
        let service = DiagnosisService::new(config());
        assert_eq!(service.build_invoker(ModelKind::Qwen).unwrap().label(), "qwen");
        assert_eq!(
            service.build_invoker(ModelKind::QwenOcr).unwrap().label(),
            "qwen-ocr"
        );
        assert!(matches!(
            service.build_invoker(ModelKind::Taichu),
            Err(PlantDiagError::Config(_))
        ));
        assert!(service.build_invoker(ModelKind::Local).is_err());
    }

    #[test]
    fn default_models_come_from_config() {
        let service = DiagnosisService::new(config());
        assert_eq!(service.resolve_models(&[]).unwrap(), vec![ModelKind::Qwen]);
        assert_eq!(
            service.resolve_models(&[ModelKind::Taichu]).unwrap(),
            vec![ModelKind::Taichu]
        );
    }

    #[test]
    fn ocr_prompt_only_for_ocr_alone() {
        let service = DiagnosisService::new(config());
        let request = DiagnosisRequest::new(ImageInput::from_bytes(vec![1])).with_plant_type("番茄");

        let prompt = service.build_prompt(&request, &[ModelKind::QwenOcr]);
        assert!(prompt.user.contains("图中的文本信息"));

        let prompt = service.build_prompt(&request, &[ModelKind::QwenOcr, ModelKind::Qwen]);
        assert!(!prompt.user.contains("图中的文本信息"));
        assert_eq!(prompt.plant_type_hint(), Some("番茄"));
    }

    #[test]
    fn connection_status_summary() {
        let status = ConnectionStatus {
            models: vec![(ModelKind::Qwen, true), (ModelKind::Taichu, false)],
        };
        assert!(status.any_connected());
        assert!(!status.all_connected());
        assert!(!ConnectionStatus::default().all_connected());
    }
}
