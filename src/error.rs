use thiserror::Error;

/// One model's failure inside an aggregation, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFailure {
    pub model: String,
    pub cause: String,
}

impl ModelFailure {
    pub fn new(model: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            cause: cause.into(),
        }
    }
}

impl std::fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.model, self.cause)
    }
}

#[derive(Error, Debug)]
pub enum PlantDiagError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{model} did not respond within {budget_ms} ms")]
    Timeout { model: String, budget_ms: u64 },

    #[error("All {} models failed: {}", .0.len(), format_failures(.0))]
    TotalFailure(Vec<ModelFailure>),
}

fn format_failures(failures: &[ModelFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, PlantDiagError>;
