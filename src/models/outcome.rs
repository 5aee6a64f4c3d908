use super::diagnosis::Diagnosis;
use crate::error::ModelFailure;

/// Result of one model call inside one aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutcome {
    Success(Diagnosis),
    Failure(ModelFailure),
}

impl ModelOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ModelOutcome::Success(_))
    }

    pub fn success(&self) -> Option<&Diagnosis> {
        match self {
            ModelOutcome::Success(d) => Some(d),
            ModelOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ModelFailure> {
        match self {
            ModelOutcome::Success(_) => None,
            ModelOutcome::Failure(f) => Some(f),
        }
    }
}
