use crate::error::{ModelFailure, PlantDiagError, Result};
use crate::invokers::{ImageInput, InvokeOptions, ModelInvoker, RawModelOutput};
use crate::logic::extraction::ResponseExtractor;
use crate::logic::fusion::fuse;
use crate::logic::prompt::Prompt;
use crate::models::{Diagnosis, ModelOutcome, Provenance};
use futures::future::join_all;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Fans one request out to several models and reduces the answers to one diagnosis.
pub struct ConsensusAggregator {
    extractor: ResponseExtractor,
}

impl ConsensusAggregator {
    pub fn new() -> Self {
        Self {
            extractor: ResponseExtractor::new(),
        }
    }

    pub fn with_extractor(extractor: ResponseExtractor) -> Self {
        Self { extractor }
    }

    /// Invoke every model concurrently and merge the results.
    ///
    /// All branches share one deadline of `options.timeout_ms`. Failed or
    /// timed-out models are logged and skipped; only when every model fails is
    /// an error returned, listing each cause.
    pub async fn aggregate(
        &self,
        invokers: &[Box<dyn ModelInvoker>],
        image: &ImageInput,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Result<Diagnosis> {
        if invokers.is_empty() {
            return Err(PlantDiagError::InvalidInput("no models selected".into()));
        }

        let outcomes = self.collect_outcomes(invokers, image, prompt, options).await;
        resolve(outcomes, invokers.len())
    }

    /// One outcome per invoker, in invocation order.
    pub async fn collect_outcomes(
        &self,
        invokers: &[Box<dyn ModelInvoker>],
        image: &ImageInput,
        prompt: &Prompt,
        options: &InvokeOptions,
    ) -> Vec<ModelOutcome> {
        let deadline = Instant::now() + Duration::from_millis(options.timeout_ms);

        let calls = invokers.iter().map(|invoker| async move {
            let label = invoker.label();
            match timeout_at(deadline, invoker.invoke(image, prompt, options)).await {
                Ok(Ok(output)) => {
                    ModelOutcome::Success(self.normalize(label, output, prompt.plant_type_hint()))
                }
                Ok(Err(e)) => {
                    tracing::warn!("Model {} failed: {}", label, e);
                    ModelOutcome::Failure(ModelFailure::new(label, e.to_string()))
                }
                Err(_) => {
                    let e = PlantDiagError::Timeout {
                        model: label.to_string(),
                        budget_ms: options.timeout_ms,
                    };
                    tracing::warn!("Model {} failed: {}", label, e);
                    ModelOutcome::Failure(ModelFailure::new(label, e.to_string()))
                }
            }
        });

        let outcomes = join_all(calls).await;

        tracing::info!(
            invoked = outcomes.len(),
            succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
            "model calls finished"
        );

        outcomes
    }

    /// Text replies go through the extractor. Structured diagnoses already hold
    /// their invariants and are returned unchanged, except that an unset
    /// provenance is filled in with the invoker's label.
    fn normalize(&self, label: &str, output: RawModelOutput, hint: Option<&str>) -> Diagnosis {
        match output {
            RawModelOutput::Text(text) => self.extractor.extract_from(label, &text, hint),
            RawModelOutput::Structured(d) if *d.provenance() == Provenance::default() => {
                d.with_provenance(Provenance::model(label))
            }
            RawModelOutput::Structured(d) => d,
        }
    }
}

impl Default for ConsensusAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduce outcomes: no success is a `TotalFailure`, one success passes
/// through untouched, more are fused.
pub fn resolve(outcomes: Vec<ModelOutcome>, invoked: usize) -> Result<Diagnosis> {
    let mut successes = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            ModelOutcome::Success(d) => successes.push(d),
            ModelOutcome::Failure(f) => failures.push(f),
        }
    }

    match successes.len() {
        0 => Err(PlantDiagError::TotalFailure(failures)),
        1 => Ok(successes.remove(0)),
        _ => fuse(&successes, invoked).ok_or_else(|| PlantDiagError::TotalFailure(failures)),
    }
}
