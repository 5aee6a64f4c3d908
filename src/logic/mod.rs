pub mod consensus;
pub mod extraction;
pub mod fallback;
pub mod fusion;
pub mod prompt;
pub mod search;
pub mod service;

pub use consensus::ConsensusAggregator;
pub use extraction::{ResponseExtractor, TreatmentExtractor};
pub use fallback::FallbackPolicy;
pub use prompt::{Prompt, PromptBuilder};
pub use service::{DiagnosisRequest, DiagnosisService, ModelKind};
