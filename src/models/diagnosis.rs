use super::templates::pad_treatments;
use serde::{Deserialize, Serialize};

/// Maximum number of treatments carried by a diagnosis.
pub const MAX_TREATMENTS: usize = 4;

/// Confidence used when a reply carries no usable confidence value.
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Confidence pinned on results that stand in for a failed upstream call.
pub const FAILURE_SENTINEL: f64 = 0.01;

/// Any confidence at or below this value means "the call failed", not "low confidence".
pub const SENTINEL_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    #[default]
    Medium,
    High,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::Medium => "medium",
            Tier::High => "high",
        }
    }

    pub fn label_zh(&self) -> &'static str {
        match self {
            Tier::Low => "低",
            Tier::Medium => "中",
            Tier::High => "高",
        }
    }

    /// Keyword lexicon: 低/low map to `Low`, 高/high to `High`, anything else is `Medium`.
    pub fn from_keyword(s: &str) -> Self {
        let s = s.trim();
        if s.starts_with('低') || s.eq_ignore_ascii_case("low") {
            Tier::Low
        } else if s.starts_with('高') || s.eq_ignore_ascii_case("high") {
            Tier::High
        } else {
            Tier::Medium
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treatment {
    pub method: String,
    pub cost: Tier,
    pub effectiveness: Tier,
    pub estimated_price: String,
    pub description: String,
}

impl Treatment {
    pub fn new(
        method: impl Into<String>,
        cost: Tier,
        effectiveness: Tier,
        estimated_price: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            cost,
            effectiveness,
            estimated_price: estimated_price.into(),
            description: description.into(),
        }
    }
}

/// Where a diagnosis came from. Set explicitly by whoever produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub source: String,
    pub models_agreed: u32,
    pub models_succeeded: u32,
}

impl Provenance {
    pub const CONSENSUS: &'static str = "consensus";
    pub const FALLBACK: &'static str = "fallback";

    pub fn model(label: impl Into<String>) -> Self {
        Self {
            source: label.into(),
            models_agreed: 1,
            models_succeeded: 1,
        }
    }

    pub fn consensus(models_agreed: u32, models_succeeded: u32) -> Self {
        Self {
            source: Self::CONSENSUS.to_string(),
            models_agreed,
            models_succeeded,
        }
    }

    pub fn fallback() -> Self {
        Self {
            source: Self::FALLBACK.to_string(),
            models_agreed: 0,
            models_succeeded: 0,
        }
    }

    pub fn is_consensus(&self) -> bool {
        self.source == Self::CONSENSUS
    }
}

/// Structured diagnosis. Confidence is always within [0, 1] and there are
/// always between 1 and 4 treatments, deduplicated by method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DiagnosisRecord")]
pub struct Diagnosis {
    name: String,
    description: String,
    confidence: f64,
    treatments: Vec<Treatment>,
    provenance: Provenance,
}

#[derive(Deserialize)]
struct DiagnosisRecord {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    treatments: Vec<Treatment>,
    #[serde(default)]
    provenance: Provenance,
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

impl From<DiagnosisRecord> for Diagnosis {
    fn from(r: DiagnosisRecord) -> Self {
        Diagnosis::new(r.name, r.description, r.confidence, r.treatments)
            .with_provenance(r.provenance)
    }
}

impl Diagnosis {
    /// Builds a diagnosis, enforcing the confidence range and treatment count.
    /// An empty treatment list is filled from the generic templates.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        confidence: f64,
        treatments: Vec<Treatment>,
    ) -> Self {
        let mut unique: Vec<Treatment> = Vec::with_capacity(MAX_TREATMENTS);
        for treatment in treatments {
            if unique.len() >= MAX_TREATMENTS {
                break;
            }
            if !unique.iter().any(|t| t.method == treatment.method) {
                unique.push(treatment);
            }
        }
        if unique.is_empty() {
            pad_treatments(&mut unique);
        }

        Self {
            name: name.into(),
            description: description.into(),
            confidence: clamp_confidence(confidence),
            treatments: unique,
            provenance: Provenance::default(),
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn treatments(&self) -> &[Treatment] {
        &self.treatments
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// True when this result encodes a failed call rather than a real diagnosis.
    pub fn is_failure_sentinel(&self) -> bool {
        self.confidence <= SENTINEL_THRESHOLD
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        DEFAULT_CONFIDENCE
    } else {
        value.clamp(0.0, 1.0)
    }
}
