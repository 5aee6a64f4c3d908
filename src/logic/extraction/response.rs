use super::rules::*;
use super::{FieldRules, TreatmentExtractor};
use crate::logic::fallback::FallbackPolicy;
use crate::models::{Diagnosis, Provenance, DEFAULT_CONFIDENCE};

pub const UNKNOWN_DISEASE: &str = "未知病害";
pub const NO_DESCRIPTION: &str = "无描述";

/// Turns a free-text model reply into a `Diagnosis`.
///
/// Each field is located by an ordered list of rules; the first rule that
/// matches wins and missing fields fall back to defaults. A reply in which no
/// field can be located at all is replaced by the plant-type fallback.
/// Extraction never fails and never touches shared state.
pub struct ResponseExtractor {
    name: FieldRules<String>,
    description: FieldRules<String>,
    confidence: FieldRules<RawConfidence>,
    section: FieldRules<SectionSpan>,
    treatments: TreatmentExtractor,
    fallback: FallbackPolicy,
}

impl ResponseExtractor {
    pub fn new() -> Self {
        Self {
            name: FieldRules::new("name")
                .with(LineCapture::new("name_label", &NAME_LABEL))
                .with(LineCapture::new("name_label_en", &NAME_LABEL_EN))
                .with(LineCapture::new("name_numbered", &NAME_NUMBERED)),
            description: FieldRules::new("description")
                .with(BoundedSpan::new("description_label", &DESCRIPTION_LABEL))
                .with(BoundedSpan::new("description_label_en", &DESCRIPTION_LABEL_EN))
                .with(BoundedSpan::new("description_numbered", &DESCRIPTION_NUMBERED)),
            confidence: FieldRules::new("confidence")
                .with(ConfidenceCapture::new("confidence_label", &CONFIDENCE_LABEL))
                .with(ConfidenceCapture::new("confidence_adjacent", &CONFIDENCE_ADJACENT))
                .with(ConfidenceCapture::new("confidence_numbered", &CONFIDENCE_NUMBERED)),
            section: FieldRules::new("treatment_section")
                .with(SectionStart::new("section_label", &SECTION_LABEL))
                .with(SectionStart::new("section_numbered", &SECTION_NUMBERED))
                .with(KeywordStart::new("section_keyword", "治疗")),
            treatments: TreatmentExtractor::new(),
            fallback: FallbackPolicy::new(),
        }
    }

    /// Extract a diagnosis, falling back to the plant-type table when the
    /// reply carries no recognizable structure.
    pub fn extract(&self, raw_text: &str, plant_type_hint: Option<&str>) -> Diagnosis {
        self.parse(raw_text)
            .unwrap_or_else(|| self.fallback.fallback(plant_type_hint, false))
    }

    /// Same as [`extract`](Self::extract), tagging a parsed result with the
    /// label of the model that produced it. Fallback results keep their own
    /// provenance.
    pub fn extract_from(
        &self,
        model_label: &str,
        raw_text: &str,
        plant_type_hint: Option<&str>,
    ) -> Diagnosis {
        match self.parse(raw_text) {
            Some(d) => d.with_provenance(Provenance::model(model_label)),
            None => {
                tracing::debug!(model = model_label, "reply had no recognizable fields");
                self.fallback.fallback(plant_type_hint, false)
            }
        }
    }

    pub fn treatment_extractor(&self) -> &TreatmentExtractor {
        &self.treatments
    }

    /// Rule ids per field, in evaluation order.
    pub fn list_rules(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        vec![
            ("name", self.name.list_rules()),
            ("description", self.description.list_rules()),
            ("confidence", self.confidence.list_rules()),
            ("treatment_section", self.section.list_rules()),
        ]
    }

    fn parse(&self, raw_text: &str) -> Option<Diagnosis> {
        let text = raw_text.replace("\r\n", "\n");
        if text.trim().is_empty() {
            return None;
        }

        let section = self.section.first_match(&text);
        let head = match section {
            Some(span) if span.bounds_head => &text[..span.marker],
            _ => text.as_str(),
        };

        let name = self.name.first_match(head);
        let description = self.description.first_match(head);
        let confidence = self.confidence.first_match(head);

        if name.is_none() && description.is_none() && confidence.is_none() && section.is_none() {
            return None;
        }

        let treatments = match section {
            Some(span) => self.treatments.extract_treatments(&text[span.body..]),
            None => self.treatments.extract_treatments(""),
        };

        Some(Diagnosis::new(
            name.unwrap_or_else(|| UNKNOWN_DISEASE.to_string()),
            description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            normalize_confidence(confidence),
            treatments,
        ))
    }
}

impl Default for ResponseExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentages and values above 1 are divided by 100; anything still outside
/// [0, 1] becomes the default confidence.
pub fn normalize_confidence(raw: Option<RawConfidence>) -> f64 {
    let Some(raw) = raw else {
        return DEFAULT_CONFIDENCE;
    };

    let value = if raw.percent || raw.value > 1.0 {
        raw.value / 100.0
    } else {
        raw.value
    };

    if (0.0..=1.0).contains(&value) {
        value
    } else {
        DEFAULT_CONFIDENCE
    }
}
