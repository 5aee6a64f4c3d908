use crate::models::templates::remediation_templates;
use crate::models::{Diagnosis, PlantKind, Provenance, DEFAULT_CONFIDENCE, FAILURE_SENTINEL};

pub const UPSTREAM_FAILURE_NAME: &str = "网络连接错误 - 无法分析图片";
pub const UPSTREAM_FAILURE_DESCRIPTION: &str =
    "无法连接到分析服务，请检查网络连接和API配置后重试。";

pub const DEFAULT_DISEASE: &str = "叶斑病";
pub const DEFAULT_DISEASE_DESCRIPTION: &str =
    "叶斑病是一类常见的植物病害，表现为叶片上出现圆形或不规则形的病斑，严重时导致叶片枯黄脱落。";

/// Deterministic stand-in diagnoses for when nothing usable came back.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPolicy;

impl FallbackPolicy {
    pub fn new() -> Self {
        Self
    }

    /// An upstream failure yields the sentinel confidence and remediation steps.
    /// Anything else yields the crop's typical disease at the default confidence.
    pub fn fallback(&self, plant_type_hint: Option<&str>, is_upstream_failure: bool) -> Diagnosis {
        if is_upstream_failure {
            return Diagnosis::new(
                UPSTREAM_FAILURE_NAME,
                UPSTREAM_FAILURE_DESCRIPTION,
                FAILURE_SENTINEL,
                remediation_templates(),
            )
            .with_provenance(Provenance::fallback());
        }

        let (name, description) = plant_type_hint
            .and_then(PlantKind::from_hint)
            .map(|kind| kind.typical_disease())
            .unwrap_or((DEFAULT_DISEASE, DEFAULT_DISEASE_DESCRIPTION));

        Diagnosis::new(name, description, DEFAULT_CONFIDENCE, Vec::new())
            .with_provenance(Provenance::fallback())
    }
}
