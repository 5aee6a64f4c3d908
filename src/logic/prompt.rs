use crate::models::EnvReading;

pub const SYSTEM_PROMPT: &str =
    "你是一个专业的植物病害诊断助手，可以根据图片识别植物病害并提供治疗方案。";

const UNKNOWN_PLANT: &str = "未知";

const TREATMENT_FORMAT: &str = "治疗方案(请为每种方法提供详细说明):
   - 方法名称
   - 具体实施步骤
   - 所需材料/药剂及用量
   - 适用条件和最佳时机
   - 操作注意事项
   - 成本级别(低/中/高)
   - 有效性级别(低/中/高)
   - 估计价格";

/// Prompt text sent with the image, plus the inputs it was rendered from.
/// Services that take structured input read `plant_type` and `environment` directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
    pub plant_type: Option<String>,
    pub environment: Option<EnvReading>,
}

impl Prompt {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
            plant_type: None,
            environment: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_plant_type(mut self, plant_type: impl Into<String>) -> Self {
        self.plant_type = Some(plant_type.into());
        self
    }

    pub fn with_environment(mut self, environment: EnvReading) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn plant_type_hint(&self) -> Option<&str> {
        self.plant_type.as_deref()
    }
}

/// Renders the diagnosis prompt shared by every model.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    plant_type: Option<String>,
    environment: Option<EnvReading>,
    ocr: bool,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plant_type(mut self, plant_type: Option<&str>) -> Self {
        self.plant_type = plant_type
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from);
        self
    }

    pub fn with_environment(mut self, environment: Option<EnvReading>) -> Self {
        self.environment = environment;
        self
    }

    /// Ask the model to transcribe any text in the image first.
    pub fn with_ocr(mut self, ocr: bool) -> Self {
        self.ocr = ocr;
        self
    }

    pub fn build(&self) -> Prompt {
        let plant_line = format!(
            "植物类型: {}",
            self.plant_type.as_deref().unwrap_or(UNKNOWN_PLANT)
        );
        let env_block = self
            .environment
            .as_ref()
            .map(|e| e.prompt_block())
            .unwrap_or_default();

        let (intro, items) = if self.ocr {
            (
                "请识别并分析这张带有文字的植物图片，首先提取图片中的文本信息，然后诊断可能的病害。",
                vec![
                    "图中的文本信息(如有)",
                    "病害名称",
                    "病害描述(包括症状特征、发病规律和危害程度)",
                    "置信度(0-1之间的数值)",
                    TREATMENT_FORMAT,
                ],
            )
        } else {
            (
                "请分析这张植物图片，诊断可能的病害。",
                vec![
                    "病害名称",
                    "病害描述(包括症状特征、发病规律和危害程度)",
                    "置信度(0-1之间的数值)",
                    TREATMENT_FORMAT,
                ],
            )
        };

        let format = items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {}", i + 1, item))
            .collect::<Vec<_>>()
            .join("\n");

        let user = format!("{intro}\n{plant_line}\n{env_block}\n\n请按以下格式回复:\n{format}");

        let mut prompt = Prompt::new(user).with_system(SYSTEM_PROMPT);
        if let Some(plant_type) = &self.plant_type {
            prompt = prompt.with_plant_type(plant_type.clone());
        }
        if let Some(environment) = &self.environment {
            prompt = prompt.with_environment(environment.clone());
        }
        prompt
    }
}
