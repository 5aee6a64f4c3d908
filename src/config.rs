use crate::error::{PlantDiagError, Result};
use crate::invokers::InvokeOptions;
use dialoguer::{Input, Password};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

pub const QWEN_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const TAICHU_BASE_URL: &str = "https://ai-maas.wair.ac.cn/maas/v1";
pub const CHATGLM_BASE_URL: &str = "https://chatglm.cn/chatglm/assistant-api/v1";
pub const LOCAL_SERVICE_URL: &str = "http://localhost:3001/api";

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("Invalid env var regex pattern")
});

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub qwen: Option<ChatEndpointConfig>,
    pub taichu: Option<ChatEndpointConfig>,
    pub chatglm: Option<ChatGlmConfig>,
    pub local_service: Option<LocalServiceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Models used when none are given on the command line
    #[serde(default = "default_models")]
    pub models: Vec<String>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_models() -> Vec<String> {
    vec!["qwen".into()]
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_timeout_ms(),
            models: default_models(),
        }
    }
}

impl AnalysisConfig {
    pub fn invoke_options(&self) -> InvokeOptions {
        InvokeOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_ms: self.timeout_ms,
        }
    }
}

/// An OpenAI-compatible `chat/completions` endpoint.
#[derive(Clone, Deserialize, Serialize)]
pub struct ChatEndpointConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Model used for the text-extraction variant, if the vendor has one
    #[serde(default)]
    pub ocr_model: Option<String>,
    /// Send the system prompt as a top-level `system_prompt` field
    #[serde(default)]
    pub send_system_prompt: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl std::fmt::Debug for ChatEndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEndpointConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("ocr_model", &self.ocr_model)
            .field("send_system_prompt", &self.send_system_prompt)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl ChatEndpointConfig {
    pub fn qwen(api_key: impl Into<String>) -> Self {
        Self {
            base_url: QWEN_BASE_URL.into(),
            api_key: api_key.into(),
            model: "qwen-vl-plus".into(),
            ocr_model: Some("qwen-vl-ocr".into()),
            send_system_prompt: false,
            enabled: true,
        }
    }

    pub fn taichu(api_key: impl Into<String>) -> Self {
        Self {
            base_url: TAICHU_BASE_URL.into(),
            api_key: api_key.into(),
            model: "taichu_vl".into(),
            ocr_model: None,
            send_system_prompt: true,
            enabled: true,
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct ChatGlmConfig {
    #[serde(default = "default_chatglm_url")]
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub assistant_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_chatglm_url() -> String {
    CHATGLM_BASE_URL.into()
}

impl std::fmt::Debug for ChatGlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatGlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("assistant_id", &self.assistant_id)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct LocalServiceConfig {
    #[serde(default = "default_local_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_local_url() -> String {
    LOCAL_SERVICE_URL.into()
}

impl std::fmt::Debug for LocalServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalServiceConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl Config {
    pub fn load(config_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p,
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            return Err(PlantDiagError::Config(format!(
                "Config file not found at {:?}. Run `plantdiag init` to set up.",
                config_path
            )));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| PlantDiagError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&config_str)
    }

    /// Parse YAML after `${VAR}` substitution.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let content = Self::substitute_env_vars(content);

        serde_yaml::from_str(&content)
            .map_err(|e| PlantDiagError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Search for config.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("plantdiag").join("config.yaml");
            if xdg_config.exists() {
                return Ok(xdg_config);
            }
        }

        Self::default_config_path()
    }

    /// Returns true if a config file can be found in any standard location.
    pub fn exists(config_override: Option<&PathBuf>) -> bool {
        match config_override {
            Some(p) => p.exists(),
            None => Self::find_config_path()
                .map(|p| p.exists())
                .unwrap_or(false),
        }
    }

    /// Default path for writing new config files (~/.config/plantdiag/config.yaml).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| PlantDiagError::Config("Cannot determine config directory".into()))?
            .join("plantdiag");
        Ok(config_dir.join("config.yaml"))
    }

    /// Names of the models that have an enabled section, in registry order.
    pub fn enabled_models(&self) -> Vec<&'static str> {
        let mut models = Vec::new();
        if let Some(qwen) = self.qwen.as_ref().filter(|c| c.enabled) {
            models.push("qwen");
            if qwen.ocr_model.is_some() {
                models.push("qwen-ocr");
            }
        }
        if self.taichu.as_ref().is_some_and(|c| c.enabled) {
            models.push("taichu");
        }
        if self.chatglm.as_ref().is_some_and(|c| c.enabled) {
            models.push("chatglm");
        }
        if self.local_service.as_ref().is_some_and(|c| c.enabled) {
            models.push("local");
        }
        models
    }

    /// Run interactive setup prompts and write config to disk.
    /// Returns the loaded Config and the path it was written to.
    pub fn setup_interactive() -> Result<(Self, PathBuf)> {
        println!();
        println!("Let's set up plantdiag!");
        println!("Leave an API key blank to skip that model.");
        println!();

        println!("Qwen-VL (DashScope)");
        let qwen_key = prompt_secret("  API key")?;
        let qwen = (!qwen_key.is_empty()).then(|| ChatEndpointConfig::qwen(qwen_key));
        println!();

        println!("Taichu-VL");
        let taichu_key = prompt_secret("  API key")?;
        let taichu = (!taichu_key.is_empty()).then(|| ChatEndpointConfig::taichu(taichu_key));
        println!();

        println!("ChatGLM assistant");
        let glm_key = prompt_secret("  API key")?;
        let chatglm = if glm_key.is_empty() {
            None
        } else {
            let api_secret = prompt_secret("  API secret")?;
            let assistant_id: String = Input::new()
                .with_prompt("  Assistant id")
                .interact_text()
                .map_err(|e| PlantDiagError::Config(format!("Input error: {}", e)))?;
            Some(ChatGlmConfig {
                base_url: default_chatglm_url(),
                api_key: glm_key,
                api_secret,
                assistant_id,
                enabled: true,
            })
        };
        println!();

        println!("Local diagnosis service (leave URL blank to skip)");
        let local_url: String = Input::new()
            .with_prompt("  URL")
            .default(String::new())
            .allow_empty(true)
            .interact_text()
            .map_err(|e| PlantDiagError::Config(format!("Input error: {}", e)))?;
        let local_service = if local_url.is_empty() {
            None
        } else {
            let api_key = prompt_secret("  API key")?;
            Some(LocalServiceConfig {
                url: local_url,
                api_key,
                enabled: true,
            })
        };
        println!();

        let timeout_ms: u64 = Input::new()
            .with_prompt("Overall timeout (ms)")
            .default(default_timeout_ms())
            .interact_text()
            .map_err(|e| PlantDiagError::Config(format!("Input error: {}", e)))?;

        let mut config = Config {
            analysis: AnalysisConfig {
                timeout_ms,
                ..AnalysisConfig::default()
            },
            qwen,
            taichu,
            chatglm,
            local_service,
        };
        let enabled: Vec<String> = config
            .enabled_models()
            .into_iter()
            .filter(|m| *m != "qwen-ocr")
            .map(String::from)
            .collect();
        if !enabled.is_empty() {
            config.analysis.models = enabled;
        }

        let config_path = Self::default_config_path()?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| PlantDiagError::Config(format!("Failed to serialize config: {}", e)))?;

        let content = format!(
            "# plantdiag configuration\n# Generated by `plantdiag init`\n# Environment variable substitution (${{VAR}}) is supported.\n\n{}",
            yaml
        );
        std::fs::write(&config_path, content)?;

        println!("Configuration saved to {}", config_path.display());
        println!();

        Ok((config, config_path))
    }

    fn substitute_env_vars(content: &str) -> String {
        let mut result = content.to_string();

        for cap in ENV_VAR.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        result
    }
}

fn prompt_secret(prompt: &str) -> Result<String> {
    Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .map_err(|e| PlantDiagError::Config(format!("Input error: {}", e)))
}
