//! Settings for the extraction pipeline and its OCR backend.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline-facing configuration sections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicConfig {
    #[serde(default = "default_ollama")]
    pub ollama: OllamaConfig,

    #[serde(default = "default_limits")]
    pub limits: LimitsConfig,

    #[serde(default = "default_pipeline")]
    pub pipeline: PipelineConfig,

    #[serde(default = "default_ui")]
    pub ui: UiConfig,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            ollama: default_ollama(),
            limits: default_limits(),
            pipeline: default_pipeline(),
            ui: default_ui(),
        }
    }
}

/// Ollama vision model used as the OCR backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Vision model that performs the Arabic OCR (e.g., llava, qwen2.5vl)
    #[serde(default = "default_ocr_model")]
    pub ocr_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl OllamaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_image_size")]
    pub max_image_size_bytes: u64,
}

/// Job trigger behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Start extraction (and export) as soon as an image is uploaded.
    /// When false, uploads are staged and wait for an explicit extract request.
    #[serde(default = "default_auto_extract")]
    pub auto_extract: bool,
}

/// User-facing message settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Locale for notices and error messages ("en" or "ar")
    #[serde(default = "default_locale")]
    pub locale: String,
}

// ==================== Default Value Functions ====================

fn default_ollama() -> OllamaConfig {
    OllamaConfig {
        base_url: default_ollama_url(),
        ocr_model: default_ocr_model(),
        temperature: default_temperature(),
        request_timeout_secs: default_request_timeout_secs(),
    }
}

fn default_limits() -> LimitsConfig {
    LimitsConfig {
        max_image_size_bytes: default_max_image_size(),
    }
}

fn default_pipeline() -> PipelineConfig {
    PipelineConfig {
        auto_extract: default_auto_extract(),
    }
}

fn default_ui() -> UiConfig {
    UiConfig {
        locale: default_locale(),
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ocr_model() -> String {
    "llava".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_image_size() -> u64 {
    20 * 1024 * 1024 // 20 MiB
}

fn default_auto_extract() -> bool {
    true
}

fn default_locale() -> String {
    "en".to_string()
}
