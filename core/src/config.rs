use crate::errors::{GeminiError, GeminiResult};
use crate::prompt::default_system_prompt;
use crate::provider::GenerationSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-04-17";

/// Configuration struct for Gemini API
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub model_name: Option<String>,
    /// When unset, a dated default prompt is generated per request
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub thinking_budget: Option<u32>,
    pub search_grounding: Option<bool>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        let settings = GenerationSettings::default();
        Self {
            api_key: None,
            api_base_url: Some(DEFAULT_API_BASE_URL.to_string()),
            model_name: Some(DEFAULT_MODEL.to_string()),
            system_prompt: None,
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
            thinking_budget: settings.thinking_budget,
            search_grounding: Some(settings.search_grounding),
        }
    }
}

impl GeminiConfig {
    /// A config with every field unset, used as an override layer
    pub fn empty() -> Self {
        Self {
            api_key: None,
            api_base_url: None,
            model_name: None,
            system_prompt: None,
            temperature: None,
            max_output_tokens: None,
            thinking_budget: None,
            search_grounding: None,
        }
    }

    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> GeminiResult<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                GeminiError::ConfigError(format!("Failed to read config file: {}", e))
            })?;

            let config: Self = toml::from_str(&content).map_err(|e| {
                GeminiError::ConfigError(format!("Failed to parse config file: {}", e))
            })?;

            Ok(Self::default().merge(&config))
        } else {
            Ok(Self::default())
        }
    }

    /// Overrides taken from the process environment (and a `.env` file, if present)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|v| !v.is_empty()),
            model_name: std::env::var("GEMINI_MODEL").ok().filter(|v| !v.is_empty()),
            ..Self::empty()
        }
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            api_base_url: other
                .api_base_url
                .clone()
                .or_else(|| self.api_base_url.clone()),
            model_name: other.model_name.clone().or_else(|| self.model_name.clone()),
            system_prompt: other
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone()),
            temperature: other.temperature.or(self.temperature),
            max_output_tokens: other.max_output_tokens.or(self.max_output_tokens),
            thinking_budget: other.thinking_budget.or(self.thinking_budget),
            search_grounding: other.search_grounding.or(self.search_grounding),
        }
    }

    /// Sampling options sent with every generation call
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            thinking_budget: self.thinking_budget,
            search_grounding: self.search_grounding.unwrap_or(true),
        }
    }

    /// The configured system prompt, or the dated default
    pub fn system_instruction(&self) -> String {
        match &self.system_prompt {
            Some(prompt) if !prompt.trim().is_empty() => prompt.clone(),
            _ => default_system_prompt(chrono::Utc::now()),
        }
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> GeminiResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        GeminiError::ConfigError("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get a config file path inside the default config directory
pub fn get_default_config_file(app_name: &str, file_name: &str) -> GeminiResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join(file_name))
}
