use crate::db::Settings;

/// Model used when the settings do not name one.
pub const DEFAULT_MODEL: &str = "local-model";

/// Connection and sampling parameters for the local LLM server.
#[derive(Debug, Clone, PartialEq)]
pub struct LmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
}

impl LmConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_url: settings.lm_base_url.clone(),
            api_key: settings.lm_api_key.clone(),
            model: settings
                .lm_model
                .clone()
                .filter(|model| !model.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: settings.lm_use_temperature.then_some(settings.lm_temperature),
            top_p: settings.lm_use_top_p.then_some(settings.lm_top_p),
            top_k: settings.lm_use_top_k.then_some(settings.lm_top_k),
        }
    }

    /// OpenAI-compatible chat completions endpoint under `base_url`.
    pub fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
