use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use super::common::{build_text_chat_body, parse_chat_content, send_chat_request};
use super::config::LmConfig;
use super::prompts::{EN_TO_RU_PROMPT, IMPROVE_PROMPT, RU_TO_EN_PROMPT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewriteMode {
    #[serde(rename = "ru2en")]
    RuToEn,
    #[serde(rename = "en2ru")]
    EnToRu,
    #[serde(rename = "improve")]
    Improve,
}

impl RewriteMode {
    pub fn system_prompt(self) -> &'static str {
        match self {
            RewriteMode::RuToEn => RU_TO_EN_PROMPT,
            RewriteMode::EnToRu => EN_TO_RU_PROMPT,
            RewriteMode::Improve => IMPROVE_PROMPT,
        }
    }
}

#[derive(Debug, Error)]
pub enum LmError {
    #[error("LM server returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("empty response from LM server")]
    EmptyResponse,

    #[error("LM request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed LM response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Rewrite `text` with the local model according to `mode`.
#[instrument(level = "trace", skip(client, config, text))]
pub async fn rewrite_text(
    client: &reqwest::Client,
    config: &LmConfig,
    mode: RewriteMode,
    text: &str,
) -> Result<String, LmError> {
    let body = build_text_chat_body(config, mode.system_prompt(), text);
    let raw = send_chat_request(client, config, &body).await?;
    parse_chat_content(&raw)?.ok_or(LmError::EmptyResponse)
}
