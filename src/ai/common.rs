use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use super::config::LmConfig;
use super::lm::LmError;

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageContent>,
}

#[derive(Deserialize)]
struct ChatMessageContent {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
}

/// Chat body with a system prompt and one user message.
pub fn build_text_chat_body(config: &LmConfig, system_prompt: &str, text: &str) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system",
                content: system_prompt.to_string(),
            },
            ChatMessage {
                role: "user",
                content: text.to_string(),
            },
        ],
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: config.top_k,
    }
}

/// Extract the trimmed content of the first choice, if any.
pub fn parse_chat_content(raw: &str) -> Result<Option<String>, LmError> {
    let chat: ChatResponse = serde_json::from_str(raw)?;
    Ok(chat
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty()))
}

#[instrument(level = "trace", skip(client, config, body))]
pub async fn send_chat_request(
    client: &reqwest::Client,
    config: &LmConfig,
    body: &ChatRequest,
) -> Result<String, LmError> {
    let url = config.chat_url();
    debug!(url = %url, model = %body.model, "sending chat completion request");

    let resp = client
        .post(&url)
        .bearer_auth(&config.api_key)
        .json(body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let err_text = resp.text().await.unwrap_or_default();
        warn!(%status, "LM server error");
        return Err(LmError::Upstream {
            status: status.as_u16(),
            body: err_text,
        });
    }

    let raw = resp.text().await?;
    let snippet: String = raw.chars().take(200).collect();
    debug!(snippet = %snippet, "chat response body");
    trace!(raw = %raw, "chat response");
    Ok(raw)
}
