use super::{AiAnalyst, AiAssessment, AiError, LlmSettings};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_MODEL: &str = "gpt-4";

/// Chat-completions client for the OpenAI-style endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiAnalyst {
    http: Client,
    url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiAnalyst {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!("OpenAI API key must be provided via PHISH_GUARD_API_KEY");
        }
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        let url = format!("{}/v1/chat/completions", base.trim_end_matches('/'));
        let mut builder = Client::builder()
            .user_agent("phish-guard/0.3")
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(30)));
        if let Some(proxy) = &settings.http_proxy {
            builder = builder.proxy(
                Proxy::http(proxy).with_context(|| format!("invalid HTTP proxy URL `{proxy}`"))?,
            );
        }
        if let Some(proxy) = &settings.https_proxy {
            builder = builder.proxy(
                Proxy::https(proxy)
                    .with_context(|| format!("invalid HTTPS proxy URL `{proxy}`"))?,
            );
        }
        let http = builder
            .build()
            .context("failed to build chat completions HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: settings.api_key.clone(),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_retries: settings.max_retries,
        })
    }
}

#[async_trait]
impl AiAnalyst for OpenAiAnalyst {
    async fn assess(&self, content: &str) -> Result<AiAssessment, AiError> {
        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(content),
                },
            ],
            temperature: 0.1,
            max_tokens: 500,
        };

        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(200);
        loop {
            let response = self
                .http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await;

            let response = match response {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(AiError::Transport(err.to_string()));
                    }
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                    attempt += 1;
                    continue;
                }
            };

            if !response.status().is_success() {
                if attempt >= self.max_retries {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(AiError::Transport(format!(
                        "chat completions API error ({status}): {body}"
                    )));
                }
                sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(5));
                attempt += 1;
                continue;
            }

            let chat: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|err| AiError::Transport(format!("unreadable response body: {err}")))?;
            let reply = chat
                .choices
                .into_iter()
                .find_map(|choice| choice.message.content)
                .ok_or_else(|| {
                    AiError::MalformedReply("response contained no message content".to_string())
                })?;

            return parse_assessment(&reply);
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

const SYSTEM_PROMPT: &str =
    "You are a cybersecurity expert. Provide analysis in valid JSON format only.";

const REQUIRED_FIELDS: [&str; 4] = ["risk_score", "threat_indicators", "reasoning", "confidence"];

fn build_prompt(content: &str) -> String {
    format!(
        r#"Analyze this email for phishing attempts. Provide analysis in the following JSON format:
{{
    "risk_score": (float between 0-1),
    "threat_indicators": [list of specific suspicious elements found],
    "reasoning": [list of detailed explanations],
    "confidence": (float between 0-1),
    "recommended_actions": [list of recommended user actions]
}}

Consider the following in your analysis:
1. Linguistic patterns and urgency
2. Technical indicators (links, headers)
3. Social engineering tactics
4. Credential harvesting attempts

Email content:
{content}"#
    )
}

/// Parse a model reply into a validated assessment. Strict JSON only; a
/// missing required field is reported separately from a parse failure but
/// both recover identically upstream.
fn parse_assessment(reply: &str) -> Result<AiAssessment, AiError> {
    let value: serde_json::Value =
        serde_json::from_str(reply).map_err(|err| AiError::MalformedReply(err.to_string()))?;
    for field in REQUIRED_FIELDS {
        if value.get(field).is_none() {
            return Err(AiError::IncompleteReply(field));
        }
    }
    let raw: RawAssessment =
        serde_json::from_value(value).map_err(|err| AiError::MalformedReply(err.to_string()))?;
    Ok(AiAssessment {
        risk_score: raw.risk_score,
        threat_indicators: raw.threat_indicators,
        reasoning: raw.reasoning,
        confidence: raw.confidence,
        recommended_actions: raw.recommended_actions.unwrap_or_default(),
    })
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct RawAssessment {
    risk_score: f32,
    threat_indicators: Vec<String>,
    reasoning: Vec<String>,
    confidence: f32,
    #[serde(default)]
    recommended_actions: Option<Vec<String>>,
}
