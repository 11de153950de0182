mod settings;

pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

pub use settings::LlmSettings;

/// Raw, validated verdict extracted from a model reply, before the scorer
/// derives the confidence-adjusted score and stamps metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct AiAssessment {
    pub risk_score: f32,
    pub threat_indicators: Vec<String>,
    pub reasoning: Vec<String>,
    pub confidence: f32,
    pub recommended_actions: Vec<String>,
}

/// Failure modes of the model path. All of them are recovered by the scorer
/// substituting the neutral fallback; none escape `analyze`.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("transport failure calling the model endpoint: {0}")]
    Transport(String),
    #[error("model reply was not parseable as JSON: {0}")]
    MalformedReply(String),
    #[error("model reply missing required field `{0}`")]
    IncompleteReply(&'static str),
}

/// Client abstraction for obtaining a phishing assessment from a model.
#[async_trait]
pub trait AiAnalyst: Send + Sync {
    /// Assess one email body. Implementations return raw verdict data; the
    /// scorer owns clamping, adjustment, and timestamps.
    async fn assess(&self, content: &str) -> Result<AiAssessment, AiError>;

    /// Identifier recorded as `model_version` in produced analyses.
    fn model_id(&self) -> &str;
}

/// Stand-in for offline runs: reports the model path as unavailable so the
/// scorer lands on its neutral fallback without any network call.
#[derive(Debug, Default, Clone)]
pub struct NoopAnalyst;

#[async_trait]
impl AiAnalyst for NoopAnalyst {
    async fn assess(&self, _content: &str) -> Result<AiAssessment, AiError> {
        Err(AiError::Transport(
            "AI analysis disabled; no model endpoint configured".to_string(),
        ))
    }

    fn model_id(&self) -> &str {
        "offline"
    }
}
