pub mod analyzer;
pub mod llm;
pub mod report;

pub use analyzer::{
    file_repository::FileIndicatorRepository, scorer::RiskScorer, AiAnalysis, AiReport,
    CombinedResult, IndicatorEntry, IndicatorMatch, IndicatorRepository, IndicatorTable,
    IndicatorValidationError, ScoringConfig, Span, ThreatDetail,
};
pub use llm::{AiAnalyst, AiAssessment, AiError, LlmSettings, NoopAnalyst, openai::OpenAiAnalyst};
