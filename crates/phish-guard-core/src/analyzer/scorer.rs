use std::sync::Arc;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use tracing::{debug, instrument, warn};

use super::lexical::LexicalScanner;
use super::{
    AiAnalysis, AiReport, CombinedResult, IndicatorMatch, IndicatorRepository, IndicatorTable,
    ScoringConfig, ThreatDetail,
};
use crate::llm::{AiAnalyst, AiError};

/// Stateless risk-scoring pipeline: lexical heuristic, model assessment,
/// weighted blend. Holds only the immutable indicator automaton, the model
/// client, and the blend weights, so concurrent `analyze` calls are safe.
pub struct RiskScorer {
    lexical: LexicalScanner,
    analyst: Arc<dyn AiAnalyst>,
    config: ScoringConfig,
}

impl std::fmt::Debug for RiskScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskScorer")
            .field("lexical", &"<LexicalScanner>")
            .field("analyst", &"<dyn AiAnalyst>")
            .field("config", &self.config)
            .finish()
    }
}

impl RiskScorer {
    pub fn new(table: &IndicatorTable, analyst: Arc<dyn AiAnalyst>) -> Result<Self> {
        Self::with_config(table, analyst, ScoringConfig::default())
    }

    pub fn with_config(
        table: &IndicatorTable,
        analyst: Arc<dyn AiAnalyst>,
        config: ScoringConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            lexical: LexicalScanner::new(table)?,
            analyst,
            config,
        })
    }

    /// Build a scorer whose indicator table comes from a repository backend.
    pub async fn from_repository<R: IndicatorRepository>(
        repo: &R,
        analyst: Arc<dyn AiAnalyst>,
    ) -> Result<Self> {
        let table = IndicatorTable::new(repo.load_indicators().await?)?;
        Self::new(&table, analyst)
    }

    /// Score one email body. Never fails: when the model path errors, the
    /// neutral fallback is substituted and the blend proceeds.
    #[instrument(name = "analyze_email", skip(self, content), fields(content_len = content.len()))]
    pub async fn analyze(&self, content: &str) -> CombinedResult {
        let rule_based_score = self.rule_score(content);
        let ai_analysis = match self.ai_report(content).await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "AI analysis failed; substituting neutral fallback");
                self.fallback_report()
            }
        };
        let combined_risk = self.config.combine(rule_based_score, ai_analysis.risk_score);
        debug!(%rule_based_score, ai_score = %ai_analysis.risk_score, %combined_risk, "analysis completed");
        CombinedResult {
            rule_based_score,
            ai_analysis,
            combined_risk,
        }
    }

    /// Deterministic heuristic score for `content`.
    pub fn rule_score(&self, content: &str) -> f32 {
        self.lexical.score(content, self.config.match_increment)
    }

    /// Distinct indicator phrases found in `content`, for explainability.
    pub fn indicator_matches(&self, content: &str) -> Vec<IndicatorMatch> {
        self.lexical.matches(content)
    }

    async fn ai_report(&self, content: &str) -> Result<AiReport, AiError> {
        let assessment = self.analyst.assess(content).await?;
        let risk_score = assessment.risk_score.clamp(0.0, 1.0);
        let adjusted_risk_score = risk_score * assessment.confidence;
        let analysis = AiAnalysis {
            risk_score,
            threat_indicators: assessment.threat_indicators,
            reasoning: assessment.reasoning,
            confidence: assessment.confidence,
            recommended_actions: assessment.recommended_actions,
            adjusted_risk_score,
            timestamp: now_rfc3339(),
            model_version: self.analyst.model_id().to_string(),
        };
        Ok(AiReport {
            risk_score: adjusted_risk_score,
            detailed_threats: ThreatDetail {
                indicators: analysis.threat_indicators.clone(),
                reasoning: analysis.reasoning.clone(),
                actions: analysis.recommended_actions.clone(),
            },
            analysis,
        })
    }

    /// Neutral stand-in used when the model path cannot produce an
    /// assessment: unknown is neither safe nor dangerous.
    fn fallback_report(&self) -> AiReport {
        AiReport {
            risk_score: 0.5,
            analysis: AiAnalysis {
                risk_score: 0.5,
                threat_indicators: vec!["Analysis failed - using fallback".to_string()],
                reasoning: vec!["AI analysis encountered an error".to_string()],
                confidence: 0.0,
                recommended_actions: Vec::new(),
                adjusted_risk_score: 0.5,
                timestamp: now_rfc3339(),
                model_version: self.analyst.model_id().to_string(),
            },
            detailed_threats: ThreatDetail {
                indicators: vec!["Analysis failed".to_string()],
                reasoning: vec!["Fallback analysis activated due to error".to_string()],
                actions: vec!["Please retry analysis or use alternative methods".to_string()],
            },
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::AiAssessment;
    use async_trait::async_trait;

    struct StubAnalyst {
        risk_score: f32,
        confidence: f32,
    }

    #[async_trait]
    impl AiAnalyst for StubAnalyst {
        async fn assess(&self, _content: &str) -> Result<AiAssessment, AiError> {
            Ok(AiAssessment {
                risk_score: self.risk_score,
                threat_indicators: vec!["suspicious link".into()],
                reasoning: vec!["asks for credentials".into()],
                confidence: self.confidence,
                recommended_actions: vec!["do not click".into()],
            })
        }

        fn model_id(&self) -> &str {
            "stub-model"
        }
    }

    struct FailingAnalyst;

    #[async_trait]
    impl AiAnalyst for FailingAnalyst {
        async fn assess(&self, _content: &str) -> Result<AiAssessment, AiError> {
            Err(AiError::MalformedReply("not json".into()))
        }

        fn model_id(&self) -> &str {
            "stub-model"
        }
    }

    fn scorer(analyst: Arc<dyn AiAnalyst>) -> RiskScorer {
        RiskScorer::new(&IndicatorTable::builtin(), analyst).unwrap()
    }

    #[tokio::test]
    async fn adjusted_score_scales_by_confidence() {
        let scorer = scorer(Arc::new(StubAnalyst {
            risk_score: 0.8,
            confidence: 0.5,
        }));
        let result = scorer.analyze("nothing suspicious here").await;
        assert!((result.ai_analysis.risk_score - 0.4).abs() < 1e-6);
        assert!((result.ai_analysis.analysis.adjusted_risk_score - 0.4).abs() < 1e-6);
        assert_eq!(result.ai_analysis.analysis.model_version, "stub-model");
        assert!(!result.ai_analysis.analysis.timestamp.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_model_score_is_clamped() {
        let scorer = scorer(Arc::new(StubAnalyst {
            risk_score: 3.0,
            confidence: 1.0,
        }));
        let result = scorer.analyze("hello").await;
        assert!((result.ai_analysis.analysis.risk_score - 1.0).abs() < f32::EPSILON);
        assert!((result.ai_analysis.risk_score - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn failed_analysis_degrades_to_neutral_fallback() {
        let scorer = scorer(Arc::new(FailingAnalyst));
        let result = scorer.analyze("hello").await;
        assert!((result.ai_analysis.risk_score - 0.5).abs() < f32::EPSILON);
        assert_eq!(result.ai_analysis.analysis.confidence, 0.0);
        assert_eq!(
            result.ai_analysis.detailed_threats.actions,
            vec!["Please retry analysis or use alternative methods".to_string()]
        );
        // 0.3 * 0.0 + 0.7 * 0.5
        assert!((result.combined_risk - 0.35).abs() < 1e-6);
    }

    #[tokio::test]
    async fn blend_arithmetic_is_exact() {
        let scorer = scorer(Arc::new(StubAnalyst {
            risk_score: 0.9,
            confidence: 0.9,
        }));
        let content = "Please verify your account immediately, your account will be suspended";
        // Only "verify your account" is a listed phrase.
        let result = scorer.analyze(content).await;
        assert!((result.rule_based_score - 0.2).abs() < 1e-6);
        assert!((result.ai_analysis.risk_score - 0.81).abs() < 1e-6);
        assert!((result.combined_risk - (0.3 * 0.2 + 0.7 * 0.81)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn detailed_threats_mirror_the_analysis_record() {
        let scorer = scorer(Arc::new(StubAnalyst {
            risk_score: 0.6,
            confidence: 1.0,
        }));
        let result = scorer.analyze("hello").await;
        let report = result.ai_analysis;
        assert_eq!(
            report.detailed_threats.indicators,
            report.analysis.threat_indicators
        );
        assert_eq!(report.detailed_threats.reasoning, report.analysis.reasoning);
        assert_eq!(
            report.detailed_threats.actions,
            report.analysis.recommended_actions
        );
    }

    struct StaticRepo {
        entries: Vec<crate::analyzer::IndicatorEntry>,
    }

    #[async_trait]
    impl IndicatorRepository for StaticRepo {
        async fn load_indicators(&self) -> anyhow::Result<Vec<crate::analyzer::IndicatorEntry>> {
            Ok(self.entries.clone())
        }
    }

    #[tokio::test]
    async fn from_repository_builds_the_table_once() {
        let repo = StaticRepo {
            entries: vec![crate::analyzer::IndicatorEntry::new("billing", "wire transfer").unwrap()],
        };
        let scorer = RiskScorer::from_repository(&repo, Arc::new(FailingAnalyst))
            .await
            .unwrap();
        assert!((scorer.rule_score("Wire Transfer requested") - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let config = ScoringConfig {
            match_increment: 0.0,
            ..ScoringConfig::default()
        };
        let err = RiskScorer::with_config(
            &IndicatorTable::builtin(),
            Arc::new(FailingAnalyst),
            config,
        )
        .expect_err("zero increment should fail");
        assert!(err.to_string().contains("match_increment"));
    }
}
