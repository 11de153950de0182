use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod file_repository;
pub mod lexical;
pub mod scorer;

/// Byte span within the scanned text `(start, end)` where `start <= end`.
pub type Span = (usize, usize);

/// A single phishing trigger phrase together with the category it belongs to.
///
/// Phrases are stored lowercase; matching against email bodies is
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorEntry {
    /// Category the phrase belongs to (e.g. `urgency`, `credentials`).
    pub category: String,
    /// Literal substring that triggers the indicator.
    pub phrase: String,
}

impl IndicatorEntry {
    /// Construct a new entry, validating invariants before returning.
    pub fn new(
        category: impl Into<String>,
        phrase: impl Into<String>,
    ) -> Result<Self, IndicatorValidationError> {
        let entry = Self {
            category: category.into().trim().to_lowercase(),
            phrase: phrase.into().trim().to_lowercase(),
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Validate invariants for existing entries.
    pub fn validate(&self) -> Result<(), IndicatorValidationError> {
        if self.category.trim().is_empty() {
            return Err(IndicatorValidationError::EmptyCategory);
        }
        if self.phrase.trim().is_empty() {
            return Err(IndicatorValidationError::EmptyPhrase {
                category: self.category.clone(),
            });
        }
        Ok(())
    }
}

/// Errors emitted while validating indicator definitions.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorValidationError {
    #[error("indicator category must not be blank")]
    EmptyCategory,
    #[error("indicator phrase in category `{category}` must not be empty")]
    EmptyPhrase { category: String },
    #[error("duplicate indicator phrase `{phrase}` in category `{category}`")]
    DuplicatePhrase { category: String, phrase: String },
}

/// Immutable set of phishing indicator phrases grouped by category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorTable {
    entries: Vec<IndicatorEntry>,
}

impl IndicatorTable {
    /// Build a table from entries, rejecting blanks and duplicate
    /// (category, phrase) pairs.
    pub fn new(entries: Vec<IndicatorEntry>) -> Result<Self, IndicatorValidationError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            entry.validate()?;
            if !seen.insert((entry.category.clone(), entry.phrase.clone())) {
                return Err(IndicatorValidationError::DuplicatePhrase {
                    category: entry.category.clone(),
                    phrase: entry.phrase.clone(),
                });
            }
        }
        Ok(Self { entries })
    }

    /// The built-in phrase set covering the four stock categories.
    pub fn builtin() -> Self {
        let stock: &[(&str, &[&str])] = &[
            ("urgency", &["immediate action", "urgent", "act now"]),
            ("threats", &["account suspended", "security alert"]),
            (
                "requests",
                &["verify your account", "confirm your identity"],
            ),
            ("credentials", &["login", "password", "username"]),
        ];
        let entries = stock
            .iter()
            .flat_map(|(category, phrases)| {
                phrases.iter().map(|phrase| IndicatorEntry {
                    category: (*category).to_string(),
                    phrase: (*phrase).to_string(),
                })
            })
            .collect();
        // Stock entries are known-valid.
        Self { entries }
    }

    pub fn entries(&self) -> &[IndicatorEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A distinct indicator phrase found in an email body.
///
/// The span points at the first occurrence; repeated occurrences of the same
/// phrase do not produce additional matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorMatch {
    pub category: String,
    pub phrase: String,
    pub span: Span,
}

/// Weights applied when blending the heuristic and model scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Blend weight of the rule-based score.
    pub rule_weight: f32,
    /// Blend weight of the confidence-adjusted AI score.
    pub ai_weight: f32,
    /// Score added per distinct matched indicator phrase.
    pub match_increment: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rule_weight: 0.3,
            ai_weight: 0.7,
            match_increment: 0.2,
        }
    }
}

impl ScoringConfig {
    /// Validate invariants before the config is used for scoring.
    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        for (name, weight) in [("rule_weight", self.rule_weight), ("ai_weight", self.ai_weight)] {
            if !(0.0..=1.0).contains(&weight) || !weight.is_finite() {
                return Err(ScoringConfigError::InvalidWeight {
                    name: name.to_string(),
                    weight,
                });
            }
        }
        if !(self.match_increment > 0.0 && self.match_increment.is_finite()) {
            return Err(ScoringConfigError::InvalidIncrement {
                increment: self.match_increment,
            });
        }
        Ok(())
    }

    /// Weighted blend of the two sub-scores.
    pub fn combine(&self, rule_score: f32, ai_score: f32) -> f32 {
        self.rule_weight * rule_score + self.ai_weight * ai_score
    }
}

/// Validation errors for scoring configuration.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringConfigError {
    #[error("{name} must be within 0.0..=1.0 (got {weight})")]
    InvalidWeight { name: String, weight: f32 },
    #[error("match_increment must be > 0 (got {increment})")]
    InvalidIncrement { increment: f32 },
}

/// Structured assessment produced from a successful model reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub risk_score: f32,
    pub threat_indicators: Vec<String>,
    pub reasoning: Vec<String>,
    pub confidence: f32,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    /// `risk_score * confidence` for successful replies.
    pub adjusted_risk_score: f32,
    /// RFC 3339 timestamp stamped when the assessment was evaluated.
    pub timestamp: String,
    /// Identifier of the model that produced the assessment.
    pub model_version: String,
}

/// Flattened threat details surfaced alongside the full analysis record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatDetail {
    pub indicators: Vec<String>,
    pub reasoning: Vec<String>,
    pub actions: Vec<String>,
}

/// The AI half of a combined result: the confidence-adjusted score plus the
/// full analysis record it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiReport {
    pub risk_score: f32,
    pub analysis: AiAnalysis,
    pub detailed_threats: ThreatDetail,
}

/// End-to-end result of analyzing one email body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedResult {
    pub rule_based_score: f32,
    pub ai_analysis: AiReport,
    pub combined_risk: f32,
}

/// Abstraction over indicator loading so different backends (files, HTTP,
/// in-memory) can be swapped transparently.
#[async_trait]
pub trait IndicatorRepository: Send + Sync {
    /// Retrieve the full indicator set currently active.
    async fn load_indicators(&self) -> AnyResult<Vec<IndicatorEntry>>;
}
