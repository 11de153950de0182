use aho_corasick::AhoCorasick;
use anyhow::{Context, Result};
use tracing::trace;

use super::{IndicatorEntry, IndicatorMatch, IndicatorTable};

/// Literal-substring matcher over an indicator table.
///
/// The automaton is compiled once per table and matches case-insensitively.
/// Each phrase contributes at most one match per scan regardless of how many
/// times it occurs in the body.
pub struct LexicalScanner {
    automaton: Option<AhoCorasick>,
    entries: Vec<IndicatorEntry>,
}

impl LexicalScanner {
    pub fn new(table: &IndicatorTable) -> Result<Self> {
        let entries = table.entries().to_vec();
        let automaton = if entries.is_empty() {
            None
        } else {
            let patterns: Vec<_> = entries.iter().map(|entry| entry.phrase.clone()).collect();
            Some(
                AhoCorasick::builder()
                    .ascii_case_insensitive(true)
                    .build(patterns)
                    .context("failed to build indicator automaton from table")?,
            )
        };
        Ok(Self { automaton, entries })
    }

    /// Distinct indicator phrases present in `content`, each reported at its
    /// first occurrence, ordered by position.
    pub fn matches(&self, content: &str) -> Vec<IndicatorMatch> {
        let Some(automaton) = &self.automaton else {
            return Vec::new();
        };
        let mut first_span = vec![None; self.entries.len()];
        for mat in automaton.find_overlapping_iter(content) {
            let idx = mat.pattern().as_usize();
            if first_span[idx].is_none() {
                first_span[idx] = Some((mat.start(), mat.end()));
            }
        }
        let mut matches: Vec<_> = self
            .entries
            .iter()
            .zip(first_span)
            .filter_map(|(entry, span)| {
                span.map(|span| IndicatorMatch {
                    category: entry.category.clone(),
                    phrase: entry.phrase.clone(),
                    span,
                })
            })
            .collect();
        matches.sort_by_key(|m| m.span.0);
        trace!(matches = matches.len(), "lexical scan completed");
        matches
    }

    /// Deterministic rule-based score: `increment` per distinct matched
    /// phrase, clamped to 1.0.
    pub fn score(&self, content: &str, increment: f32) -> f32 {
        let hits = self.matches(content).len() as f32;
        (hits * increment).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scanner() -> LexicalScanner {
        LexicalScanner::new(&IndicatorTable::builtin()).unwrap()
    }

    #[test]
    fn clean_content_scores_zero() {
        let scanner = scanner();
        assert_eq!(scanner.score("Lunch at noon on Thursday?", 0.2), 0.0);
        assert_eq!(scanner.score("", 0.2), 0.0);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let scanner = scanner();
        assert_eq!(scanner.score("URGENT", 0.2), scanner.score("urgent", 0.2));
        assert!((scanner.score("URGENT", 0.2) - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn repeated_phrase_counts_once() {
        let scanner = scanner();
        let score = scanner.score("urgent urgent urgent", 0.2);
        assert!((score - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn many_matches_clamp_to_one() {
        let scanner = scanner();
        let content =
            "urgent act now immediate action login password username verify your account \
             confirm your identity account suspended security alert";
        assert_eq!(scanner.score(content, 0.2), 1.0);
    }

    #[test]
    fn score_is_order_independent() {
        let mut reversed: Vec<_> = IndicatorTable::builtin().entries().to_vec();
        reversed.reverse();
        let forward = scanner();
        let backward = LexicalScanner::new(&IndicatorTable::new(reversed).unwrap()).unwrap();
        let content = "urgent: please verify your account and enter your password";
        assert_eq!(
            forward.score(content, 0.2),
            backward.score(content, 0.2)
        );
    }

    #[test]
    fn match_spans_point_at_first_occurrence() {
        let scanner = scanner();
        let content = "login here, then login again";
        let matches = scanner.matches(content);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].phrase, "login");
        assert_eq!(matches[0].span, (0, 5));
    }

    #[test]
    fn overlapping_phrases_each_match() {
        // "immediate action" also begins a longer phrase; both distinct
        // phrases must be found when present.
        let scanner = scanner();
        let matches = scanner.matches("take immediate action and act now");
        let phrases: Vec<_> = matches.iter().map(|m| m.phrase.as_str()).collect();
        assert_eq!(phrases, vec!["immediate action", "act now"]);
    }

    proptest! {
        #[test]
        fn score_stays_within_unit_interval(content in ".{0,400}") {
            let scanner = scanner();
            let score = scanner.score(&content, 0.2);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn score_is_idempotent(content in ".{0,200}") {
            let scanner = scanner();
            prop_assert_eq!(
                scanner.score(&content, 0.2),
                scanner.score(&content, 0.2)
            );
        }
    }
}
