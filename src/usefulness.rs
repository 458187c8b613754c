//! Usefulness Scoring
//!
//! Rates a candidate answer from 0 to 5. The engine admits a stage result only
//! when its score meets the skill's threshold.

use crate::response::ChatResponse;
use std::collections::HashSet;

/// Highest possible usefulness score
pub const MAX_USEFULNESS: f32 = 5.0;

/// Pluggable scorer used when a stage does not report its own usefulness
pub trait UsefulnessScorer: Send + Sync {
    fn score(&self, question: &str, response: &ChatResponse) -> f32;
}

/// Keyword/shape heuristic scorer
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer;

static STOPWORDS: &[&str] = &[
    "what", "whats", "how", "much", "many", "does", "have", "with", "this", "that", "your",
    "about", "from", "into", "when", "where", "which", "there", "their", "should", "would",
    "could", "tell", "show", "give", "please", "some",
];

impl HeuristicScorer {
    fn keywords(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .map(|w| w.to_lowercase())
            .filter(|w| w.len() > 3 && !STOPWORDS.contains(&w.as_str()))
            .collect()
    }
}

impl UsefulnessScorer for HeuristicScorer {
    fn score(&self, question: &str, response: &ChatResponse) -> f32 {
        let message = response.message.trim();
        if message.is_empty() {
            return 0.0;
        }

        let mut score: f32 = 1.0;

        if message.len() >= 40 {
            score += 1.0;
        }

        let asked = Self::keywords(question);
        if asked.is_empty() || !asked.is_disjoint(&Self::keywords(message)) {
            score += 1.0;
        }

        if !response.cards.is_empty() || message.chars().any(|c| c.is_ascii_digit()) {
            score += 1.0;
        }

        if !response.actions.is_empty() || response.details.is_some() {
            score += 1.0;
        }

        score.min(MAX_USEFULNESS)
    }
}
