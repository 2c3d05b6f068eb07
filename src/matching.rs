//! Selection policy for fuzzy ("similar page") matches.
//!
//! The store narrows candidates with bidirectional substring containment;
//! the policy then decides which of them, if any, is close enough to reuse.
//! The default `substring` strategy accepts every candidate, so the most
//! viewed one wins.

use std::collections::HashSet;

use crate::config::SimilarityConfig;
use crate::models::PageMatch;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchStrategy {
    Substring,
    /// Jaccard overlap of whitespace tokens must reach the threshold.
    TokenOverlap { min_overlap: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityPolicy {
    pub strategy: MatchStrategy,
    pub min_query_chars: usize,
}

impl Default for SimilarityPolicy {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::Substring,
            min_query_chars: 0,
        }
    }
}

impl SimilarityPolicy {
    pub fn from_config(config: &SimilarityConfig) -> Self {
        let strategy = match config.strategy.as_str() {
            "token_overlap" => MatchStrategy::TokenOverlap {
                min_overlap: config.min_token_overlap,
            },
            _ => MatchStrategy::Substring,
        };
        Self {
            strategy,
            min_query_chars: config.min_query_chars,
        }
    }

    /// Whether fuzzy matching should run at all for this query.
    pub fn applies_to(&self, normalized_query: &str) -> bool {
        normalized_query.chars().count() >= self.min_query_chars
    }

    pub fn accepts(&self, normalized_query: &str, candidate_query: &str) -> bool {
        match self.strategy {
            MatchStrategy::Substring => true,
            MatchStrategy::TokenOverlap { min_overlap } => {
                token_overlap(normalized_query, candidate_query) >= min_overlap
            }
        }
    }

    /// First accepted candidate. Candidates arrive most-viewed first.
    pub fn select<'a>(
        &self,
        normalized_query: &str,
        candidates: &'a [PageMatch],
    ) -> Option<&'a PageMatch> {
        if !self.applies_to(normalized_query) {
            return None;
        }
        candidates
            .iter()
            .find(|c| self.accepts(normalized_query, &c.search_query.to_lowercase()))
    }
}

/// Jaccard similarity of the two queries' whitespace-separated token sets.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() && tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count() as f64;
    let union = ta.union(&tb).count() as f64;
    inter / union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, query: &str, views: i64) -> PageMatch {
        PageMatch {
            id,
            search_query: query.to_string(),
            relevance_score: 0.0,
            view_count: views,
            last_scan_date: 0,
        }
    }

    #[test]
    fn test_substring_takes_first_candidate() {
        let policy = SimilarityPolicy::default();
        let candidates = vec![candidate(7, "laptop", 40), candidate(3, "gaming laptop", 2)];
        let chosen = policy.select("best laptop for gaming", &candidates).unwrap();
        assert_eq!(chosen.id, 7);
    }

    #[test]
    fn test_no_candidates() {
        assert!(SimilarityPolicy::default().select("anything", &[]).is_none());
    }

    #[test]
    fn test_token_overlap_values() {
        assert!((token_overlap("best laptop", "laptop") - 0.5).abs() < 1e-9);
        assert!((token_overlap("a b", "a b") - 1.0).abs() < 1e-9);
        assert_eq!(token_overlap("", ""), 0.0);
    }

    #[test]
    fn test_token_overlap_filters_short_substrings() {
        let policy = SimilarityPolicy {
            strategy: MatchStrategy::TokenOverlap { min_overlap: 0.5 },
            min_query_chars: 0,
        };
        // "ai" is a substring of "mountain biking" but shares no token.
        let candidates = vec![candidate(1, "mountain biking", 99), candidate(2, "ai", 1)];
        let chosen = policy.select("ai", &candidates).unwrap();
        assert_eq!(chosen.id, 2);
    }

    #[test]
    fn test_min_query_chars_disables_fuzzy() {
        let policy = SimilarityPolicy {
            strategy: MatchStrategy::Substring,
            min_query_chars: 4,
        };
        let candidates = vec![candidate(1, "rust programming", 5)];
        assert!(policy.select("ru", &candidates).is_none());
        assert!(policy.select("rust", &candidates).is_some());
    }

    #[test]
    fn test_from_config() {
        let config = SimilarityConfig {
            strategy: "token_overlap".to_string(),
            min_token_overlap: 0.7,
            min_query_chars: 3,
        };
        let policy = SimilarityPolicy::from_config(&config);
        assert_eq!(policy.strategy, MatchStrategy::TokenOverlap { min_overlap: 0.7 });
        assert_eq!(policy.min_query_chars, 3);
    }
}
