//! Query validation and normalization.
//!
//! The normalized form (lowercase, whitespace runs collapsed to one space)
//! is the dedup key for every lookup and write. The trimmed raw form is kept
//! for the activity log.

use crate::error::SearchError;

pub const MSG_QUERY_REQUIRED: &str = "Query is required";

/// A query that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    /// Trimmed, otherwise untouched user input.
    pub raw: String,
    /// Lowercased and whitespace-collapsed.
    pub normalized: String,
}

/// Inclusive character bounds on the normalized query.
#[derive(Debug, Clone, Copy)]
pub struct QueryBounds {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for QueryBounds {
    fn default() -> Self {
        Self {
            min_len: 2,
            max_len: 500,
        }
    }
}

pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn validate_query(raw: &str, bounds: QueryBounds) -> Result<ValidatedQuery, SearchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SearchError::InvalidInput(MSG_QUERY_REQUIRED.to_string()));
    }

    let normalized = normalize_query(trimmed);
    let len = normalized.chars().count();
    if len < bounds.min_len || len > bounds.max_len {
        return Err(SearchError::InvalidInput(format!(
            "Query must be between {} and {} characters",
            bounds.min_len, bounds.max_len
        )));
    }

    Ok(ValidatedQuery {
        raw: trimmed.to_string(),
        normalized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_and_lowercases() {
        assert_eq!(normalize_query("  Best \t  Laptop\nFor  Gaming "), "best laptop for gaming");
    }

    #[test]
    fn test_normalize_idempotent() {
        for q in ["Best   Laptop", "a b", "ÜBER  Straße", "  x\t\ty  "] {
            let once = normalize_query(q);
            assert_eq!(normalize_query(&once), once);
        }
    }

    #[test]
    fn test_empty_and_whitespace_rejected() {
        for q in ["", "   ", "\n\t"] {
            match validate_query(q, QueryBounds::default()) {
                Err(SearchError::InvalidInput(msg)) => assert_eq!(msg, MSG_QUERY_REQUIRED),
                other => panic!("expected InvalidInput, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_single_char_rejected() {
        let err = validate_query(" a ", QueryBounds::default()).unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Query must be between 2 and 500 characters");
    }

    #[test]
    fn test_bounds_inclusive() {
        assert!(validate_query("ab", QueryBounds::default()).is_ok());
        let max = "a".repeat(500);
        assert!(validate_query(&max, QueryBounds::default()).is_ok());
        let over = "a".repeat(501);
        assert!(validate_query(&over, QueryBounds::default()).is_err());
    }

    #[test]
    fn test_length_measured_after_collapse() {
        // 600 raw chars collapse to well under the limit.
        let spaced = format!("a{}b", " ".repeat(598));
        let v = validate_query(&spaced, QueryBounds::default()).unwrap();
        assert_eq!(v.normalized, "a b");
    }

    #[test]
    fn test_raw_is_trimmed_only() {
        let v = validate_query("  Best   Laptop ", QueryBounds::default()).unwrap();
        assert_eq!(v.raw, "Best   Laptop");
        assert_eq!(v.normalized, "best laptop");
    }
}
