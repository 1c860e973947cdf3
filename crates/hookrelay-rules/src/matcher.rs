//! Hierarchical event key matching
//!
//! Event keys and rule patterns are dot-segmented (`player.break.block`).
//! A pattern segment is either a literal or the `*` wildcard, and a pattern
//! matches any key it is a segment-wise prefix of: `player.join` matches
//! `player.join.extra`. Specificity tie-breaking is driven entirely by the
//! pattern, not by how much of the key it covers.

/// Wildcard segment matching any single key segment
pub const WILDCARD: &str = "*";

/// Whether `pattern` matches `key`.
///
/// True iff the pattern has no more segments than the key and every pattern
/// segment is the wildcard or equals the key segment at the same index
/// (case-sensitive). Key segments beyond the pattern's length are ignored.
pub fn matches(pattern: &str, key: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('.').collect();
    let key_parts: Vec<&str> = key.split('.').collect();
    if pattern_parts.len() > key_parts.len() {
        return false;
    }
    pattern_parts
        .iter()
        .zip(key_parts.iter())
        .all(|(p, k)| *p == WILDCARD || p == k)
}

/// Score `pattern` against `key`, or [`MatchScore::NO_MATCH`].
pub fn score(pattern: &str, key: &str) -> MatchScore {
    if !matches(pattern, key) {
        return MatchScore::NO_MATCH;
    }
    let mut depth = 0;
    let mut specificity = 0;
    for part in pattern.split('.') {
        depth += 1;
        if part != WILDCARD {
            specificity += 1;
        }
    }
    MatchScore { depth, specificity }
}

/// Match quality of a pattern against a key.
///
/// `depth` counts the pattern's segments, `specificity` its non-wildcard
/// segments. Greater depth wins outright; specificity only breaks depth
/// ties. This ordering governs every tie-break in rule resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchScore {
    /// Number of segments in the pattern
    pub depth: i32,

    /// Number of non-wildcard segments in the pattern
    pub specificity: i32,
}

impl MatchScore {
    /// Sentinel strictly worse than any real score
    pub const NO_MATCH: MatchScore = MatchScore {
        depth: -1,
        specificity: -1,
    };

    /// Whether this score beats `other`
    pub fn is_better_than(&self, other: MatchScore) -> bool {
        if self.depth != other.depth {
            return self.depth > other.depth;
        }
        self.specificity > other.specificity
    }

    /// Whether this is a real match
    pub fn is_match(&self) -> bool {
        self.depth >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches("player.join", "player.join"));
    }

    #[test]
    fn test_exact_mismatch() {
        assert!(!matches("player.join", "player.quit"));
    }

    #[test]
    fn test_pattern_longer_than_key() {
        assert!(!matches("player.join.extra", "player.join"));
    }

    #[test]
    fn test_prefix_match_on_longer_key() {
        assert!(matches("player.join", "player.join.extra"));
    }

    #[test]
    fn test_wildcard_single_segment() {
        assert!(matches("player.*", "player.join"));
        assert!(matches("player.*", "player.quit"));
        assert!(!matches("player.*", "entity.damage"));
    }

    #[test]
    fn test_wildcard_multiple_segments() {
        assert!(matches("player.*.*", "player.break.block"));
        assert!(matches("*.damage.*", "entity.damage.player"));
    }

    #[test]
    fn test_wildcard_mid_pattern() {
        assert!(matches("player.*.block", "player.break.block"));
        assert!(!matches("player.*.block", "player.break.chest"));
    }

    #[test]
    fn test_case_sensitive_segments() {
        assert!(!matches("Player.join", "player.join"));
    }

    #[test]
    fn test_score_no_match() {
        assert_eq!(score("player.quit", "player.join"), MatchScore::NO_MATCH);
        assert!(!MatchScore::NO_MATCH.is_match());
    }

    #[test]
    fn test_score_exact_match() {
        let s = score("player.join", "player.join");
        assert_eq!(s.depth, 2);
        assert_eq!(s.specificity, 2);
        assert!(s.is_match());
    }

    #[test]
    fn test_score_wildcard_lowers_specificity() {
        let exact = score("player.join", "player.join");
        let wildcard = score("player.*", "player.join");
        assert_eq!(wildcard.depth, 2);
        assert_eq!(wildcard.specificity, 1);
        assert!(exact.is_better_than(wildcard));
    }

    #[test]
    fn test_depth_counts_pattern_not_key() {
        // The key has three segments; the pattern's depth is still two.
        let s = score("player.join", "player.join.extra");
        assert_eq!(s.depth, 2);
    }

    #[test]
    fn test_deeper_beats_shallower_regardless_of_specificity() {
        let deep_wildcard = score("player.*.block", "player.break.block");
        let shallow_exact = score("player.break", "player.break.block");
        assert_eq!(deep_wildcard.depth, 3);
        assert_eq!(shallow_exact.depth, 2);
        assert_eq!(deep_wildcard.specificity, shallow_exact.specificity);
        assert!(deep_wildcard.is_better_than(shallow_exact));
    }

    #[test]
    fn test_no_match_loses_to_everything() {
        let s = score("*", "anything");
        assert!(s.is_better_than(MatchScore::NO_MATCH));
        assert!(!MatchScore::NO_MATCH.is_better_than(s));
        assert!(!MatchScore::NO_MATCH.is_better_than(MatchScore::NO_MATCH));
    }
}
