//! Scoring kernel
//!
//! Deterministic scores built the same way: independently capped positive
//! contributions plus penalty terms, clamped to `0..=100`. Missing optional
//! inputs contribute nothing.

mod opportunity;
mod relevance;
mod risk;

pub use opportunity::{opportunity_score, rank_opportunities, KeywordMetrics, KeywordOpportunity};
pub use relevance::{
    rank_candidates, relevance_score, LinkCandidate, LinkSource, RelevanceBreakdown, RelevanceScore,
};
pub use risk::{article_risk_level, risk_assessment, RiskAssessment, RiskSignals};

/// Upper bound of every score
pub const MAX_SCORE: i32 = 100;

/// Clamp a raw sum into the score range
pub fn clamp_score(raw: i64) -> i32 {
    raw.clamp(0, MAX_SCORE as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-15), 0);
        assert_eq!(clamp_score(42), 42);
        assert_eq!(clamp_score(130), 100);
    }
}
