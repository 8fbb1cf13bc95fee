//! Keyword opportunity ranking

use super::clamp_score;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Research metrics for one keyword. Missing metrics contribute nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct KeywordMetrics {
    #[validate(length(min = 1, max = 200))]
    pub keyword: String,

    pub search_volume: Option<u64>,

    /// 0 (easy) to 100 (hard)
    #[validate(range(min = 0.0, max = 100.0))]
    pub keyword_difficulty: Option<f64>,

    /// 0 (none) to 1 (saturated)
    #[validate(range(min = 0.0, max = 1.0))]
    pub competition_level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordOpportunity {
    #[serde(flatten)]
    pub metrics: KeywordMetrics,
    pub opportunity_score: i32,
}

fn volume_tier(volume: u64) -> i64 {
    match volume {
        v if v >= 10_000 => 40,
        v if v >= 5_000 => 35,
        v if v >= 1_000 => 30,
        v if v >= 500 => 20,
        v if v >= 100 => 10,
        _ => 0,
    }
}

pub fn opportunity_score(metrics: &KeywordMetrics) -> i32 {
    let volume = metrics.search_volume.map_or(0, volume_tier);
    let difficulty = metrics
        .keyword_difficulty
        .map_or(0, |d| ((100.0 - d) * 0.4).round() as i64);
    let competition = metrics
        .competition_level
        .map_or(0, |c| ((1.0 - c) * 20.0).round() as i64);

    clamp_score(volume + difficulty + competition)
}

/// Highest opportunity first; ties keep input order
pub fn rank_opportunities(keywords: Vec<KeywordMetrics>) -> Vec<KeywordOpportunity> {
    let mut ranked: Vec<KeywordOpportunity> = keywords
        .into_iter()
        .map(|metrics| KeywordOpportunity {
            opportunity_score: opportunity_score(&metrics),
            metrics,
        })
        .collect();
    ranked.sort_by(|a, b| b.opportunity_score.cmp(&a.opportunity_score));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(volume: Option<u64>, difficulty: Option<f64>, competition: Option<f64>) -> KeywordMetrics {
        KeywordMetrics {
            keyword: "rust async".into(),
            search_volume: volume,
            keyword_difficulty: difficulty,
            competition_level: competition,
        }
    }

    #[test]
    fn test_best_case_is_100() {
        assert_eq!(opportunity_score(&metrics(Some(10_000), Some(0.0), Some(0.0))), 100);
    }

    #[test]
    fn test_tiers_and_rounding() {
        // 30 + round(55 * 0.4 = 22) + round(0.35 * 20 = 7)
        assert_eq!(opportunity_score(&metrics(Some(1_200), Some(45.0), Some(0.65))), 59);
        assert_eq!(opportunity_score(&metrics(Some(99), Some(100.0), Some(1.0))), 0);
        assert_eq!(opportunity_score(&metrics(Some(500), None, None)), 20);
        assert_eq!(opportunity_score(&metrics(None, None, None)), 0);
    }

    #[test]
    fn test_out_of_range_inputs_still_clamp() {
        assert_eq!(opportunity_score(&metrics(Some(50_000), Some(-50.0), Some(-1.0))), 100);
        assert_eq!(opportunity_score(&metrics(None, Some(400.0), None)), 0);
        assert!(metrics(None, Some(400.0), None).validate().is_err());
    }

    #[test]
    fn test_rank_orders_descending() {
        let ranked = rank_opportunities(vec![
            metrics(Some(100), Some(90.0), Some(0.9)),
            metrics(Some(10_000), Some(10.0), Some(0.1)),
        ]);
        assert!(ranked[0].opportunity_score > ranked[1].opportunity_score);
        assert_eq!(ranked[0].metrics.search_volume, Some(10_000));
    }
}
