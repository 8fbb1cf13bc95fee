//! Publication risk aggregation

use super::clamp_score;
use crate::db::models::{Article, RiskLevel};
use serde::{Deserialize, Serialize};

/// Inputs to the risk score, all optional except the banned-phrase count
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSignals {
    pub quality_score: Option<i32>,
    pub readability_score: Option<i32>,
    pub seo_score: Option<i32>,
    /// Higher means more detectable as machine-written
    pub human_score: Option<i32>,
    pub banned_phrase_hits: i32,
}

impl From<&Article> for RiskSignals {
    fn from(article: &Article) -> Self {
        Self {
            quality_score: article.quality_score,
            readability_score: article.readability_score,
            seo_score: article.seo_score,
            human_score: article.human_score,
            banned_phrase_hits: article.banned_phrase_hits,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: i32,
    pub level: RiskLevel,
    /// Human-readable contributing factors
    pub factors: Vec<String>,
}

fn level_for(score: i32) -> RiskLevel {
    match score {
        s if s >= 75 => RiskLevel::Critical,
        s if s >= 50 => RiskLevel::High,
        s if s >= 25 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

pub fn risk_assessment(signals: &RiskSignals) -> RiskAssessment {
    let mut raw: i64 = 0;
    let mut factors = Vec::new();

    let detectability = match signals.human_score {
        Some(h) if h > 70 => 40,
        Some(h) if h > 50 => 25,
        Some(h) if h > 30 => 10,
        _ => 0,
    };
    if detectability > 0 {
        factors.push(format!("AI-detectability score {}", signals.human_score.unwrap_or_default()));
    }
    raw += detectability;

    match signals.quality_score {
        None => {
            raw += 20;
            factors.push("quality not assessed".to_string());
        }
        Some(q) if q < 50 => {
            raw += 30;
            factors.push(format!("low quality score {}", q));
        }
        Some(q) if q < 70 => {
            raw += 15;
            factors.push(format!("moderate quality score {}", q));
        }
        Some(_) => {}
    }

    if signals.banned_phrase_hits > 0 {
        raw += i64::from(signals.banned_phrase_hits.saturating_mul(15).min(30));
        factors.push(format!("{} banned phrase(s)", signals.banned_phrase_hits));
    }

    if let Some(r) = signals.readability_score.filter(|r| *r < 40) {
        raw += 10;
        factors.push(format!("poor readability {}", r));
    }

    if let Some(s) = signals.seo_score.filter(|s| *s < 40) {
        raw += 5;
        factors.push(format!("weak SEO {}", s));
    }

    let score = clamp_score(raw);
    RiskAssessment {
        score,
        level: level_for(score),
        factors,
    }
}

/// Stored assessment wins; otherwise it is computed from the scores
pub fn article_risk_level(article: &Article) -> RiskLevel {
    article
        .risk_level
        .unwrap_or_else(|| risk_assessment(&RiskSignals::from(article)).level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_article_is_low() {
        let signals = RiskSignals {
            quality_score: Some(90),
            readability_score: Some(70),
            seo_score: Some(80),
            human_score: Some(10),
            banned_phrase_hits: 0,
        };
        let assessment = risk_assessment(&signals);
        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert!(assessment.factors.is_empty());
    }

    #[test]
    fn test_unassessed_article_is_low_not_blocked() {
        // 20 for missing quality only
        let assessment = risk_assessment(&RiskSignals::default());
        assert_eq!(assessment.score, 20);
        assert_eq!(assessment.level, RiskLevel::Low);
    }

    #[test]
    fn test_levels() {
        let medium = RiskSignals {
            quality_score: Some(60),
            human_score: Some(40),
            ..Default::default()
        };
        assert_eq!(risk_assessment(&medium).level, RiskLevel::Medium);

        let high = RiskSignals {
            quality_score: Some(45),
            human_score: Some(55),
            ..Default::default()
        };
        assert_eq!(risk_assessment(&high).level, RiskLevel::High);

        let critical = RiskSignals {
            quality_score: Some(30),
            human_score: Some(90),
            banned_phrase_hits: 1,
            readability_score: Some(20),
            seo_score: Some(10),
        };
        let assessment = risk_assessment(&critical);
        assert_eq!(assessment.score, 100);
        assert_eq!(assessment.level, RiskLevel::Critical);
    }

    #[test]
    fn test_banned_phrase_contribution_is_capped() {
        let signals = RiskSignals {
            quality_score: Some(95),
            banned_phrase_hits: 10,
            ..Default::default()
        };
        assert_eq!(risk_assessment(&signals).score, 30);
    }
}
