//! Internal-link relevance between a source article and a candidate target

use super::clamp_score;
use crate::db::models::Article;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Title words shorter than this never count as overlap
const MIN_TITLE_WORD_LEN: usize = 4;

/// The article links are being suggested for
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkSource {
    pub title: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A published article that could be linked to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCandidate {
    pub article_id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub times_linked_to: i32,
}

impl From<&Article> for LinkSource {
    fn from(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            topics: article.topics.0.clone(),
            keywords: article.keywords.0.clone(),
        }
    }
}

impl From<&Article> for LinkCandidate {
    fn from(article: &Article) -> Self {
        Self {
            article_id: article.id,
            title: article.title.clone(),
            slug: article.slug.clone(),
            topics: article.topics.0.clone(),
            keywords: article.keywords.0.clone(),
            published_at: article.published_at,
            times_linked_to: article.times_linked_to,
        }
    }
}

/// Per-term contributions; `link_equity_penalty` is zero or negative
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceBreakdown {
    pub title_overlap: i32,
    pub topic_match: i32,
    pub keyword_match: i32,
    pub recency: i32,
    pub link_equity_penalty: i32,
}

impl RelevanceBreakdown {
    fn raw_total(&self) -> i64 {
        i64::from(self.title_overlap)
            + i64::from(self.topic_match)
            + i64::from(self.keyword_match)
            + i64::from(self.recency)
            + i64::from(self.link_equity_penalty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceScore {
    pub total: i32,
    pub breakdown: RelevanceBreakdown,
    pub matched_topics: Vec<String>,
    pub matched_keywords: Vec<String>,
}

fn title_words(title: &str) -> BTreeSet<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_TITLE_WORD_LEN)
        .map(str::to_lowercase)
        .collect()
}

fn recency_bonus(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i32 {
    let Some(published_at) = published_at else {
        return 0;
    };
    match now.signed_duration_since(published_at).num_days() {
        d if d < 30 => 10,
        d if d < 90 => 7,
        d if d < 180 => 4,
        _ => 0,
    }
}

fn link_equity_penalty(times_linked_to: i32) -> i32 {
    match times_linked_to {
        n if n > 20 => -20,
        n if n > 10 => -10,
        n if n > 5 => -5,
        _ => 0,
    }
}

pub fn relevance_score(source: &LinkSource, candidate: &LinkCandidate, now: DateTime<Utc>) -> RelevanceScore {
    let source_words = title_words(&source.title);
    let overlap = title_words(&candidate.title)
        .intersection(&source_words)
        .count();

    // Topics match exactly; keywords ignore case
    let matched_topics: Vec<String> = candidate
        .topics
        .iter()
        .filter(|t| source.topics.contains(t))
        .cloned()
        .collect();

    let matched_keywords: Vec<String> = candidate
        .keywords
        .iter()
        .filter(|k| source.keywords.iter().any(|s| s.eq_ignore_ascii_case(k)))
        .cloned()
        .collect();

    let breakdown = RelevanceBreakdown {
        title_overlap: (overlap as i32).saturating_mul(10).min(40),
        topic_match: (matched_topics.len() as i32).saturating_mul(10).min(30),
        keyword_match: (matched_keywords.len() as i32).saturating_mul(5).min(20),
        recency: recency_bonus(candidate.published_at, now),
        link_equity_penalty: link_equity_penalty(candidate.times_linked_to),
    };

    RelevanceScore {
        total: clamp_score(breakdown.raw_total()),
        breakdown,
        matched_topics,
        matched_keywords,
    }
}

/// Score candidates, drop zero scores and order by total descending. Equal
/// totals keep input order.
pub fn rank_candidates(
    source: &LinkSource,
    candidates: Vec<LinkCandidate>,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<(LinkCandidate, RelevanceScore)> {
    let mut scored: Vec<(LinkCandidate, RelevanceScore)> = candidates
        .into_iter()
        .map(|c| {
            let score = relevance_score(source, &c, now);
            (c, score)
        })
        .filter(|(_, s)| s.total > 0)
        .collect();

    scored.sort_by(|a, b| b.1.total.cmp(&a.1.total));
    scored.truncate(limit);
    scored
}
