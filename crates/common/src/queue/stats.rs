//! Queue statistics, wait-time estimation and positions

use super::model::sort_queue;
use super::QueueSettings;
use crate::db::models::{QueueItem, QueueStatus};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate view of a tenant queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub scheduled: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Mean over completed items with both timestamps; `None` without history
    pub avg_processing_time_ms: Option<u64>,
    pub completed_last_hour: usize,
    /// Estimated wait for an item enqueued now
    pub estimated_wait_time_ms: u64,
}

impl QueueStats {
    pub fn count(&self, status: QueueStatus) -> usize {
        match status {
            QueueStatus::Pending => self.pending,
            QueueStatus::Scheduled => self.scheduled,
            QueueStatus::Processing => self.processing,
            QueueStatus::Completed => self.completed,
            QueueStatus::Failed => self.failed,
            QueueStatus::Cancelled => self.cancelled,
        }
    }
}

pub fn calculate_stats(items: &[QueueItem], now: DateTime<Utc>, settings: &QueueSettings) -> QueueStats {
    let mut stats = QueueStats {
        total: items.len(),
        ..Default::default()
    };

    let hour_ago = now - ChronoDuration::hours(1);
    let mut processing_total_ms: i64 = 0;
    let mut processing_samples: i64 = 0;

    for item in items {
        match item.status {
            QueueStatus::Pending => stats.pending += 1,
            QueueStatus::Scheduled => stats.scheduled += 1,
            QueueStatus::Processing => stats.processing += 1,
            QueueStatus::Completed => stats.completed += 1,
            QueueStatus::Failed => stats.failed += 1,
            QueueStatus::Cancelled => stats.cancelled += 1,
        }

        if item.status != QueueStatus::Completed {
            continue;
        }
        let Some(completed_at) = item.completed_at else {
            continue;
        };
        if completed_at >= hour_ago {
            stats.completed_last_hour += 1;
        }
        if let Some(started) = item.processing_started_at {
            let elapsed = completed_at.signed_duration_since(started).num_milliseconds();
            if elapsed >= 0 {
                processing_total_ms += elapsed;
                processing_samples += 1;
            }
        }
    }

    if processing_samples > 0 {
        stats.avg_processing_time_ms = Some((processing_total_ms / processing_samples) as u64);
    }
    stats.estimated_wait_time_ms = estimated_wait_time(&stats, None, settings);
    stats
}

/// `ceil(items_ahead / workers) * avg_processing`. Without a position the
/// whole pending backlog is ahead.
pub fn estimated_wait_time(stats: &QueueStats, position: Option<usize>, settings: &QueueSettings) -> u64 {
    let items_ahead = position.unwrap_or(stats.pending) as u64;
    let workers = u64::from(settings.concurrent_workers.max(1));
    let avg_ms = stats
        .avg_processing_time_ms
        .unwrap_or(settings.default_avg_processing.as_millis() as u64);

    items_ahead.div_ceil(workers).saturating_mul(avg_ms)
}

/// 1-based rank among `pending` and `scheduled` items in queue order
pub fn queue_position(items: &[QueueItem], item_id: Uuid) -> Option<usize> {
    let actionable: Vec<QueueItem> = items
        .iter()
        .filter(|i| i.status.is_actionable())
        .cloned()
        .collect();

    sort_queue(actionable)
        .iter()
        .position(|i| i.id == item_id)
        .map(|idx| idx + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{create_queue_item, NewQueueItem};
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn item(priority: i32, created: i64) -> QueueItem {
        create_queue_item(
            NewQueueItem {
                tenant_id: Uuid::nil(),
                content_idea_id: Some(Uuid::new_v4()),
                article_id: None,
                priority,
                max_attempts: None,
                scheduled_for: None,
            },
            3,
            at(created),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_queue_stats() {
        let stats = calculate_stats(&[], at(0), &QueueSettings::default());
        assert_eq!(stats, QueueStats::default());
        assert_eq!(stats.estimated_wait_time_ms, 0);
    }

    #[test]
    fn test_stats_counts_and_average() {
        let settings = QueueSettings::default();
        let now = at(10_000);

        let mut recent = item(0, 0);
        recent.start_processing(now - ChronoDuration::seconds(120)).unwrap();
        recent.complete(now - ChronoDuration::seconds(60)).unwrap();

        let mut old = item(0, 0);
        old.start_processing(at(0)).unwrap();
        old.complete(at(120)).unwrap();

        let mut failed = item(0, 0);
        failed.start_processing(at(0)).unwrap();
        failed.fail("boom", true, at(1)).unwrap();

        let items = vec![recent, old, failed, item(0, 1), item(0, 2), item(0, 3)];
        let stats = calculate_stats(&items, now, &settings);

        assert_eq!(stats.total, 6);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 3);
        assert_eq!(stats.completed_last_hour, 1);
        assert_eq!(stats.avg_processing_time_ms, Some(90_000));
        // ceil(3 / 2) * 90s
        assert_eq!(stats.estimated_wait_time_ms, 180_000);
    }

    #[test]
    fn test_wait_time_uses_default_average_and_workers() {
        let stats = QueueStats {
            pending: 5,
            ..Default::default()
        };
        let settings = QueueSettings::default();
        assert_eq!(estimated_wait_time(&stats, None, &settings), 3 * 180_000);
        assert_eq!(estimated_wait_time(&stats, Some(1), &settings), 180_000);

        let wide = QueueSettings {
            concurrent_workers: 4,
            default_avg_processing: Duration::from_secs(60),
            ..QueueSettings::default()
        };
        assert_eq!(estimated_wait_time(&stats, None, &wide), 2 * 60_000);
    }

    #[test]
    fn test_queue_position() {
        let a = item(0, 0);
        let b = item(5, 1);
        let mut done = item(9, 0);
        done.status = QueueStatus::Completed;
        let mut scheduled = item(1, 2);
        scheduled.status = QueueStatus::Scheduled;

        let items = vec![a.clone(), b.clone(), done.clone(), scheduled.clone()];
        assert_eq!(queue_position(&items, b.id), Some(1));
        assert_eq!(queue_position(&items, scheduled.id), Some(2));
        assert_eq!(queue_position(&items, a.id), Some(3));
        assert_eq!(queue_position(&items, done.id), None);
        assert_eq!(queue_position(&items, Uuid::new_v4()), None);
    }
}
