//! Queue item creation, ordering and state transitions
//!
//! Everything here is synchronous and side-effect free; persistence and
//! atomicity live behind `QueueStore`.

use crate::db::models::{QueueItem, QueueStatus};
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

/// Input for a new queue item
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewQueueItem {
    pub tenant_id: Uuid,

    pub content_idea_id: Option<Uuid>,

    pub article_id: Option<Uuid>,

    #[serde(default)]
    #[validate(range(min = -1000, max = 1000))]
    pub priority: i32,

    #[validate(range(min = 1, max = 20))]
    pub max_attempts: Option<i32>,

    pub scheduled_for: Option<DateTime<Utc>>,
}

impl NewQueueItem {
    /// Field ranges plus the exactly-one-source rule
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        match (self.content_idea_id, self.article_id) {
            (Some(_), Some(_)) => Err(AppError::validation(
                "source",
                "content_idea_id and article_id are mutually exclusive",
            )),
            (None, None) => Err(AppError::validation(
                "source",
                "one of content_idea_id or article_id is required",
            )),
            _ => Ok(()),
        }
    }
}

/// Build a validated queue item. A `scheduled_for` of any value starts the
/// item in `scheduled`; the sweep promotes it once due.
pub fn create_queue_item(
    input: NewQueueItem,
    default_max_attempts: i32,
    now: DateTime<Utc>,
) -> Result<QueueItem> {
    input.check()?;

    let status = if input.scheduled_for.is_some() {
        QueueStatus::Scheduled
    } else {
        QueueStatus::Pending
    };

    Ok(QueueItem {
        id: Uuid::new_v4(),
        tenant_id: input.tenant_id,
        content_idea_id: input.content_idea_id,
        article_id: input.article_id,
        pipeline_run_id: None,
        priority: input.priority,
        status,
        attempts: 0,
        max_attempts: input.max_attempts.unwrap_or(default_max_attempts).max(1),
        scheduled_for: input.scheduled_for,
        processing_started_at: None,
        completed_at: None,
        last_failed_at: None,
        last_error: None,
        created_at: now,
        updated_at: now,
        version: 0,
    })
}

/// Priority descending, then FIFO. `sort_by` is stable, so items equal on
/// both keys keep their input order.
pub fn sort_queue(mut items: Vec<QueueItem>) -> Vec<QueueItem> {
    items.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    items
}

pub fn filter_by_status<'a>(items: &'a [QueueItem], statuses: &[QueueStatus]) -> Vec<&'a QueueItem> {
    items.iter().filter(|i| statuses.contains(&i.status)).collect()
}

/// `base * 3^(attempts - 1)`; attempts below 1 are treated as the first.
pub fn retry_delay(attempts: i32, base: Duration) -> Duration {
    let exponent = attempts.max(1).saturating_sub(1) as u32;
    base.saturating_mul(3u32.saturating_pow(exponent))
}

fn invalid(from: QueueStatus, to: QueueStatus) -> AppError {
    AppError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

impl QueueItem {
    pub fn should_retry(&self) -> bool {
        self.status == QueueStatus::Failed && self.attempts < self.max_attempts
    }

    /// A `processing` item with no start time never times out
    pub fn has_timed_out(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        if self.status != QueueStatus::Processing {
            return false;
        }
        let Some(started) = self.processing_started_at else {
            return false;
        };
        let elapsed = now.signed_duration_since(started);
        match elapsed.to_std() {
            Ok(elapsed) => elapsed > timeout,
            Err(_) => false,
        }
    }

    pub fn start_processing(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != QueueStatus::Pending {
            return Err(invalid(self.status, QueueStatus::Processing));
        }
        self.status = QueueStatus::Processing;
        self.processing_started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// The start time of the successful attempt is kept with the completion
    /// time so throughput statistics can be derived.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != QueueStatus::Processing {
            return Err(invalid(self.status, QueueStatus::Completed));
        }
        self.status = QueueStatus::Completed;
        self.completed_at = Some(now);
        self.last_error = None;
        self.updated_at = now;
        Ok(())
    }

    /// Record a failed attempt. A non-retryable failure exhausts the
    /// remaining attempts so `should_retry` turns false.
    pub fn fail(&mut self, error: impl Into<String>, retryable: bool, now: DateTime<Utc>) -> Result<()> {
        if self.status != QueueStatus::Processing {
            return Err(invalid(self.status, QueueStatus::Failed));
        }
        self.status = QueueStatus::Failed;
        self.attempts += 1;
        if !retryable {
            self.attempts = self.attempts.max(self.max_attempts);
        }
        self.last_error = Some(error.into());
        self.last_failed_at = Some(now);
        self.processing_started_at = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn retry(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.should_retry() {
            return Err(invalid(self.status, QueueStatus::Pending));
        }
        self.status = QueueStatus::Pending;
        self.pipeline_run_id = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(invalid(self.status, QueueStatus::Cancelled));
        }
        self.status = QueueStatus::Cancelled;
        self.processing_started_at = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_priority(&mut self, priority: i32, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(AppError::Conflict {
                message: format!("cannot reprioritize a {} item", self.status),
            });
        }
        self.priority = priority;
        self.updated_at = now;
        Ok(())
    }

    /// Move a due `scheduled` item to `pending`. Returns whether it moved.
    pub fn promote_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != QueueStatus::Scheduled {
            return false;
        }
        if self.scheduled_for.is_some_and(|at| at > now) {
            return false;
        }
        self.status = QueueStatus::Pending;
        self.updated_at = now;
        true
    }

    /// Retryable and its backoff since the last failure has elapsed
    pub fn is_retry_due(&self, now: DateTime<Utc>, base: Duration) -> bool {
        if !self.should_retry() {
            return false;
        }
        let Some(failed_at) = self.last_failed_at else {
            return true;
        };
        let delay = retry_delay(self.attempts, base);
        match chrono::Duration::from_std(delay) {
            Ok(delay) => failed_at + delay <= now,
            Err(_) => false,
        }
    }

    /// Progress estimate for display: elapsed share of the average
    /// processing time, capped at 95 until the item actually completes.
    pub fn estimated_progress(&self, now: DateTime<Utc>, avg_processing: Duration) -> i32 {
        match self.status {
            QueueStatus::Completed => 100,
            QueueStatus::Processing => {
                let (Some(started), false) = (self.processing_started_at, avg_processing.is_zero())
                else {
                    return 0;
                };
                let elapsed = now.signed_duration_since(started).num_milliseconds().max(0) as f64;
                let pct = elapsed / avg_processing.as_millis() as f64 * 100.0;
                (pct.round() as i32).clamp(0, 95)
            }
            _ => 0,
        }
    }
}
