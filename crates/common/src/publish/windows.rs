//! Publishing window search in the tenant timezone

use crate::db::models::{AutoPublishConfig, PublishingWindow};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Days searched ahead; every weekday appears at least once
const SEARCH_DAYS: i64 = 8;

fn window_open_at(windows: &[PublishingWindow], local: &DateTime<Tz>) -> bool {
    let day = local.weekday().num_days_from_sunday();
    windows
        .iter()
        .any(|w| u32::from(w.day_of_week) == day && w.contains_hour(local.hour()))
}

/// First existing local hour of `window` on `date` strictly after `after`.
/// Hours skipped by a DST gap are passed over; ambiguous hours take the
/// earlier instant.
fn first_start_after(
    tz: &Tz,
    window: &PublishingWindow,
    date: NaiveDate,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    (u32::from(window.start_hour)..u32::from(window.end_hour))
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .filter_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .find(|instant| *instant > after)
}

/// Earliest instant at or after `from` inside one of the configured
/// windows. No windows means publishing is unrestricted and `from` is
/// returned; `None` only for an unknown timezone.
pub fn next_eligible_window(config: &AutoPublishConfig, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let tz = config.tz()?;
    let windows = &config.publishing_windows.0;
    if windows.is_empty() {
        return Some(from);
    }

    let local = from.with_timezone(&tz);
    if window_open_at(windows, &local) {
        return Some(from);
    }

    let start_date = local.date_naive();
    (0..SEARCH_DAYS)
        .filter_map(|offset| start_date.checked_add_signed(Duration::days(offset)))
        .flat_map(|date| {
            let day = date.weekday().num_days_from_sunday();
            windows
                .iter()
                .filter(move |w| u32::from(w.day_of_week) == day)
                .filter_map(move |w| first_start_after(&tz, w, date, from))
        })
        .min()
}

/// Whether `at` falls inside a configured window (always true without
/// windows)
pub fn is_within_window(config: &AutoPublishConfig, at: DateTime<Utc>) -> bool {
    match config.tz() {
        Some(_) if config.publishing_windows.0.is_empty() => true,
        Some(tz) => window_open_at(&config.publishing_windows.0, &at.with_timezone(&tz)),
        None => false,
    }
}
