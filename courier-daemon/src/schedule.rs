//! Daily fire-time computation.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

use courier_core::types::Schedule;

/// The next fire time strictly after `now`.
///
/// Out-of-range config values are clamped (hour to 23, minute to 59) rather
/// than wedging the scheduler.
pub fn next_fire_after(now: DateTime<Utc>, schedule: &Schedule) -> DateTime<Utc> {
    let hour = schedule.hour_utc.min(23);
    let minute = schedule.minute_utc.min(59);

    let candidate = match now.date_naive().and_hms_opt(hour, minute, 0) {
        Some(today) => Utc.from_utc_datetime(&today),
        // Unreachable with clamped values; fall back to a 24h cadence.
        None => now + ChronoDuration::days(1),
    };

    if candidate > now {
        candidate
    } else {
        candidate + ChronoDuration::days(1)
    }
}

/// How long to sleep from `now` until the next fire.
pub fn sleep_until_fire(now: DateTime<Utc>, schedule: &Schedule) -> Duration {
    let next = next_fire_after(now, schedule);
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
