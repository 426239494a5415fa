//! When the next daily run fires.

use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};

/// First `hour:00` strictly after `now`, in the same wall clock.
pub fn next_fire_at(now: NaiveDateTime, hour: u32) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date().and_time(time);
    if now < today {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// How long to sleep from `now` until the next `hour:00` in `now`'s time zone.
///
/// A fire time that falls into a DST gap is taken as UTC wall time, which
/// lands within an hour of the intended moment.
pub fn delay_until_next_fire<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32) -> std::time::Duration {
    let tz = now.timezone();
    let next = next_fire_at(now.naive_local(), hour);
    let next = tz
        .from_local_datetime(&next)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&next));

    (next - now.clone()).to_std().unwrap_or_default()
}
