//! Fire time derivation.
//!
//! The booking provider opens each date's slots at a fixed local instant:
//! 08:00:00 the day before, in the provider's timezone. Tasks fire five
//! seconds after open to land just behind the gate, and the fire time is a
//! pure function of the target date - two tasks for the same date always
//! share one fire time, regardless of the executing host's timezone.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};

/// The provider's timezone, UTC+8. No DST, so a fixed offset is exact.
const REFERENCE_OFFSET_SECS: i32 = 8 * 3600;

/// Local time-of-day at which tasks fire: 08:00:05.
const FIRE_HOUR: u32 = 8;
const FIRE_MIN: u32 = 0;
const FIRE_SEC: u32 = 5;

/// Compute the fire time for a target date: `target_date - 1 day` at
/// 08:00:05 in the reference timezone, expressed in UTC.
pub fn fire_time_for(target_date: NaiveDate) -> DateTime<Utc> {
    let tz = FixedOffset::east_opt(REFERENCE_OFFSET_SECS).unwrap();

    // NaiveDate covers a far wider range than any plausible booking date,
    // so the day subtraction and time-of-day construction cannot fail.
    let local = target_date
        .checked_sub_days(Days::new(1))
        .unwrap_or(target_date)
        .and_hms_opt(FIRE_HOUR, FIRE_MIN, FIRE_SEC)
        .unwrap();

    // Fixed offsets map every local instant to exactly one UTC instant.
    local.and_local_timezone(tz).unwrap().with_timezone(&Utc)
}
