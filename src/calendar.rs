// Calendar - month arithmetic in a fixed time zone
// Every calendar decision (month scope, day-of-month) is taken in the offset of `now`.
// Stored instants are UTC; they are shifted into that offset before any field is read.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, TimeZone, Utc};

// ============================================================================
// MONTH SHAPE
// ============================================================================

/// Gregorian leap year rule
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year`
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

// ============================================================================
// MONTH-TO-DATE
// ============================================================================

/// First day of `now`'s month at 00:00:00, same offset as `now`
pub fn start_of_month(now: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let local_date = now.date_naive();
    let first = local_date.with_day(1).unwrap_or(local_date);

    // A fixed offset maps each local time to exactly one instant; only the
    // edge of chrono's representable range can fail, where `now` is kept.
    now.offset()
        .from_local_datetime(&first.and_time(NaiveTime::MIN))
        .single()
        .unwrap_or(*now)
}

/// Elapsed days in the month, counting today (the 15th -> 15)
pub fn days_so_far(now: &DateTime<FixedOffset>) -> u32 {
    now.day()
}

/// Total days in `now`'s month
pub fn total_days_in_month(now: &DateTime<FixedOffset>) -> u32 {
    days_in_month(now.year(), now.month())
}

/// Inclusive `[start_of_month(now), now]` window in UTC, for store queries.
///
/// This is the one place month-to-date scoping happens before the data
/// reaches the forecast and series code.
pub fn month_to_date_window(now: &DateTime<FixedOffset>) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        start_of_month(now).with_timezone(&Utc),
        now.with_timezone(&Utc),
    )
}

// ============================================================================
// TRANSACTION DATES
// ============================================================================

/// True when `date`, seen in `now`'s offset, falls in `now`'s month and year
pub fn same_month(date: &DateTime<Utc>, now: &DateTime<FixedOffset>) -> bool {
    let local = date.with_timezone(now.offset());
    local.year() == now.year() && local.month() == now.month()
}

/// Calendar day-of-month of `date` in the given offset
pub fn day_of_month(date: &DateTime<Utc>, offset: &FixedOffset) -> u32 {
    date.with_timezone(offset).day()
}
