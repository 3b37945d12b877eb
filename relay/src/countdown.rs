//! Restock countdowns.
//!
//! Two kinds of countdown appear in a report:
//!
//! - Feed countdowns, derived from a feed's `updatedAt` timestamp and the
//!   fixed restock interval of that shop.
//! - The honey countdown, which ignores every feed and counts down to the top
//!   of the next hour on the game server's clock (UTC+08:00).
//!
//! All functions take the current time as an argument so callers decide
//! which clock to read.

use chrono::{DateTime, FixedOffset, Timelike, Utc};

/// Gear and seed shops restock every 5 minutes.
pub const GEAR_SEED_RESTOCK_SECS: i64 = 300;

/// The egg shop restocks every 10 minutes.
pub const EGG_RESTOCK_SECS: i64 = 600;

/// The cosmetics shop restocks every 4 hours.
pub const COSMETICS_RESTOCK_SECS: i64 = 14_400;

/// Offset of the civil time zone the honey shop resets on (Asia/Manila, no DST).
const HONEY_RESET_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Seconds left until a shop restocks, never negative.
///
/// `updated_at_ms` is the feed's last restock in epoch milliseconds. Elapsed
/// time is floored to whole seconds. Arithmetic saturates, so any timestamp
/// the feed sends yields a result.
pub fn remaining_secs(updated_at_ms: i64, interval_secs: i64, now: DateTime<Utc>) -> i64 {
    let elapsed = now
        .timestamp_millis()
        .saturating_sub(updated_at_ms)
        .div_euclid(1000);
    interval_secs.saturating_sub(elapsed).max(0)
}

/// Renders a duration as `Hh Mm Ss`, dropping the hour segment when it is zero.
pub fn format_remaining(remaining_secs: i64) -> String {
    let remaining = remaining_secs.max(0);
    let hours = remaining / 3600;
    let minutes = (remaining % 3600) / 60;
    let seconds = remaining % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else {
        format!("{minutes}m {seconds}s")
    }
}

/// Countdown until the next restock of a feed.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use garden_relay::countdown::{restock_countdown, GEAR_SEED_RESTOCK_SECS};
///
/// let now = Utc.timestamp_millis_opt(1_000_000).unwrap();
/// let updated_at = now.timestamp_millis() - 60_000;
/// assert_eq!(restock_countdown(updated_at, GEAR_SEED_RESTOCK_SECS, now), "4m 0s");
/// ```
pub fn restock_countdown(updated_at_ms: i64, interval_secs: i64, now: DateTime<Utc>) -> String {
    format_remaining(remaining_secs(updated_at_ms, interval_secs, now))
}

/// Countdown to the honey shop reset at the top of the next hour.
///
/// Rendered as `MMm SSs`, both zero padded. At exactly `:00` seconds the
/// seconds segment reads `60`, matching the game's own timer.
pub fn honey_countdown(now: DateTime<Utc>) -> String {
    let local = match FixedOffset::east_opt(HONEY_RESET_UTC_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).time(),
        None => now.time(),
    };

    let minutes = 59 - local.minute();
    let seconds = 60 - local.second();

    format!("{minutes:02}m {seconds:02}s")
}
