use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{FeedError, Result};

/// Civil time zone of every feed timestamp, whatever label the feed prints.
const FEED_TZ: Tz = chrono_tz::America::New_York;

/// Parse a `MM/DD/YYYY` feed date.
pub fn parse_calendar_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%m/%d/%Y")
        .map_err(|_| FeedError::format("calendar date", text))
}

/// Parse a feed update timestamp such as `TUE 2007-10-16 23:08:37 EST`.
///
/// The weekday is not checked against the date and the trailing zone label
/// is ignored: the feed prints labels like `ET` or `$s`, so the time is
/// always read as US Eastern and converted to UTC.
pub fn parse_feed_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let invalid = || FeedError::format("update timestamp", text);

    let mut parts = text.split_whitespace();
    let weekday = parts.next().ok_or_else(invalid)?;
    if weekday.len() != 3 || !weekday.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }
    let date = parts.next().ok_or_else(invalid)?;
    let time = parts.next().ok_or_else(invalid)?;

    let naive = NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S")
        .map_err(|_| invalid())?;

    Ok(eastern_to_utc(naive))
}

fn eastern_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    match FEED_TZ.from_local_datetime(&naive) {
        LocalResult::Single(local) => local.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            // Inside the spring-forward gap: keep the pre-transition offset.
            let before = naive - TimeDelta::hours(1);
            let offset = FEED_TZ.offset_from_local_datetime(&before).earliest().map_or_else(
                || FEED_TZ.offset_from_utc_datetime(&naive).fix(),
                |o| o.fix(),
            );
            let utc = naive - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
            Utc.from_utc_datetime(&utc)
        }
    }
}
