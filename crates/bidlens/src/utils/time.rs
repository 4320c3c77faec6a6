use std::time::{Duration, Instant};

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// RFC 3339 rendering in UTC with second precision, e.g. `2026-02-25T09:00:00Z`.
#[must_use]
pub fn format_rfc3339(timestamp: OffsetDateTime) -> String {
    let utc = truncate_to_seconds(timestamp.to_offset(UtcOffset::UTC));
    utc.format(&Rfc3339).unwrap_or_else(|_| {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            utc.year(),
            u8::from(utc.month()),
            utc.day(),
            utc.hour(),
            utc.minute(),
            utc.second()
        )
    })
}

/// File-name stamp in UTC with second precision, e.g. `20260225_090000`.
#[must_use]
pub fn file_stamp(timestamp: OffsetDateTime) -> String {
    let utc = timestamp.to_offset(UtcOffset::UTC);
    utc.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))
    .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

#[must_use]
pub fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[must_use]
pub fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    initial.saturating_mul(1_u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX))
}

fn truncate_to_seconds(timestamp: OffsetDateTime) -> OffsetDateTime {
    timestamp.replace_nanosecond(0).unwrap_or(timestamp)
}
