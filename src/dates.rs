//! Calendar helpers shared by the voting pages and notifications.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Format used for instants quoted in user-facing notices.
pub const NOTICE_FORMAT: &str = "%Y %B %d, %H:%M";

/// Format of date-time form fields.
pub const FIELD_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn to_local(instant: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
    instant.with_timezone(&offset)
}

/// Renders `instant` for a form field in the local offset.
pub fn format_field(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    to_local(instant, offset).format(FIELD_FORMAT).to_string()
}

/// Parses a local date-time form value into UTC, `None` when it's not a real
/// date such as September 31st.
pub fn parse_local_datetime(input: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let input = input.trim();
    let naive = NaiveDateTime::parse_from_str(input, FIELD_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M"))
        .ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

pub fn format_notice(instant: DateTime<Utc>) -> String {
    instant.format(NOTICE_FORMAT).to_string()
}

/// `instant` without its sub-second part.
pub fn whole_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(instant.timestamp(), 0).single().unwrap_or(instant)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn local_fields_round_trip_through_utc() {
        let pdt = FixedOffset::west(7 * 3600);
        let parsed = parse_local_datetime("2026-10-18 09:30", pdt).unwrap();
        assert_eq!(parsed, Utc.ymd(2026, 10, 18).and_hms(16, 30, 0));
        assert_eq!(format_field(parsed, pdt), "2026-10-18 09:30");
        assert_eq!(parse_local_datetime("2026-10-18T09:30", pdt), Some(parsed));
        assert_eq!(parse_local_datetime("2012-09-31 10:00", pdt), None);
        assert_eq!(parse_local_datetime("tomorrow", pdt), None);
    }

    #[test]
    fn notice_format() {
        let instant = Utc.ymd(2026, 10, 18).and_hms_milli(16, 5, 0, 250);
        assert_eq!(format_notice(instant), "2026 October 18, 16:05");
        assert_eq!(whole_seconds(instant), Utc.ymd(2026, 10, 18).and_hms(16, 5, 0));
    }
}
