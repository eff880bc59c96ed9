use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::events::{Event, EventTime};

use super::TallyError;

/// Meetings booked into a half-hour or hour slot tend to end a few minutes early
/// (25 and 50 minute "speedy meetings"). These raw lengths count as the full slot.
pub const ROUNDING: &[(i64, i64)] = &[(25 * 60, 30 * 60), (50 * 60, 60 * 60)];

pub fn round_duration(seconds: i64) -> i64 {
    ROUNDING
        .iter()
        .find(|(raw, _)| *raw == seconds)
        .map_or(seconds, |(_, rounded)| *rounded)
}

/// Where an all-day event's end comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AllDayPolicy {
    /// End on the event's own start date, so all-day events last zero seconds.
    #[default]
    ZeroLength,
    /// Use the end date the calendar reports (exclusive), counting the full span.
    FullSpan,
}

/// Resolved bounds of one event, keeping the start exactly as the calendar sent it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span<'a> {
    pub raw_start: &'a str,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl<'a> Span<'a> {
    pub fn of(event: &'a Event, policy: AllDayPolicy) -> Result<Self, TallyError> {
        let raw_start = pick(event, &event.start, "start")?;
        let raw_end = match (&event.end.date_time, policy) {
            (Some(date_time), _) => date_time.as_str(),
            (None, AllDayPolicy::ZeroLength) => event
                .start
                .date
                .as_deref()
                .ok_or_else(|| missing(event, "end"))?,
            (None, AllDayPolicy::FullSpan) => pick(event, &event.end, "end")?,
        };

        Ok(Span {
            raw_start,
            start: parse_time(raw_start).ok_or_else(|| invalid(event, "start", raw_start))?,
            end: parse_time(raw_end).ok_or_else(|| invalid(event, "end", raw_end))?,
        })
    }

    /// Elapsed seconds after rounding.
    pub fn seconds(&self) -> i64 {
        round_duration((self.end - self.start).num_seconds())
    }
}

fn pick<'a>(
    event: &Event,
    time: &'a EventTime,
    field: &'static str,
) -> Result<&'a str, TallyError> {
    time.date_time
        .as_deref()
        .or(time.date.as_deref())
        .ok_or_else(|| missing(event, field))
}

fn missing(event: &Event, field: &'static str) -> TallyError {
    TallyError::MissingTime {
        event: event.to_string(),
        field,
    }
}

fn invalid(event: &Event, field: &'static str, value: &str) -> TallyError {
    TallyError::InvalidTime {
        event: event.to_string(),
        field,
        value: value.to_owned(),
    }
}

/// Accepts RFC 3339 date-times and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_time(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime);
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let utc = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    Some(utc.into())
}
