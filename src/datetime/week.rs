use chrono::{prelude::*, Duration, SecondsFormat};

/// Query window for one reporting week: Monday 00:00 UTC through the following Sunday 00:00 UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WeekWindow {
    pub fn containing(now: DateTime<Utc>) -> Self {
        Self::of_date(now.date_naive())
    }

    pub fn of_date(date: NaiveDate) -> Self {
        let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        let start = Utc.from_utc_datetime(&monday.and_time(NaiveTime::MIN));

        WeekWindow {
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn time_min(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn time_max(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl std::fmt::Display for WeekWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%a %b %d %Y"),
            self.end.format("%a %b %d %Y")
        )
    }
}
