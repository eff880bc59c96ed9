pub mod category;
pub mod duration;

use std::io::Write;

use thiserror::Error;
use tracing::debug;

use crate::events::Event;

pub use category::Category;
pub use duration::{AllDayPolicy, Span};

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("unknown colorId {0:?}, expected a number from 1 to 8")]
    UnknownColor(String),

    #[error("event {event} has no {field} time")]
    MissingTime { event: String, field: &'static str },

    #[error("event {event} has an unparseable {field} time {value:?}")]
    InvalidTime {
        event: String,
        field: &'static str,
        value: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Seconds per category, in the order categories were first seen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    entries: Vec<(Category, i64)>,
}

impl Totals {
    pub fn add(&mut self, category: Category, seconds: i64) {
        match self.entries.iter_mut().find(|(c, _)| *c == category) {
            Some((_, total)) => *total += seconds,
            None => self.entries.push((category, seconds)),
        }
    }

    #[cfg(test)]
    pub fn get(&self, category: Category) -> Option<i64> {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, total)| *total)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, i64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn total_seconds(&self) -> i64 {
        self.entries.iter().map(|(_, total)| total).sum()
    }
}

pub fn hours(seconds: i64) -> f64 {
    seconds as f64 / 3600.0
}

pub struct Tally {
    pub all_day: AllDayPolicy,
}

impl Tally {
    pub fn new(all_day: AllDayPolicy) -> Self {
        Tally { all_day }
    }

    /// Buckets counted events by category, writing one trace line per event to `out`.
    pub fn aggregate<W: Write>(&self, events: &[Event], out: &mut W) -> Result<Totals, TallyError> {
        let mut totals = Totals::default();

        for event in events.iter().filter(|e| e.is_counted()) {
            let span = Span::of(event, self.all_day)?;
            let category = Category::from_color_id(event.color_id.as_deref())?;
            let seconds = span.seconds();

            debug!(
                event = %event,
                %category,
                color_id = ?category.color_id(),
                seconds,
                "counted event"
            );
            writeln!(
                out,
                "{} {} {} {}",
                span.raw_start,
                event.title(),
                category,
                seconds
            )?;

            totals.add(category, seconds);
        }

        Ok(totals)
    }
}

pub fn print_totals<W: Write>(totals: &Totals, out: &mut W) -> std::io::Result<()> {
    for (category, seconds) in totals.iter() {
        // Debug formatting keeps a trailing ".0" on whole hours.
        writeln!(out, "{} {:?}", category, hours(seconds))?;
    }
    Ok(())
}
