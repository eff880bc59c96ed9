pub mod google;

use serde::Deserialize;

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Confirmed,
    Tentative,
    Cancelled,
    #[default]
    #[serde(other)]
    Other,
}

/// Either side of an event. Timed events carry `dateTime`, all-day events carry `date`.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    pub summary: Option<String>,
    pub color_id: Option<String>,
}

impl Event {
    /// Only confirmed and tentative events count towards project time.
    pub fn is_counted(&self) -> bool {
        matches!(self.status, Status::Confirmed | Status::Tentative)
    }

    pub fn title(&self) -> &str {
        match self.summary.as_deref() {
            Some(summary) if !summary.trim().is_empty() => summary,
            _ => "(No title)",
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.title())
        } else {
            write!(f, "{} ({})", self.title(), self.id)
        }
    }
}
