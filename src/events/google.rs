use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::{debug, warn};

use super::Event;
use crate::datetime::WeekWindow;

const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<Event>,
    next_page_token: Option<String>,
}

pub struct GoogleCalendar {
    base_url: String,
    http: reqwest::Client,
}

impl Default for GoogleCalendar {
    fn default() -> Self {
        Self::new(GOOGLE_CALENDAR_API_BASE)
    }
}

impl GoogleCalendar {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            http: reqwest::Client::new(),
        }
    }

    /// One page of single (recurrences expanded) events in `window`, ordered by start time.
    /// Cancelled events are returned too; filtering is up to the caller.
    pub async fn get_calendar_events(
        &self,
        token: &str,
        calendar_id: &str,
        window: &WeekWindow,
        max_results: u32,
    ) -> anyhow::Result<Vec<Event>> {
        let url = format!("{}/calendars/{}/events", self.base_url, calendar_id);
        debug!(
            %url,
            time_min = %window.time_min(),
            time_max = %window.time_max(),
            "listing events"
        );

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("timeMin", window.time_min()),
                ("timeMax", window.time_max()),
                ("maxResults", max_results.to_string()),
                ("singleEvents", "true".to_owned()),
                ("orderBy", "startTime".to_owned()),
            ])
            .send()
            .await
            .context("Google Calendar request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_owned());
            return Err(anyhow!("Google Calendar returned {}: {}", status, body));
        }

        let resp: GoogleResponse = resp
            .json()
            .await
            .context("failed to parse Google Calendar response")?;

        if resp.next_page_token.is_some() {
            warn!(
                max_results,
                "more events than fit in one page; only the first {} are counted", max_results
            );
        }

        Ok(resp.items)
    }
}
